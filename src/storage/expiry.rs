//! Background expiry sweeper.
//!
//! Lazy expiry alone leaks memory: a key that expires and is never touched
//! again would sit in the map forever. The sweeper is a Tokio task that
//! wakes on a fixed interval and removes every entry past its deadline
//! under the engine's write guard.
//!
//! Lost ticks are harmless — the lazy check on every access remains the
//! authority for visibility, and the next tick catches up. The task is
//! cooperatively cancelled through a watch channel and also stops when its
//! handle is dropped.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Handle to the running sweeper task. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper against `engine`, waking every `interval`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let engine = Arc::new(StorageEngine::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&engine), DEFAULT_SWEEP_INTERVAL);
    /// // ... serve traffic ...
    /// sweeper.stop();
    /// ```
    pub fn start(engine: Arc<StorageEngine>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweeper_loop(engine, interval, shutdown_rx));
        info!(interval_secs = interval.as_secs(), "expiry sweeper started");
        Self { shutdown_tx }
    }

    /// Signals the sweeper to stop. Also called on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper shutting down");
                    return;
                }
            }
        }

        let removed = engine.sweep_expired();
        if removed > 0 {
            debug!(removed, remaining = engine.len(), "swept expired keys");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sweeper_removes_expired_keys() {
        let engine = Arc::new(StorageEngine::new());

        for i in 0..10 {
            engine.set_with_ttl(format!("temp:{i}"), "v", Duration::from_millis(30));
        }
        engine.set("persistent", "v");
        assert_eq!(engine.len(), 11);

        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.len(), 1);
        assert!(engine.exists("persistent"));
    }

    #[tokio::test]
    async fn sweeper_stops_when_dropped() {
        let engine = Arc::new(StorageEngine::new());

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine), Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        engine.set_with_ttl("key", "v", Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(80)).await;

        // sweeper is gone, but the lazy check still hides the key
        assert!(!engine.exists("key"));
    }

    #[tokio::test]
    async fn responses_identical_with_and_without_sweeper() {
        // lazy ≡ active: the visible behavior of a key sequence does not
        // depend on whether the sweeper runs
        let run = |sweep: bool| async move {
            let engine = Arc::new(StorageEngine::new());
            let _sweeper = sweep
                .then(|| ExpirySweeper::start(Arc::clone(&engine), Duration::from_millis(5)));

            engine.set("stay", "1");
            engine.set_with_ttl("go", "2", Duration::from_millis(20));
            tokio::time::sleep(Duration::from_millis(80)).await;

            (
                engine.get_string("stay").is_ok(),
                engine.get_string("go").is_ok(),
                engine.exists("go"),
            )
        };

        assert_eq!(run(false).await, run(true).await);
    }
}
