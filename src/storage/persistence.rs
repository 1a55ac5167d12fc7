//! Durable snapshots of the keyspace.
//!
//! The snapshot file is a 4-byte big-endian payload length followed by the
//! payload: a self-describing JSON document carrying a timestamp, a key
//! count, and one tagged entry per key. Unknown fields in the document are
//! ignored on load, so the format can grow without breaking old files.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────┐
//! │ u32 (BE) len │ { timestamp_ms, key_count, entries: [..] }│
//! └──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## Atomicity
//!
//! Saves write to a sibling `<file>.tmp`, fsync, then atomically rename
//! over the final path. A crash mid-save leaves the previous snapshot
//! intact; a partial temp file is never observed as the live snapshot.
//!
//! ## Consistency
//!
//! The saver captures the keyspace with repeated short read acquisitions
//! (key list, then one get per key, skipping entries that vanish
//! mid-iteration). Writes keep flowing during a save, so the image is
//! point-in-motion rather than point-in-time; each individual entry is
//! self-consistent.
//!
//! Expirations are stored as absolute wall-clock deadlines in Unix
//! milliseconds. Entries already past their deadline are still inserted on
//! load and swept by the first lazy check.

use crate::storage::value::{Payload, StoredValue};
use crate::storage::StorageEngine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Default time between automatic saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(60);

/// How long the final shutdown save may take before it is abandoned.
const FINAL_SAVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Snapshot persistence settings.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Whether persistence is active at all
    pub enabled: bool,
    /// Directory holding the snapshot file
    pub data_dir: PathBuf,
    /// Snapshot file name inside `data_dir`
    pub filename: String,
    /// Interval between automatic saves
    pub save_interval: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: PathBuf::from("data"),
            filename: "dump.bin".to_string(),
            save_interval: DEFAULT_SAVE_INTERVAL,
        }
    }
}

impl SnapshotConfig {
    /// Full path of the snapshot file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(&self.filename)
    }
}

/// Errors from saving or loading a snapshot.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("snapshot truncated: expected {expected} payload bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    timestamp_ms: u64,
    key_count: usize,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    key: String,
    #[serde(flatten)]
    body: EntryBody,
    /// Absolute deadline in Unix milliseconds; `None` = no expiration
    #[serde(default)]
    expires_at_ms: Option<u64>,
}

/// Per-kind entry body, tagged so the loader can rebuild the right
/// container. Set member order is not preserved across a round-trip.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
enum EntryBody {
    String(String),
    Hash(HashMap<String, String>),
    List(Vec<String>),
    Set(Vec<String>),
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Converts a monotonic deadline to an absolute wall-clock timestamp.
fn deadline_to_unix_ms(deadline: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(Instant::now());
    unix_now_ms() + remaining.as_millis() as u64
}

/// Converts an absolute wall-clock timestamp back to a monotonic deadline.
/// Past timestamps map to an already-expired deadline.
fn deadline_from_unix_ms(abs_ms: u64) -> Instant {
    let now_ms = unix_now_ms();
    let now = Instant::now();
    if abs_ms > now_ms {
        now + Duration::from_millis(abs_ms - now_ms)
    } else {
        now.checked_sub(Duration::from_millis(now_ms - abs_ms))
            .unwrap_or(now)
    }
}

fn entry_from_stored(key: String, value: StoredValue) -> SnapshotEntry {
    let body = match value.payload {
        Payload::String(s) => EntryBody::String(s),
        Payload::Hash(h) => EntryBody::Hash(h.entries().into_iter().collect()),
        Payload::List(l) => EntryBody::List(l.snapshot()),
        Payload::Set(s) => EntryBody::Set(s.members()),
    };
    SnapshotEntry {
        key,
        body,
        expires_at_ms: value.expires_at.map(deadline_to_unix_ms),
    }
}

fn entry_into_stored(entry: SnapshotEntry) -> (String, StoredValue) {
    let payload = match entry.body {
        EntryBody::String(s) => Payload::String(s),
        EntryBody::Hash(map) => Payload::Hash(map.into_iter().collect()),
        EntryBody::List(items) => Payload::List(items.into_iter().collect()),
        EntryBody::Set(members) => Payload::Set(members.into_iter().collect()),
    };
    let expires_at = entry.expires_at_ms.map(deadline_from_unix_ms);
    (entry.key, StoredValue::with_deadline(payload, expires_at))
}

/// Captures the live keyspace. Entries deleted between the key listing and
/// the per-key read are skipped.
fn capture(engine: &StorageEngine) -> Snapshot {
    let keys = engine.keys("*");
    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        if let Ok(value) = engine.get(&key) {
            entries.push(entry_from_stored(key, value));
        }
    }
    Snapshot {
        timestamp_ms: unix_now_ms(),
        key_count: entries.len(),
        entries,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Writes a snapshot of the engine to the configured path.
///
/// Returns the number of keys written. On failure the previous snapshot
/// (if any) is untouched and the temp file may be left behind for the next
/// save to overwrite.
pub async fn save(engine: &StorageEngine, config: &SnapshotConfig) -> Result<usize, PersistenceError> {
    let snapshot = capture(engine);
    let count = snapshot.entries.len();
    let payload = serde_json::to_vec(&snapshot)?;

    fs::create_dir_all(&config.data_dir).await?;
    let path = config.path();
    let tmp = tmp_path(&path);

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(&(payload.len() as u32).to_be_bytes())
        .await?;
    file.write_all(&payload).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, &path).await?;
    debug!(keys = count, path = %path.display(), "snapshot saved");
    Ok(count)
}

/// Restores the engine from the configured snapshot file.
///
/// A missing file is not an error: the keyspace simply starts empty.
/// Returns the number of keys restored.
pub async fn load(engine: &StorageEngine, config: &SnapshotConfig) -> Result<usize, PersistenceError> {
    let path = config.path();
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("no snapshot file found, starting with an empty keyspace");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    if bytes.len() < 4 {
        return Err(PersistenceError::Truncated {
            expected: 4,
            actual: bytes.len(),
        });
    }
    let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let payload = &bytes[4..];
    if payload.len() < declared {
        return Err(PersistenceError::Truncated {
            expected: declared,
            actual: payload.len(),
        });
    }

    let snapshot: Snapshot = serde_json::from_slice(&payload[..declared])?;

    engine.clear();
    let mut restored = 0;
    for entry in snapshot.entries {
        let (key, value) = entry_into_stored(entry);
        engine.restore(key, value);
        restored += 1;
    }
    info!(keys = restored, path = %path.display(), "keyspace restored from snapshot");
    Ok(restored)
}

/// Periodic auto-save driver.
///
/// Spawns a Tokio task that saves on a fixed interval while enabled.
/// [`SnapshotService::stop`] signals the task and performs one final save,
/// bounded by a timeout, so a clean shutdown never loses more than the
/// in-flight interval.
#[derive(Debug)]
pub struct SnapshotService {
    engine: Arc<StorageEngine>,
    config: SnapshotConfig,
    shutdown_tx: watch::Sender<bool>,
}

impl SnapshotService {
    /// Starts the auto-save task. With persistence disabled this is a
    /// no-op handle.
    pub fn start(engine: Arc<StorageEngine>, config: SnapshotConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        if config.enabled {
            tokio::spawn(auto_save_loop(
                Arc::clone(&engine),
                config.clone(),
                shutdown_rx,
            ));
            info!(
                interval_secs = config.save_interval.as_secs(),
                path = %config.path().display(),
                "snapshot auto-save started"
            );
        }
        Self {
            engine,
            config,
            shutdown_tx,
        }
    }

    /// Stops the auto-save task and writes one final snapshot.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if !self.config.enabled {
            return;
        }
        match tokio::time::timeout(FINAL_SAVE_TIMEOUT, save(&self.engine, &self.config)).await {
            Ok(Ok(keys)) => info!(keys, "final snapshot saved"),
            Ok(Err(e)) => error!(error = %e, "final snapshot failed"),
            Err(_) => error!("final snapshot timed out"),
        }
    }
}

async fn auto_save_loop(
    engine: Arc<StorageEngine>,
    config: SnapshotConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.save_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("snapshot auto-save shutting down");
                    return;
                }
            }
        }

        // failures are logged and retried on the next tick; they never
        // reach a client
        if let Err(e) = save(&engine, &config).await {
            warn!(error = %e, "auto-save failed");
        }
    }
}
