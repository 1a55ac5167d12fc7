//! flintkv server binary.
//!
//! Wires the pieces together: configuration, logging, the storage engine,
//! snapshot load, background tasks, and the TCP accept loop. Shutdown is
//! graceful on Ctrl+C: stop accepting, stop the sweeper, then let the
//! snapshot service write one final save.

use flintkv::commands::CommandHandler;
use flintkv::config::Config;
use flintkv::connection::{handle_connection, ConnectionStats};
use flintkv::storage::{self, ExpirySweeper, SnapshotService, StorageEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn print_banner(config: &Config) {
    println!(
        r#"
        __ _ _       _   _
       / _| (_)_ __ | |_| | ___   __
      | |_| | | '_ \| __| |/ /\ \ / /
      |  _| | | | | | |_|   <  \ V /
      |_| |_|_|_| |_|\__|_|\_\  \_/

flintkv v{} - in-memory key-value store
────────────────────────────────────────
Listening on {}
Persistence: {}

Use Ctrl+C to shut down gracefully.
"#,
        flintkv::VERSION,
        config.bind_address(),
        if config.snapshot.enabled {
            "enabled"
        } else {
            "disabled"
        },
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    print_banner(&config);

    // shared engine: populated from the snapshot, mutated by handlers,
    // drained by the final save
    let storage = Arc::new(StorageEngine::new());

    if config.snapshot.enabled {
        if let Err(e) = storage::load(&storage, &config.snapshot).await {
            warn!(error = %e, "failed to load snapshot, starting empty");
        }
    }

    let sweeper = ExpirySweeper::start(Arc::clone(&storage), config.sweep_interval);
    let snapshots = SnapshotService::start(Arc::clone(&storage), config.snapshot.clone());
    let stats = Arc::new(ConnectionStats::new());

    let listener = match TcpListener::bind(config.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %config.bind_address(), error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(address = %config.bind_address(), "server started");

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("shutdown signal received");
    };

    tokio::select! {
        _ = accept_loop(listener, storage, stats) => {}
        _ = shutdown => {}
    }

    sweeper.stop();
    snapshots.stop().await;
    info!("server shutdown complete");
    Ok(())
}

async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);
                tokio::spawn(handle_connection(stream, addr, handler, stats));
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
