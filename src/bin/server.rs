//! txkv Server Binary
//!
//! Replays the transaction log, then serves the HTTP API.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};
use txkv::config::SyncStrategy;
use txkv::http::serve;
use txkv::{Config, Engine};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    File,
    Sqlite,
}

/// txkv Server
#[derive(Parser, Debug)]
#[command(name = "txkv-server")]
#[command(about = "Key-value store with a durable transaction log")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, env = "TXKV_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Transaction log backend
    #[arg(short, long, env = "TXKV_BACKEND", value_enum, default_value = "file")]
    backend: Backend,

    /// Log file used by the file backend
    #[arg(long, env = "TXKV_LOG_PATH", default_value = "tmp/transaction.log")]
    log_path: PathBuf,

    /// Database file used by the sqlite backend
    #[arg(long, env = "TXKV_DB_PATH", default_value = "tmp/transactions.db")]
    db_path: PathBuf,

    /// fsync the log file every N appends instead of after each one
    #[arg(long, env = "TXKV_SYNC_EVERY")]
    sync_every: Option<usize>,

    /// Writer queue capacity
    #[arg(short, long, env = "TXKV_QUEUE_CAPACITY", default_value = "16")]
    queue_capacity: usize,

    /// Give up draining the log on shutdown after this many seconds
    #[arg(long, env = "TXKV_CLOSE_TIMEOUT_SECS")]
    close_timeout_secs: Option<u64>,
}

impl Args {
    fn config(&self) -> Config {
        let builder = Config::builder()
            .listen_addr(&self.listen)
            .queue_capacity(self.queue_capacity)
            .close_timeout(self.close_timeout_secs.map(Duration::from_secs));

        match self.backend {
            Backend::File => {
                let sync = match self.sync_every {
                    Some(count) => SyncStrategy::EveryNEntries { count },
                    None => SyncStrategy::EveryWrite,
                };
                builder.file_backend(&self.log_path, sync)
            }
            Backend::Sqlite => builder.sqlite_backend(&self.db_path),
        }
        .build()
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,txkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let config = args.config();

    tracing::info!("txkv Server v{}", txkv::VERSION);
    tracing::info!("Backend: {:?}", config.backend);
    tracing::info!("Listen address: {}", config.listen_addr);

    // Replay before accepting any traffic; a partial map must never serve
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to recover transaction log: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Engine initialized: {} events replayed, {} keys",
        engine.recovery().events_replayed,
        engine.store().len()
    );

    // Surface asynchronous log failures; ends when the writer stops
    let errors = engine.errors();
    thread::spawn(move || {
        for error in errors.iter() {
            tracing::error!("Transaction log failure: {}", error);
        }
    });

    let listener = match TcpListener::bind(&config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = serve(listener, Arc::clone(&engine), shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close transaction log: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating shutdown...");
}
