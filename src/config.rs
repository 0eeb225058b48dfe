//! Configuration for txkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Default capacity of the writer's request queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default capacity of the replay event channel
pub const DEFAULT_EVENT_BUFFER: usize = 16;

/// Main configuration for a txkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Transaction Log Configuration
    // -------------------------------------------------------------------------
    /// Which storage backend holds the transaction log
    pub backend: BackendConfig,

    /// Bounded request queue between producers and the writer thread.
    /// Producers block once it is full.
    pub queue_capacity: usize,

    /// Buffered events between the recovery reader and the replayer
    pub event_buffer: usize,

    /// Upper bound on how long `close` waits for outstanding writes.
    /// `None` drains unconditionally.
    pub close_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen address
    pub listen_addr: String,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Tab-delimited append-only file
    File { path: PathBuf, sync: SyncStrategy },

    /// `transactions` table in a SQLite database
    Sqlite { path: PathBuf },
}

/// File backend sync strategy: how often to fsync the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N appends; lines still reach the OS on every append
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::File {
                path: PathBuf::from("tmp/transaction.log"),
                sync: SyncStrategy::EveryWrite,
            },
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            close_timeout: None,
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Log to an append-only file
    pub fn file_backend(mut self, path: impl Into<PathBuf>, sync: SyncStrategy) -> Self {
        self.config.backend = BackendConfig::File {
            path: path.into(),
            sync,
        };
        self
    }

    /// Log to a SQLite database
    pub fn sqlite_backend(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backend = BackendConfig::Sqlite { path: path.into() };
        self
    }

    /// Set the writer queue capacity (clamped to at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    /// Set the replay event buffer (clamped to at least 1)
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity.max(1);
        self
    }

    /// Bound the drain performed by `close`
    pub fn close_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    /// Set the HTTP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
