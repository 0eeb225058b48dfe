//! Transaction Log Module
//!
//! Makes every store mutation durable and replayable.
//!
//! ## Responsibilities
//! - Queue mutations without blocking producers on I/O
//! - Persist them in submission order through one writer thread
//! - Report write failures asynchronously and halt the log on the first one
//! - Stream the full history back, in order, for startup recovery
//!
//! ## Record Format (file backend)
//! ```text
//! ┌──────────────┬──────────┬─────────┬────────────────────────┐
//! │ sequence u64 │ type u8  │ key     │ percent-encoded value  │
//! └──────────────┴──────────┴─────────┴────────────────────────┘
//!        \t           \t         \t                            \n
//! ```
//! Event type codes: `1` = delete, `2` = put. `0` is never written.
//!
//! ## Startup contract
//! 1. construct the logger
//! 2. replay with [`Recovery::replay`], aborting on the first error
//! 3. call [`TransactionLogger::run`]
//! 4. start accepting requests

mod event;
mod logger;
mod reader;
mod recovery;
mod writer;

use std::sync::Arc;

use crossbeam::channel::Receiver;

use crate::config::{BackendConfig, Config};
use crate::error::{Result, TxkvError};
use crate::storage::{FileBackend, SqliteBackend};

pub use event::{decode_value, encode_value, validate_key, Event, EventType, Operation};
pub use logger::{FileTransactionLogger, Logger, LoggerOptions, SqliteTransactionLogger};
pub use recovery::{Recovery, RecoveryResult};
pub use writer::LoggerState;

/// Capability interface shared by every logger, whatever its backend
pub trait TransactionLogger: Send + Sync {
    /// Queue a put. Returns once queued, not once persisted.
    fn write_put(&self, key: &str, value: &str) -> Result<()>;

    /// Queue a delete. Returns once queued, not once persisted.
    fn write_delete(&self, key: &str) -> Result<()>;

    /// Start the writer thread. Call exactly once, after replay.
    fn run(&self) -> Result<()>;

    /// Stream the stored history: events in ascending order, and errors.
    /// Single pass; not meant to overlap with a running writer.
    fn read_events(&self) -> (Receiver<Event>, Receiver<TxkvError>);

    /// Asynchronous write failures
    fn err(&self) -> Receiver<TxkvError>;

    /// Wait for every queued write to be persisted, then release the backend
    fn close(&self) -> Result<()>;

    /// Sequence of the last persisted event
    fn last_sequence(&self) -> u64;

    /// Accepted writes not yet persisted
    fn pending(&self) -> u64;

    /// Why the writer halted, if it did
    fn failure(&self) -> Option<String>;

    fn state(&self) -> LoggerState;
}

/// Build the logger described by `config`.
///
/// Construction errors (open, schema bootstrap) are returned immediately.
pub fn open_logger(config: &Config) -> Result<Arc<dyn TransactionLogger>> {
    let options = LoggerOptions::from(config);

    let logger: Arc<dyn TransactionLogger> = match &config.backend {
        BackendConfig::File { path, sync } => {
            Arc::new(Logger::new(FileBackend::open(path, *sync)?, options))
        }
        BackendConfig::Sqlite { path } => Arc::new(Logger::new(SqliteBackend::open(path)?, options)),
    };

    Ok(logger)
}
