//! Engine Module
//!
//! Ties the in-memory store to its transaction log.
//!
//! ## Responsibilities
//! - Run the startup contract: open log → replay → start writer
//! - Pair every store mutation with a log write, in the same order
//! - Refuse mutations once the log has failed, and undo any the log did
//!   not accept
//! - Drain the log on shutdown

use std::sync::Arc;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, TxkvError};
use crate::store::KvStore;
use crate::txlog::{
    open_logger, validate_key, LoggerState, Recovery, RecoveryResult, TransactionLogger,
};

/// The key-value engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete): serialized by `write_lock`, which covers both
///   the store mutation and the log enqueue. The order in which the store
///   sees mutations is therefore the order in which they are persisted.
///   The enqueue only blocks when the log's request queue is full.
/// - **Reads** (get): no write lock; the store's RwLock allows many
///   concurrent readers.
pub struct Engine {
    config: Config,

    store: KvStore,

    logger: Arc<dyn TransactionLogger>,

    /// Serializes write operations (put/delete)
    write_lock: Mutex<()>,

    /// What startup replay found
    recovery: RecoveryResult,
}

/// Point-in-time view of the engine, served by `/healthz`
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub status: &'static str,
    pub keys: usize,
    pub logger: LoggerState,
    pub last_sequence: u64,
    pub pending: u64,
    pub failure: Option<String>,
}

impl Engine {
    /// Open the configured log, replay it and start the writer
    pub fn open(config: Config) -> Result<Self> {
        let logger = open_logger(&config)?;
        Self::with_logger(config, logger)
    }

    /// Replay an already constructed logger and start its writer.
    ///
    /// The logger must not be running yet. Any replay error aborts startup.
    pub fn with_logger(config: Config, logger: Arc<dyn TransactionLogger>) -> Result<Self> {
        let store = KvStore::new();
        let recovery = Recovery::replay(logger.as_ref(), &store)?;
        logger.run()?;

        Ok(Self {
            config,
            store,
            logger,
            write_lock: Mutex::new(()),
            recovery,
        })
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Result<String> {
        self.store.get(key)
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Refuse if the log has failed
    /// 3. Write to the store
    /// 4. Queue the log write, undoing step 3 if the log refuses it
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        let _write_guard = self.write_lock.lock();

        self.ensure_writable()?;
        let previous = self.store.put(key, value)?;
        self.logged(key, previous, self.logger.write_put(key, value))
    }

    /// Delete a key
    ///
    /// Absent keys report `KeyNotFound` and nothing is logged.
    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let _write_guard = self.write_lock.lock();

        self.ensure_writable()?;
        let previous = self.store.delete(key)?;
        self.logged(key, Some(previous), self.logger.write_delete(key))
    }

    /// Put `key` back to `previous` if the log did not queue the mutation.
    ///
    /// The logger can close or fail after `ensure_writable`. Must be called
    /// with `write_lock` held.
    fn logged(&self, key: &str, previous: Option<String>, queued: Result<()>) -> Result<()> {
        if let Err(e) = queued {
            self.store.restore(key, previous);
            tracing::warn!(key, error = %e, "log refused mutation, store rolled back");
            return Err(e);
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if let Some(reason) = self.logger.failure() {
            return Err(TxkvError::LoggerFailed(reason));
        }
        match self.logger.state() {
            LoggerState::Running => Ok(()),
            LoggerState::Idle => Err(TxkvError::LoggerNotRunning),
            LoggerState::Closing | LoggerState::Closed => Err(TxkvError::LoggerClosed),
        }
    }

    /// Drain outstanding log writes and release the backend
    pub fn close(&self) -> Result<()> {
        self.logger.close()
    }

    /// Asynchronous log failures, for monitoring
    pub fn errors(&self) -> Receiver<TxkvError> {
        self.logger.err()
    }

    pub fn status(&self) -> EngineStatus {
        let failure = self.logger.failure();
        EngineStatus {
            status: if failure.is_some() { "failed" } else { "ok" },
            keys: self.store.len(),
            logger: self.logger.state(),
            last_sequence: self.logger.last_sequence(),
            pending: self.logger.pending(),
            failure,
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn logger(&self) -> &Arc<dyn TransactionLogger> {
        &self.logger
    }

    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
