//! Transaction Logger
//!
//! [`Logger`] is the backend-agnostic implementation of
//! [`TransactionLogger`]. It owns the backend handle, the writer thread and
//! the outstanding-work counter.

use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, SendError, Sender};
use parking_lot::Mutex;

use crate::config::{Config, SyncStrategy, DEFAULT_EVENT_BUFFER, DEFAULT_QUEUE_CAPACITY};
use crate::error::{Result, TxkvError};
use crate::storage::{FileBackend, SqliteBackend, StorageBackend};

use super::event::validate_key;
use super::reader::spawn_reader;
use super::writer::{spawn_writer, LoggerShared, LoggerState};
use super::{Event, Operation, TransactionLogger};

/// Tunables for a logger instance
#[derive(Debug, Clone, Copy)]
pub struct LoggerOptions {
    /// Bounded request queue; producers block once it is full
    pub queue_capacity: usize,

    /// Events buffered between the reader thread and the replayer
    pub event_buffer: usize,

    /// Bound on the drain performed by `close`
    pub close_timeout: Option<Duration>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            close_timeout: None,
        }
    }
}

impl From<&Config> for LoggerOptions {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            event_buffer: config.event_buffer,
            close_timeout: config.close_timeout,
        }
    }
}

/// Transaction logger over any storage backend
///
/// ## Concurrency
/// - Producers call `write_put`/`write_delete` from any thread; they only
///   block when the request queue is full.
/// - One writer thread persists operations in queue order. It is the only
///   code that advances `last_sequence`.
/// - The backend sits behind a mutex so the reader, the writer and `close`
///   can each borrow it, but they are never meant to overlap.
pub struct Logger<B: StorageBackend> {
    /// `None` once closed
    backend: Arc<Mutex<Option<B>>>,

    shared: Arc<LoggerShared>,

    /// Producer side of the request queue; `None` until `run`
    requests: Mutex<Option<Sender<Operation>>>,

    /// Consumer side of the error channel, handed out by `err`
    errors: Receiver<TxkvError>,

    /// Producer side of the error channel, moved into the writer by `run`
    error_sender: Mutex<Option<Sender<TxkvError>>>,

    writer: Mutex<Option<JoinHandle<()>>>,

    options: LoggerOptions,

    /// Backend description for logs
    location: String,
}

/// Logger writing to a flat file
pub type FileTransactionLogger = Logger<FileBackend>;

/// Logger writing to a SQLite table
pub type SqliteTransactionLogger = Logger<SqliteBackend>;

impl<B: StorageBackend> Logger<B> {
    /// Wrap an opened backend. Nothing is started until `run`.
    pub fn new(backend: B, options: LoggerOptions) -> Self {
        let (error_tx, error_rx) = bounded(1);
        let location = backend.describe();
        let shared = Arc::new(LoggerShared::new(backend.last_sequence()));

        Self {
            backend: Arc::new(Mutex::new(Some(backend))),
            shared,
            requests: Mutex::new(None),
            errors: error_rx,
            error_sender: Mutex::new(Some(error_tx)),
            writer: Mutex::new(None),
            options,
            location,
        }
    }

    /// Queue an operation for the writer
    fn submit(&self, operation: Operation) -> Result<()> {
        validate_key(operation.key())?;

        let sender = {
            let lifecycle = self.shared.lifecycle.lock();
            if let Some(reason) = self.shared.failure() {
                return Err(TxkvError::LoggerFailed(reason));
            }
            match *lifecycle {
                LoggerState::Running => {}
                LoggerState::Idle => return Err(TxkvError::LoggerNotRunning),
                LoggerState::Closing | LoggerState::Closed => return Err(TxkvError::LoggerClosed),
            }

            let sender = self.requests.lock().clone().ok_or(TxkvError::LoggerClosed)?;
            // Counted while the lifecycle lock is held so close cannot miss it
            self.shared.begin();
            sender
        };

        if let Err(SendError(operation)) = sender.send(operation) {
            self.shared.settle();
            tracing::error!(key = operation.key(), "writer thread is gone, write not queued");
            return Err(TxkvError::LoggerClosed);
        }

        Ok(())
    }
}

impl Logger<FileBackend> {
    /// Open (or create) a file-backed logger with default options
    pub fn open_file(path: impl AsRef<Path>, sync_strategy: SyncStrategy) -> Result<Self> {
        Ok(Self::new(
            FileBackend::open(path, sync_strategy)?,
            LoggerOptions::default(),
        ))
    }
}

impl Logger<SqliteBackend> {
    /// Open (or create) a SQLite-backed logger with default options
    pub fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SqliteBackend::open(path)?, LoggerOptions::default()))
    }
}

impl<B: StorageBackend> TransactionLogger for Logger<B> {
    fn write_put(&self, key: &str, value: &str) -> Result<()> {
        self.submit(Operation::Put {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    fn write_delete(&self, key: &str) -> Result<()> {
        self.submit(Operation::Delete {
            key: key.to_string(),
        })
    }

    fn run(&self) -> Result<()> {
        let mut lifecycle = self.shared.lifecycle.lock();
        match *lifecycle {
            LoggerState::Idle => {}
            LoggerState::Running => return Err(TxkvError::LoggerAlreadyRunning),
            LoggerState::Closing | LoggerState::Closed => return Err(TxkvError::LoggerClosed),
        }

        let errors = self
            .error_sender
            .lock()
            .take()
            .ok_or(TxkvError::LoggerAlreadyRunning)?;
        let (request_tx, request_rx) = bounded(self.options.queue_capacity.max(1));

        let handle = spawn_writer(
            Arc::clone(&self.backend),
            Arc::clone(&self.shared),
            request_rx,
            errors,
        )?;

        *self.requests.lock() = Some(request_tx);
        *self.writer.lock() = Some(handle);
        *lifecycle = LoggerState::Running;

        tracing::info!(
            location = %self.location,
            queue_capacity = self.options.queue_capacity,
            last_sequence = self.shared.last_sequence(),
            "transaction logger running"
        );
        Ok(())
    }

    fn read_events(&self) -> (Receiver<Event>, Receiver<TxkvError>) {
        if *self.shared.lifecycle.lock() == LoggerState::Running {
            tracing::warn!(location = %self.location, "reading events while the writer is running");
        }
        spawn_reader(Arc::clone(&self.backend), self.options.event_buffer)
    }

    fn err(&self) -> Receiver<TxkvError> {
        self.errors.clone()
    }

    fn close(&self) -> Result<()> {
        {
            let mut lifecycle = self.shared.lifecycle.lock();
            if *lifecycle == LoggerState::Closed {
                return Ok(());
            }
            *lifecycle = LoggerState::Closing;
        }

        tracing::info!(
            location = %self.location,
            pending = self.shared.pending(),
            "draining transaction log"
        );
        self.shared.wait_drained(self.options.close_timeout)?;

        // Dropping the last sender ends the writer loop
        drop(self.requests.lock().take());
        if let Some(handle) = self.writer.lock().take() {
            if handle.join().is_err() {
                tracing::error!("writer thread panicked");
            }
        }

        let synced = match self.backend.lock().take() {
            Some(mut backend) => backend.sync(),
            None => Ok(()),
        };
        *self.shared.lifecycle.lock() = LoggerState::Closed;

        tracing::info!(
            location = %self.location,
            last_sequence = self.shared.last_sequence(),
            "transaction logger closed"
        );

        synced?;
        match self.shared.failure() {
            Some(reason) => Err(TxkvError::LoggerFailed(reason)),
            None => Ok(()),
        }
    }

    fn last_sequence(&self) -> u64 {
        self.shared.last_sequence()
    }

    fn pending(&self) -> u64 {
        self.shared.pending()
    }

    fn failure(&self) -> Option<String> {
        self.shared.failure()
    }

    fn state(&self) -> LoggerState {
        *self.shared.lifecycle.lock()
    }
}

impl<B: StorageBackend> Drop for Logger<B> {
    fn drop(&mut self) {
        if self.state() != LoggerState::Closed {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "closing transaction logger on drop failed");
            }
        }
    }
}
