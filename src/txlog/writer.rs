//! Log Writer
//!
//! The single background thread that persists queued operations, and the
//! state it shares with producers.
//!
//! ## Outstanding work
//! Every accepted write bumps `pending` before it is queued. The writer
//! settles it once the operation is persisted, or once it has been dropped
//! because the log already failed. `close` waits for `pending` to reach
//! zero, so it never returns while an accepted write is still in flight.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use crate::error::{Result, TxkvError};
use crate::storage::{NewRecord, StorageBackend};

use super::Operation;

/// Where a logger is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggerState {
    /// Constructed; `run` not called yet. Replay happens here.
    Idle,
    /// Writer thread is consuming the queue
    Running,
    /// `close` is draining outstanding writes
    Closing,
    /// Backend released
    Closed,
}

/// State shared between the logger handle and its writer thread
pub(crate) struct LoggerShared {
    pub(crate) lifecycle: Mutex<LoggerState>,

    /// Set once by the writer on the first persistence failure
    failure: Mutex<Option<String>>,

    pending: Mutex<u64>,
    drained: Condvar,

    /// Last sequence the backend handed back; written only by the writer
    last_sequence: AtomicU64,
}

impl LoggerShared {
    pub(crate) fn new(last_sequence: u64) -> Self {
        Self {
            lifecycle: Mutex::new(LoggerState::Idle),
            failure: Mutex::new(None),
            pending: Mutex::new(0),
            drained: Condvar::new(),
            last_sequence: AtomicU64::new(last_sequence),
        }
    }

    pub(crate) fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    fn fail(&self, reason: String) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(reason);
        }
    }

    pub(crate) fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    pub(crate) fn pending(&self) -> u64 {
        *self.pending.lock()
    }

    pub(crate) fn begin(&self) {
        *self.pending.lock() += 1;
    }

    pub(crate) fn settle(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until no accepted write is outstanding
    pub(crate) fn wait_drained(&self, timeout: Option<Duration>) -> Result<()> {
        let mut pending = self.pending.lock();

        match timeout {
            None => {
                while *pending > 0 {
                    self.drained.wait(&mut pending);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while *pending > 0 {
                    if self.drained.wait_until(&mut pending, deadline).timed_out() && *pending > 0 {
                        return Err(TxkvError::DrainTimeout { pending: *pending });
                    }
                }
            }
        }

        Ok(())
    }
}

/// Start the writer thread
pub(crate) fn spawn_writer<B: StorageBackend>(
    backend: Arc<Mutex<Option<B>>>,
    shared: Arc<LoggerShared>,
    requests: Receiver<Operation>,
    errors: Sender<TxkvError>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("txkv-writer".to_string())
        .spawn(move || run_writer(&backend, &shared, &requests, &errors))?;
    Ok(handle)
}

/// Consume operations in submission order until every sender is gone.
///
/// After the first failure nothing more is persisted: the remaining queue
/// is drained and settled so producers and `close` never hang.
fn run_writer<B: StorageBackend>(
    backend: &Mutex<Option<B>>,
    shared: &LoggerShared,
    requests: &Receiver<Operation>,
    errors: &Sender<TxkvError>,
) {
    let mut dropped: u64 = 0;

    for operation in requests.iter() {
        if shared.failure().is_none() {
            match persist(backend, shared, &operation) {
                Ok(sequence) => {
                    tracing::trace!(sequence, key = operation.key(), "persisted event");
                }
                Err(e) => {
                    tracing::error!(error = %e, key = operation.key(), "transaction log write failed, halting writer");
                    shared.fail(e.to_string());
                    report(errors, e);
                }
            }
        } else {
            dropped += 1;
        }
        shared.settle();
    }

    if dropped > 0 {
        tracing::warn!(dropped, "discarded writes queued after the log failed");
    }
    tracing::debug!("writer thread stopped");
}

fn persist<B: StorageBackend>(
    backend: &Mutex<Option<B>>,
    shared: &LoggerShared,
    operation: &Operation,
) -> Result<u64> {
    let mut guard = backend.lock();
    let backend = guard.as_mut().ok_or(TxkvError::LoggerClosed)?;

    let value = operation.encoded_value();
    let sequence = backend.append(NewRecord {
        event_type: operation.event_type(),
        key: operation.key(),
        value: &value,
    })?;

    let previous = shared.last_sequence();
    if sequence <= previous {
        return Err(TxkvError::NonMonotonicSequence {
            previous,
            assigned: sequence,
        });
    }
    shared.last_sequence.store(sequence, Ordering::Release);

    Ok(sequence)
}

/// Hand an error to whoever watches `err()`. Never blocks.
fn report(errors: &Sender<TxkvError>, error: TxkvError) {
    match errors.try_send(error) {
        Ok(()) => {}
        Err(TrySendError::Full(error)) => {
            tracing::warn!(error = %error, "error channel full, dropping error");
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}
