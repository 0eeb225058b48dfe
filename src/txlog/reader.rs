//! Log Reader
//!
//! Produces the historical event sequence for recovery. The scan runs on
//! its own thread and streams into two channels: events in ascending
//! sequence order, and at most one error. Both channels close when the
//! scan ends.

use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::error::{Result, TxkvError};
use crate::storage::StorageBackend;

use super::Event;

/// Start a scan of `backend`
pub(crate) fn spawn_reader<B: StorageBackend>(
    backend: Arc<Mutex<Option<B>>>,
    buffer: usize,
) -> (Receiver<Event>, Receiver<TxkvError>) {
    let (event_tx, event_rx) = bounded(buffer.max(1));
    let (error_tx, error_rx) = bounded(1);
    let spawn_errors = error_tx.clone();

    let spawned = thread::Builder::new()
        .name("txkv-reader".to_string())
        .spawn(move || {
            if let Err(e) = scan_events(&backend, &event_tx) {
                tracing::error!(error = %e, "transaction log scan aborted");
                let _ = error_tx.send(e);
            }
        });

    if let Err(e) = spawned {
        let _ = spawn_errors.send(TxkvError::Io(e));
    }

    (event_rx, error_rx)
}

/// Scan every record, decode it and enforce strictly increasing sequences.
///
/// The first violation ends the scan; nothing after it is emitted.
fn scan_events<B: StorageBackend>(
    backend: &Mutex<Option<B>>,
    events: &Sender<Event>,
) -> Result<()> {
    let mut guard = backend.lock();
    let backend = guard.as_mut().ok_or(TxkvError::LoggerClosed)?;

    let mut last_seen: u64 = 0;
    let mut count: u64 = 0;

    backend.scan(&mut |raw| {
        let event = Event::from_raw(raw)?;

        if event.sequence <= last_seen {
            return Err(TxkvError::OutOfSequence {
                previous: last_seen,
                found: event.sequence,
            });
        }
        last_seen = event.sequence;
        count += 1;

        events.send(event).map_err(|_| {
            TxkvError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "replay consumer stopped reading",
            ))
        })
    })?;

    tracing::debug!(count, last_sequence = last_seen, "transaction log scan complete");
    Ok(())
}
