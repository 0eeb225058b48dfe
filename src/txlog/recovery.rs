//! Recovery
//!
//! Rebuilds the in-memory map at startup by replaying every persisted event.
//!
//! The reader streams events and errors on two channels. Replay waits on
//! whichever has something next, applies events in order, and stops at the
//! first error or once both channels are closed. Any error is fatal: a
//! partially recovered map must never serve traffic.

use crossbeam::channel::{never, Receiver};
use crossbeam::select;

use crate::error::{Result, TxkvError};
use crate::store::KvStore;

use super::{Event, EventType, TransactionLogger};

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of events applied
    pub events_replayed: u64,

    pub puts: u64,

    pub deletes: u64,

    /// Sequence of the last applied event (0 for an empty log)
    pub last_sequence: u64,
}

impl RecoveryResult {
    fn record(&mut self, event: &Event) {
        self.events_replayed += 1;
        self.last_sequence = event.sequence;
        match event.event_type {
            EventType::Put => self.puts += 1,
            EventType::Delete => self.deletes += 1,
        }
    }
}

/// Replays a transaction log into a store
pub struct Recovery;

impl Recovery {
    /// Replay the whole log of `logger` into `store`.
    ///
    /// Must run before `logger.run()`.
    pub fn replay(logger: &dyn TransactionLogger, store: &KvStore) -> Result<RecoveryResult> {
        let (events, errors) = logger.read_events();
        let result = Self::drain(&events, &errors, |event| store.apply(event))?;

        tracing::info!(
            events = result.events_replayed,
            puts = result.puts,
            deletes = result.deletes,
            last_sequence = result.last_sequence,
            keys = store.len(),
            "events replayed"
        );
        Ok(result)
    }

    /// Verify a log without applying it anywhere
    pub fn verify(logger: &dyn TransactionLogger) -> Result<RecoveryResult> {
        let (events, errors) = logger.read_events();
        Self::drain(&events, &errors, |_| Ok(()))
    }

    /// Fan in over the event and error channels until both are exhausted.
    ///
    /// `apply` sees every event in order; its first error stops the drain.
    pub fn drain<F>(
        events: &Receiver<Event>,
        errors: &Receiver<TxkvError>,
        mut apply: F,
    ) -> Result<RecoveryResult>
    where
        F: FnMut(&Event) -> Result<()>,
    {
        let closed_events = never::<Event>();
        let closed_errors = never::<TxkvError>();
        let mut events_open = true;
        let mut errors_open = true;
        let mut result = RecoveryResult::default();

        while events_open || errors_open {
            let event_source = if events_open { events } else { &closed_events };
            let error_source = if errors_open { errors } else { &closed_errors };

            select! {
                recv(event_source) -> message => match message {
                    Ok(event) => {
                        apply(&event)?;
                        result.record(&event);
                    }
                    Err(_) => events_open = false,
                },
                recv(error_source) -> message => match message {
                    Ok(error) => return Err(error),
                    Err(_) => errors_open = false,
                },
            }
        }

        Ok(result)
    }
}
