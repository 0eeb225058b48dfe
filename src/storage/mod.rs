//! Storage Module
//!
//! Durable media holding the ordered event sequence.
//!
//! ## Responsibilities
//! - Append one record per event and hand back its sequence number
//! - Forward-only scan of every stored record, oldest first
//! - Own the underlying handle (file descriptor / database connection)
//!
//! ## Backends
//! - [`FileBackend`]: append-only text file, one tab-delimited line per event
//! - [`SqliteBackend`]: `transactions` table with an auto-incrementing key
//!
//! Backends know nothing about value encoding or sequence validation; both
//! live in the transaction logger so the two backends stay interchangeable.

mod file;
mod sqlite;

pub use file::FileBackend;
pub use sqlite::SqliteBackend;

use crate::error::Result;
use crate::txlog::EventType;

/// A record as stored by a backend, value still percent-encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub sequence: u64,
    pub event_type: u8,
    pub key: String,
    pub value: String,
}

/// A record about to be appended; the backend assigns its sequence
#[derive(Debug, Clone, Copy)]
pub struct NewRecord<'a> {
    pub event_type: EventType,
    pub key: &'a str,
    /// Already percent-encoded
    pub value: &'a str,
}

/// Durable medium for the transaction log.
///
/// The backend is the sole sequence authority: `append` returns the number
/// it assigned, which must be greater than every number assigned before.
pub trait StorageBackend: Send + 'static {
    /// Persist one record and return its sequence number
    fn append(&mut self, record: NewRecord<'_>) -> Result<u64>;

    /// Visit every stored record in ascending sequence order.
    /// An error returned by `visit` stops the scan and is returned as is.
    fn scan(&mut self, visit: &mut dyn FnMut(RawRecord) -> Result<()>) -> Result<()>;

    /// Highest sequence number stored so far (0 when empty)
    fn last_sequence(&self) -> u64;

    /// Flush anything buffered to durable storage
    fn sync(&mut self) -> Result<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}
