//! Error types for txkv
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using TxkvError
pub type Result<T> = std::result::Result<T, TxkvError>;

/// Unified error type for txkv operations
#[derive(Debug, Error)]
pub enum TxkvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("no such key")]
    KeyNotFound,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    // -------------------------------------------------------------------------
    // Replay Errors
    // -------------------------------------------------------------------------
    #[error("transaction numbers out of sequence: {found} follows {previous}")]
    OutOfSequence { previous: u64, found: u64 },

    #[error("value decoding failure: {0}")]
    ValueDecode(String),

    #[error("malformed record at {position}: {reason}")]
    MalformedRecord { position: u64, reason: String },

    #[error("unknown event type {0}")]
    UnknownEventType(u8),

    // -------------------------------------------------------------------------
    // Logger Errors
    // -------------------------------------------------------------------------
    #[error("failed to bootstrap transactions table: {0}")]
    SchemaBootstrap(String),

    #[error("transaction logger is not running")]
    LoggerNotRunning,

    #[error("transaction logger is already running")]
    LoggerAlreadyRunning,

    #[error("transaction logger is closed")]
    LoggerClosed,

    #[error("transaction logger halted after write failure: {0}")]
    LoggerFailed(String),

    #[error("backend assigned sequence {assigned} after {previous}")]
    NonMonotonicSequence { previous: u64, assigned: u64 },

    #[error("timed out draining transaction log, {pending} writes outstanding")]
    DrainTimeout { pending: u64 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
