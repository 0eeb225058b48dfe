//! SQLite Backend
//!
//! Stores events as rows of a single table:
//!
//! ```sql
//! CREATE TABLE transactions (
//!     sequence   INTEGER PRIMARY KEY AUTOINCREMENT,
//!     event_type SMALLINT,
//!     key        TEXT,
//!     value      TEXT
//! )
//! ```
//!
//! The table is assumed to be owned by exactly one logger. Rows inserted
//! from elsewhere are not guarded against.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, TxkvError};

use super::{NewRecord, RawRecord, StorageBackend};

const TABLE: &str = "transactions";

const CREATE_TABLE: &str = "CREATE TABLE transactions (
    sequence   INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type SMALLINT,
    key        TEXT,
    value      TEXT
)";

const INSERT_EVENT: &str = "INSERT INTO transactions (event_type, key, value) VALUES (?1, ?2, ?3)";

const SELECT_EVENTS: &str =
    "SELECT sequence, event_type, key, value FROM transactions ORDER BY sequence";

/// Transaction log stored in a SQLite table
pub struct SqliteBackend {
    conn: Connection,

    /// `None` for in-memory databases
    path: Option<PathBuf>,

    /// Highest sequence handed out by the table
    last_sequence: u64,
}

impl SqliteBackend {
    /// Open a database file, creating the table if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        Self::with_connection(conn, Some(path))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        let exists = table_exists(&conn)
            .map_err(|e| TxkvError::SchemaBootstrap(format!("failed to verify table exists: {e}")))?;

        if !exists {
            conn.execute(CREATE_TABLE, [])
                .map_err(|e| TxkvError::SchemaBootstrap(format!("failed to create table: {e}")))?;
            tracing::info!(table = TABLE, "created transactions table");
        }

        let last: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) FROM transactions",
            [],
            |row| row.get(0),
        )?;

        let backend = Self {
            conn,
            path,
            last_sequence: u64::try_from(last).unwrap_or(0),
        };

        tracing::info!(
            location = %backend.describe(),
            last_sequence = backend.last_sequence,
            "opened transaction log table"
        );

        Ok(backend)
    }
}

/// Whether the transactions table is present
fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    let name: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![TABLE],
            |row| row.get(0),
        )
        .optional()?;

    Ok(name.as_deref() == Some(TABLE))
}

impl StorageBackend for SqliteBackend {
    fn append(&mut self, record: NewRecord<'_>) -> Result<u64> {
        self.conn.execute(
            INSERT_EVENT,
            params![i64::from(record.event_type.code()), record.key, record.value],
        )?;

        let rowid = self.conn.last_insert_rowid();
        let sequence = u64::try_from(rowid).map_err(|_| TxkvError::NonMonotonicSequence {
            previous: self.last_sequence,
            assigned: 0,
        })?;
        self.last_sequence = sequence;

        Ok(sequence)
    }

    fn scan(&mut self, visit: &mut dyn FnMut(RawRecord) -> Result<()>) -> Result<()> {
        let mut stmt = self.conn.prepare(SELECT_EVENTS)?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let sequence: i64 = row.get(0)?;
            let event_type: i64 = row.get(1)?;
            let key: Option<String> = row.get(2)?;
            let value: Option<String> = row.get(3)?;

            let malformed = |reason: String| TxkvError::MalformedRecord {
                position: u64::try_from(sequence).unwrap_or(0),
                reason,
            };

            let sequence = u64::try_from(sequence)
                .map_err(|_| malformed(format!("negative sequence {sequence}")))?;
            let event_type = u8::try_from(event_type)
                .map_err(|_| malformed(format!("event type {event_type} out of range")))?;
            let key = key
                .filter(|k| !k.is_empty())
                .ok_or_else(|| malformed("empty key".to_string()))?;

            visit(RawRecord {
                sequence,
                event_type,
                key,
                value: value.unwrap_or_default(),
            })?;
        }

        Ok(())
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn sync(&mut self) -> Result<()> {
        // Every INSERT runs in its own implicit transaction
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite {}", path.display()),
            None => "sqlite :memory:".to_string(),
        }
    }
}
