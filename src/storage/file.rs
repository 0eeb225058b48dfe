//! File Backend
//!
//! Append-only text log, one event per line:
//!
//! ```text
//! <sequence>\t<event_type>\t<key>\t<percent-encoded value>\n
//! ```
//!
//! The file is opened in append mode and created if absent. Reads are a
//! forward-only line scan from the start of the file through a separate
//! read handle; there is no index.
//!
//! Every line ends with `\n`. An unterminated last line left by a crash is
//! cut off when the file is opened, so the next append starts a fresh line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::{Result, TxkvError};

use super::{NewRecord, RawRecord, StorageBackend};

/// What `open` learns from the existing file
#[derive(Debug, Default)]
struct Tail {
    last_sequence: u64,

    /// Bytes covered by newline-terminated lines
    valid_len: u64,

    /// Length of an unterminated final line, if any
    torn_bytes: Option<u64>,
}

/// Transaction log stored in a flat file
pub struct FileBackend {
    /// Location of the log, reopened for every scan
    path: PathBuf,

    /// Append handle
    file: File,

    sync_strategy: SyncStrategy,

    /// Highest sequence written to the file
    last_sequence: u64,

    /// Appends since the last fsync
    unsynced: usize,
}

impl FileBackend {
    /// Open or create a log file
    ///
    /// Missing parent directories are created. The existing tail sequence is
    /// read so new appends continue after it.
    pub fn open(path: impl AsRef<Path>, sync_strategy: SyncStrategy) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let tail = Self::read_tail(&path)?;
        if let Some(torn) = tail.torn_bytes {
            // An unterminated last line is an append cut short by a crash
            tracing::warn!(
                path = %path.display(),
                torn_bytes = torn,
                kept_bytes = tail.valid_len,
                "truncating torn record at end of transaction log"
            );
            file.set_len(tail.valid_len)?;
            file.sync_all()?;
        }
        let last_sequence = tail.last_sequence;

        tracing::info!(
            path = %path.display(),
            last_sequence,
            "opened transaction log file"
        );

        Ok(Self {
            path,
            file,
            sync_strategy,
            last_sequence,
            unsynced: 0,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest leading sequence number on any complete line, and where the
    /// complete lines end.
    ///
    /// Lines that do not start with a number are skipped here; the replay
    /// scan is what rejects them.
    fn read_tail(path: &Path) -> Result<Tail> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut tail = Tail::default();
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            if line.last() != Some(&b'\n') {
                tail.torn_bytes = Some(read as u64);
                break;
            }
            tail.valid_len += read as u64;

            let head = line.split(|b| *b == b'\t').next().unwrap_or_default();
            if let Some(sequence) = std::str::from_utf8(head)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
            {
                tail.last_sequence = tail.last_sequence.max(sequence);
            }
        }

        Ok(tail)
    }

    fn after_append(&mut self) -> Result<()> {
        match self.sync_strategy {
            SyncStrategy::EveryWrite => self.file.sync_data()?,
            SyncStrategy::EveryNEntries { count } => {
                self.unsynced += 1;
                if self.unsynced >= count.max(1) {
                    self.file.sync_data()?;
                    self.unsynced = 0;
                }
            }
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn append(&mut self, record: NewRecord<'_>) -> Result<u64> {
        let sequence = self.last_sequence + 1;
        let line = format!(
            "{}\t{}\t{}\t{}\n",
            sequence,
            record.event_type.code(),
            record.key,
            record.value
        );

        self.file.write_all(line.as_bytes())?;
        // The line is in the file now, so its number is spent even if sync fails
        self.last_sequence = sequence;
        self.after_append()?;

        Ok(sequence)
    }

    fn scan(&mut self, visit: &mut dyn FnMut(RawRecord) -> Result<()>) -> Result<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut buf = Vec::new();
        let mut line_no: u64 = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line_no += 1;

            let malformed = |reason: &str| TxkvError::MalformedRecord {
                position: line_no,
                reason: reason.to_string(),
            };
            let Some(body) = buf.strip_suffix(b"\n") else {
                return Err(malformed("missing line terminator"));
            };
            let line = std::str::from_utf8(body).map_err(|_| malformed("line is not UTF-8"))?;

            visit(parse_line(line, line_no)?)?;
        }

        Ok(())
    }

    fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Parse one log line; `line_no` is 1-based and only used in errors
pub fn parse_line(line: &str, line_no: u64) -> Result<RawRecord> {
    let malformed = |reason: String| TxkvError::MalformedRecord {
        position: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let [sequence, event_type, key, value] = fields.as_slice() else {
        return Err(malformed(format!(
            "expected 4 tab-separated fields, found {}",
            fields.len()
        )));
    };

    let sequence = sequence
        .parse::<u64>()
        .map_err(|e| malformed(format!("bad sequence {sequence:?}: {e}")))?;
    let event_type = event_type
        .parse::<u8>()
        .map_err(|e| malformed(format!("bad event type {event_type:?}: {e}")))?;
    if key.is_empty() {
        return Err(malformed("empty key".to_string()));
    }

    Ok(RawRecord {
        sequence,
        event_type,
        key: (*key).to_string(),
        value: (*value).to_string(),
    })
}
