//! Event definitions
//!
//! Defines the structure of individual transaction log records and the
//! percent-encoding applied to values before they are persisted.

use std::borrow::Cow;

use crate::error::{Result, TxkvError};
use crate::storage::RawRecord;

/// Kind of mutation recorded by an event.
///
/// The numeric codes are persisted and must never change. Zero is left
/// unused so an uninitialized field is never mistaken for a real event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    Delete = 1,
    Put = 2,
}

impl EventType {
    /// Persisted numeric code
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = TxkvError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(EventType::Delete),
            2 => Ok(EventType::Put),
            other => Err(TxkvError::UnknownEventType(other)),
        }
    }
}

/// A single persisted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Sequence number - strictly increasing, starts at 1
    pub sequence: u64,

    /// Put or delete
    pub event_type: EventType,

    /// The mutated key
    pub key: String,

    /// Decoded value; empty for deletes
    pub value: String,
}

impl Event {
    /// Rebuild an event from a stored record, decoding its value
    pub fn from_raw(raw: RawRecord) -> Result<Self> {
        let event_type = EventType::try_from(raw.event_type)?;
        let value = decode_value(&raw.value)?;

        Ok(Self {
            sequence: raw.sequence,
            event_type,
            key: raw.key,
            value,
        })
    }
}

/// A mutation waiting for the writer to assign it a sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: String, value: String },

    /// Delete a key
    Delete { key: String },
}

impl Operation {
    pub fn event_type(&self) -> EventType {
        match self {
            Operation::Put { .. } => EventType::Put,
            Operation::Delete { .. } => EventType::Delete,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }

    /// Value as it is written to the backend
    pub fn encoded_value(&self) -> Cow<'_, str> {
        match self {
            Operation::Put { value, .. } => encode_value(value),
            Operation::Delete { .. } => Cow::Borrowed(""),
        }
    }
}

/// Check that a key can be stored unescaped in a delimited record
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(TxkvError::InvalidKey("key must not be empty".to_string()));
    }
    if key.contains(['\t', '\n', '\r']) {
        return Err(TxkvError::InvalidKey(format!(
            "key {key:?} contains a tab or line break"
        )));
    }
    Ok(())
}

/// Percent-encode a value. Spaces become `%20` and `+` becomes `%2B`.
pub fn encode_value(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Decode a percent-encoded value.
///
/// `+` is read as a space so logs written with query escaping replay too.
/// Escapes must be `%` followed by two hex digits.
pub fn decode_value(encoded: &str) -> Result<String> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(|b| b.is_ascii_hexdigit()));
            if !valid {
                return Err(TxkvError::ValueDecode(format!(
                    "invalid escape at byte {i} in {encoded:?}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = encoded.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|e| TxkvError::ValueDecode(e.to_string()))
}
