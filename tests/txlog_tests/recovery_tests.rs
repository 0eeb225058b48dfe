//! Tests for Recovery
//!
//! These tests verify:
//! - Replay rebuilds the map from puts and deletes
//! - Out-of-sequence records abort the scan before they are emitted
//! - Malformed values, lines and event types abort recovery
//! - Logs written with query escaping still replay
//! - The fan-in drain stops on the first error
//! - A crash-torn last line does not poison later restarts

use std::fs;
use std::path::Path;
use std::time::Duration;

use crossbeam::channel::bounded;
use tempfile::TempDir;
use txkv::config::SyncStrategy;
use txkv::store::KvStore;
use txkv::txlog::{FileTransactionLogger, Recovery, RecoveryResult};
use txkv::{Event, EventType, TransactionLogger, TxkvError};

// =============================================================================
// Helper Functions
// =============================================================================

fn write_log(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("transaction.log");
    fs::write(&path, contents).unwrap();
    path
}

fn open(path: &Path) -> FileTransactionLogger {
    FileTransactionLogger::open_file(path, SyncStrategy::EveryWrite).unwrap()
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_puts_and_deletes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("transaction.log");

    {
        let logger = open(&path);
        logger.run().unwrap();
        logger.write_put("a", "1").unwrap();
        logger.write_put("b", "2").unwrap();
        logger.write_delete("a").unwrap();
        logger.write_put("a", "3").unwrap();
        logger.close().unwrap();
    }

    let logger = open(&path);
    let store = KvStore::new();
    let result = Recovery::replay(&logger, &store).unwrap();

    assert_eq!(
        result,
        RecoveryResult {
            events_replayed: 4,
            puts: 3,
            deletes: 1,
            last_sequence: 4,
        }
    );
    assert_eq!(store.len(), 2);
    assert_eq!(store.get("a").unwrap(), "3");
    assert_eq!(store.get("b").unwrap(), "2");
}

#[test]
fn test_replay_empty_log() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "");

    let store = KvStore::new();
    let result = Recovery::replay(&open(&path), &store).unwrap();

    assert_eq!(result, RecoveryResult::default());
    assert!(store.is_empty());
}

#[test]
fn test_replay_delete_of_unknown_key() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t1\tghost\t\n2\t2\tk\tv\n");

    let store = KvStore::new();
    let result = Recovery::replay(&open(&path), &store).unwrap();

    assert_eq!(result.events_replayed, 2);
    assert_eq!(store.get("k").unwrap(), "v");
    assert!(!store.contains_key("ghost"));
}

#[test]
fn test_replay_query_escaped_values() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\tgreeting\thello+world%21\n");

    let store = KvStore::new();
    Recovery::replay(&open(&path), &store).unwrap();

    assert_eq!(store.get("greeting").unwrap(), "hello world!");
}

#[test]
fn test_replay_tolerates_gaps() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\ta\t1\n5\t2\tb\t2\n9\t2\tc\t3\n");

    let result = Recovery::verify(&open(&path)).unwrap();

    assert_eq!(result.events_replayed, 3);
    assert_eq!(result.last_sequence, 9);
}

#[test]
fn test_restart_after_torn_write_keeps_log_replayable() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\ta\t1\n2\t2\tb\t2");

    {
        let logger = open(&path);
        let store = KvStore::new();
        let result = Recovery::replay(&logger, &store).unwrap();
        assert_eq!(result.events_replayed, 1);

        logger.run().unwrap();
        logger.write_put("c", "3").unwrap();
        logger.close().unwrap();
    }

    let store = KvStore::new();
    let result = Recovery::replay(&open(&path), &store).unwrap();

    assert_eq!(result.events_replayed, 2);
    assert_eq!(result.last_sequence, 2);
    assert_eq!(store.get("a").unwrap(), "1");
    assert_eq!(store.get("c").unwrap(), "3");
    assert!(!store.contains_key("b"));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_duplicate_sequence_stops_scan() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\ta\tx\n2\t2\tb\ty\n2\t2\tc\tz\n");
    let logger = open(&path);

    let (events, errors) = logger.read_events();
    let emitted: Vec<Event> = events.iter().collect();
    let error = errors.recv_timeout(Duration::from_secs(5)).unwrap();

    assert_eq!(emitted.len(), 2);
    assert!(emitted.iter().all(|e| e.key != "c"));
    assert!(matches!(
        error,
        TxkvError::OutOfSequence {
            previous: 2,
            found: 2
        }
    ));
}

#[test]
fn test_decreasing_sequence_aborts_replay() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\ta\tx\n3\t2\tb\ty\n2\t2\tc\tz\n");

    let store = KvStore::new();
    let result = Recovery::replay(&open(&path), &store);

    assert!(matches!(
        result,
        Err(TxkvError::OutOfSequence {
            previous: 3,
            found: 2
        })
    ));
}

#[test]
fn test_bad_value_encoding_aborts_replay() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\ta\tok\n2\t2\tb\tbroken%zz\n");

    let result = Recovery::replay(&open(&path), &KvStore::new());

    assert!(matches!(result, Err(TxkvError::ValueDecode(_))));
}

#[test]
fn test_malformed_line_aborts_replay() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t2\ta\tok\n2\t2\tmissing-value\n");

    let result = Recovery::verify(&open(&path));

    assert!(matches!(
        result,
        Err(TxkvError::MalformedRecord { position: 2, .. })
    ));
}

#[test]
fn test_non_numeric_sequence_aborts_replay() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "one\t2\ta\tok\n");

    let result = Recovery::verify(&open(&path));

    assert!(matches!(
        result,
        Err(TxkvError::MalformedRecord { position: 1, .. })
    ));
}

#[test]
fn test_unknown_event_type_aborts_replay() {
    let temp = TempDir::new().unwrap();
    let path = write_log(&temp, "1\t0\ta\tok\n");

    let result = Recovery::verify(&open(&path));

    assert!(matches!(result, Err(TxkvError::UnknownEventType(0))));
}

// =============================================================================
// Drain Tests
// =============================================================================

#[test]
fn test_drain_returns_first_error() {
    let (event_tx, event_rx) = bounded(4);
    let (error_tx, error_rx) = bounded(1);

    event_tx
        .send(Event {
            sequence: 1,
            event_type: EventType::Put,
            key: "k".to_string(),
            value: "v".to_string(),
        })
        .unwrap();
    error_tx.send(TxkvError::LoggerClosed).unwrap();
    drop(event_tx);
    drop(error_tx);

    let result = Recovery::drain(&event_rx, &error_rx, |_| Ok(()));

    assert!(matches!(result, Err(TxkvError::LoggerClosed)));
}

#[test]
fn test_drain_stops_on_apply_error() {
    let (event_tx, event_rx) = bounded(4);
    let (error_tx, error_rx) = bounded::<TxkvError>(1);

    for sequence in 1..=3 {
        event_tx
            .send(Event {
                sequence,
                event_type: EventType::Delete,
                key: format!("k{sequence}"),
                value: String::new(),
            })
            .unwrap();
    }
    drop(event_tx);
    drop(error_tx);

    let mut seen = 0;
    let result = Recovery::drain(&event_rx, &error_rx, |event| {
        seen += 1;
        if event.sequence == 2 {
            return Err(TxkvError::InvalidKey("rejected".to_string()));
        }
        Ok(())
    });

    assert!(matches!(result, Err(TxkvError::InvalidKey(_))));
    assert_eq!(seen, 2);
}
