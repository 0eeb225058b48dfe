//! Tests for Event definitions and value encoding
//!
//! These tests verify:
//! - Stable numeric event type codes
//! - Percent-encoding round trips for awkward values
//! - Rejection of malformed encodings
//! - Key validation

use txkv::storage::RawRecord;
use txkv::txlog::{decode_value, encode_value, validate_key, Event, EventType, Operation};
use txkv::TxkvError;

// =============================================================================
// Event Type Tests
// =============================================================================

#[test]
fn test_event_type_codes_are_stable() {
    assert_eq!(EventType::Delete.code(), 1);
    assert_eq!(EventType::Put.code(), 2);
}

#[test]
fn test_event_type_from_code() {
    assert_eq!(EventType::try_from(1).unwrap(), EventType::Delete);
    assert_eq!(EventType::try_from(2).unwrap(), EventType::Put);
}

#[test]
fn test_event_type_zero_is_reserved() {
    assert!(matches!(
        EventType::try_from(0),
        Err(TxkvError::UnknownEventType(0))
    ));
    assert!(matches!(
        EventType::try_from(7),
        Err(TxkvError::UnknownEventType(7))
    ));
}

#[test]
fn test_operation_accessors() {
    let put = Operation::Put {
        key: "k".to_string(),
        value: "a b".to_string(),
    };
    let delete = Operation::Delete {
        key: "k".to_string(),
    };

    assert_eq!(put.event_type(), EventType::Put);
    assert_eq!(put.key(), "k");
    assert_eq!(put.encoded_value(), "a%20b");
    assert_eq!(delete.event_type(), EventType::Delete);
    assert_eq!(delete.encoded_value(), "");
}

// =============================================================================
// Value Encoding Tests
// =============================================================================

#[test]
fn test_encode_escapes_delimiters() {
    let encoded = encode_value("tab\there\nnewline\r");

    assert!(!encoded.contains('\t'));
    assert!(!encoded.contains('\n'));
    assert!(!encoded.contains('\r'));
    assert_eq!(encoded, "tab%09here%0Anewline%0D");
}

#[test]
fn test_round_trip_awkward_values() {
    let values = [
        "",
        "plain",
        "with space",
        "tab\tand\nnewline",
        "plus+sign and %percent",
        "ünïcödé ✓ 日本語",
        "a=b&c=d?e#f",
    ];

    for value in values {
        let encoded = encode_value(value);
        assert_eq!(decode_value(&encoded).unwrap(), value, "value {value:?}");
    }
}

#[test]
fn test_decode_plus_as_space() {
    // Query escaping writes spaces as '+'
    assert_eq!(decode_value("hello+world%21").unwrap(), "hello world!");
}

#[test]
fn test_decode_rejects_bad_escapes() {
    for bad in ["%zz", "abc%", "%4", "ok%G1"] {
        assert!(
            matches!(decode_value(bad), Err(TxkvError::ValueDecode(_))),
            "{bad:?} should not decode"
        );
    }
}

#[test]
fn test_decode_rejects_invalid_utf8() {
    assert!(matches!(
        decode_value("%FF%FE"),
        Err(TxkvError::ValueDecode(_))
    ));
}

// =============================================================================
// Key Validation Tests
// =============================================================================

#[test]
fn test_validate_key() {
    assert!(validate_key("user:42").is_ok());
    assert!(validate_key("ключ").is_ok());

    assert!(matches!(validate_key(""), Err(TxkvError::InvalidKey(_))));
    assert!(matches!(validate_key("a\tb"), Err(TxkvError::InvalidKey(_))));
    assert!(matches!(validate_key("a\nb"), Err(TxkvError::InvalidKey(_))));
    assert!(matches!(validate_key("a\rb"), Err(TxkvError::InvalidKey(_))));
}

// =============================================================================
// Raw Record Conversion Tests
// =============================================================================

#[test]
fn test_event_from_raw_decodes_value() {
    let event = Event::from_raw(RawRecord {
        sequence: 9,
        event_type: 2,
        key: "k".to_string(),
        value: "x%09y".to_string(),
    })
    .unwrap();

    assert_eq!(
        event,
        Event {
            sequence: 9,
            event_type: EventType::Put,
            key: "k".to_string(),
            value: "x\ty".to_string(),
        }
    );
}

#[test]
fn test_event_from_raw_unknown_type() {
    let result = Event::from_raw(RawRecord {
        sequence: 1,
        event_type: 0,
        key: "k".to_string(),
        value: String::new(),
    });

    assert!(matches!(result, Err(TxkvError::UnknownEventType(0))));
}
