// crates/interval-store-cli/src/tests/input.rs
// ============================================================================
// Module: CLI Input Tests
// Description: Instant parsing, record building, and bulk input decoding.
// Purpose: Ensure untrusted input is validated before any store call.
// Dependencies: interval-store-core, tempfile, time
// ============================================================================

use std::fs;

use interval_store_core::Payload;
use interval_store_core::SortKeyCodec;
use interval_store_core::TimeResolution;
use time::Date;
use time::Month;
use time::UtcOffset;
use time::macros::datetime;

use crate::input::InputError;
use crate::input::InstantArg;
use crate::input::build_record;
use crate::input::parse_keys;
use crate::input::parse_records;
use crate::input::read_bytes_with_limit;

fn codec() -> SortKeyCodec {
    SortKeyCodec::utc(TimeResolution::Day)
}

// ============================================================================
// SECTION: Instants
// ============================================================================

#[test]
fn bare_dates_and_rfc3339_instants_parse() {
    let date = Date::from_calendar_date(2024, Month::August, 27).unwrap();
    assert_eq!(InstantArg::parse("2024-08-27").unwrap(), InstantArg::Date(date));
    assert_eq!(
        InstantArg::parse("2024-08-27T10:30:00-03:00").unwrap(),
        InstantArg::Instant(datetime!(2024-08-27 10:30:00 -3))
    );
}

#[test]
fn malformed_instants_are_rejected() {
    for value in ["20240827", "2024-13-01", "yesterday", ""] {
        let err = InstantArg::parse(value).unwrap_err();
        assert!(matches!(err, InputError::Instant { .. }), "{value} should be rejected");
    }
}

#[test]
fn bare_dates_cover_whole_days_in_the_codec_offset() {
    let offset = UtcOffset::from_hms(-3, 0, 0).unwrap();
    let codec = SortKeyCodec::new(TimeResolution::Day, offset, '#').unwrap();
    let arg = InstantArg::parse("2024-08-27").unwrap();
    assert_eq!(arg.as_start(&codec), datetime!(2024-08-27 00:00:00 -3));
    assert_eq!(arg.as_end(&codec).unwrap(), datetime!(2024-08-28 00:00:00 -3));
}

// ============================================================================
// SECTION: Records
// ============================================================================

#[test]
fn build_record_encodes_the_start_day_and_tag() {
    let record = build_record(
        "123",
        "2024-08-20",
        "2024-08-25",
        Some("bills#groupid1"),
        Payload::Text("XYZ".to_string()),
        &codec(),
    )
    .unwrap();
    assert_eq!(record.sort_key.as_str(), "20240820#bills#groupid1");
    assert_eq!(record.end_unix, 1_724_630_400);
}

#[test]
fn build_record_rejects_reversed_intervals_and_empty_owners() {
    let reversed = build_record(
        "123",
        "2024-08-25",
        "2024-08-20T00:00:00Z",
        None,
        Payload::Text(String::new()),
        &codec(),
    )
    .unwrap_err();
    assert!(reversed.to_string().contains("starts after it ends"), "{reversed}");

    let empty = build_record(
        "",
        "2024-08-20",
        "2024-08-25",
        None,
        Payload::Text(String::new()),
        &codec(),
    )
    .unwrap_err();
    assert!(matches!(empty, InputError::Entry { index: 0, .. }));
}

#[test]
fn parse_records_accepts_text_and_tagged_payloads() {
    let input = br#"[
        {"owner": "125", "start": "2024-08-20", "end": "2024-08-25", "tag": "bills", "payload": "XYZ"},
        {"owner": "126", "start": "2024-08-22T00:00:00Z", "end": "2024-08-27",
         "payload": {"kind": "binary", "value": [0, 255]}}
    ]"#;
    let records = parse_records(input, &codec()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].payload, Payload::Text("XYZ".to_string()));
    assert_eq!(records[1].sort_key.as_str(), "20240822");
    assert_eq!(records[1].payload, Payload::Binary(vec![0, 255]));
}

#[test]
fn parse_records_names_the_failing_entry() {
    let input = br#"[
        {"owner": "125", "start": "2024-08-20", "end": "2024-08-25", "payload": "XYZ"},
        {"owner": "125", "start": "2024-08-20", "end": "not a date", "payload": "XYZ"}
    ]"#;
    let err = parse_records(input, &codec()).unwrap_err();
    assert!(matches!(err, InputError::Entry { index: 1, .. }), "{err}");
}

#[test]
fn parse_records_rejects_unknown_fields() {
    let input = br#"[{"owner": "1", "start": "2024-08-20", "end": "2024-08-21",
                      "payload": "x", "ttl": 5}]"#;
    assert!(matches!(parse_records(input, &codec()), Err(InputError::Json(_))));
}

#[test]
fn parse_keys_validates_each_key() {
    let keys = parse_keys(br#"[{"owner": "124", "sort_key": "20240827#bills#groupid2"}]"#)
        .unwrap();
    assert_eq!(keys[0].owner.as_str(), "124");

    let err = parse_keys(br#"[{"owner": "124", "sort_key": "a"}, {"owner": "", "sort_key": "b"}]"#)
        .unwrap_err();
    assert!(matches!(err, InputError::Entry { index: 1, .. }), "{err}");
}

// ============================================================================
// SECTION: Files
// ============================================================================

#[test]
fn read_bytes_with_limit_enforces_the_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.json");
    fs::write(&path, b"[]").unwrap();
    assert_eq!(read_bytes_with_limit(&path, 2).unwrap(), b"[]");

    let err = read_bytes_with_limit(&path, 1).unwrap_err();
    assert!(matches!(err, InputError::TooLarge { size: 2, limit: 1, .. }));

    let missing = read_bytes_with_limit(&dir.path().join("absent.json"), 10).unwrap_err();
    assert!(matches!(missing, InputError::Read { .. }));
}
