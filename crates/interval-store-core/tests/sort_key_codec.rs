// crates/interval-store-core/tests/sort_key_codec.rs
// ============================================================================
// Module: Sort Key Codec Tests
// Description: Encoding, decoding, and upper-bound behavior of the codec.
// Purpose: Pin the fixed-width key layouts and their failure modes.
// Dependencies: interval-store-core, time
// ============================================================================

//! ## Overview
//! Exercises both resolutions, civil offsets, tag handling, and the error
//! variants returned for malformed keys and unencodable instants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use interval_store_core::CodecError;
use interval_store_core::IntervalTag;
use interval_store_core::SortKey;
use interval_store_core::SortKeyCodec;
use interval_store_core::TimeResolution;
use time::Date;
use time::Month;
use time::macros::date;
use time::macros::datetime;
use time::macros::offset;

fn tag(value: &str) -> IntervalTag {
    IntervalTag::new(value).expect("valid tag")
}

#[test]
fn day_encoding_appends_tag_after_separator() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    let key = codec
        .encode(datetime!(2024-08-20 15:30 UTC), Some(&tag("bills#groupid1")))
        .expect("encode");
    assert_eq!(key.as_str(), "20240820#bills#groupid1");
}

#[test]
fn second_encoding_is_fourteen_digits() {
    let codec = SortKeyCodec::utc(TimeResolution::Second);
    let key = codec.encode(datetime!(2024-08-20 15:30:05.250 UTC), None).expect("encode");
    assert_eq!(key.as_str(), "20240820153005");
}

#[test]
fn encoding_renders_in_configured_offset() {
    let codec = SortKeyCodec::new(TimeResolution::Day, offset!(-3), '#').expect("codec");
    let key = codec.encode(datetime!(2024-08-21 01:00 UTC), None).expect("encode");
    assert_eq!(key.as_str(), "20240820");
}

#[test]
fn decode_splits_tag_at_first_separator() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    let decoded = codec.decode(&SortKey::new("20240820#bills#groupid1")).expect("decode");
    assert_eq!(decoded.start, datetime!(2024-08-20 00:00 UTC));
    assert_eq!(decoded.tag, Some(tag("bills#groupid1")));
}

#[test]
fn decode_without_tag_returns_none() {
    let codec = SortKeyCodec::utc(TimeResolution::Second);
    let decoded = codec.decode(&SortKey::new("20240820153005")).expect("decode");
    assert_eq!(decoded.start, datetime!(2024-08-20 15:30:05 UTC));
    assert!(decoded.tag.is_none());
}

#[test]
fn decode_in_offset_returns_local_midnight() {
    let codec = SortKeyCodec::new(TimeResolution::Day, offset!(-3), '#').expect("codec");
    let decoded = codec.decode(&SortKey::new("20240820")).expect("decode");
    assert_eq!(decoded.start, datetime!(2024-08-20 03:00 UTC));
}

#[test]
fn decode_rejects_resolution_mismatch() {
    let day = SortKeyCodec::utc(TimeResolution::Day);
    let err = day.decode(&SortKey::new("20240820153005")).unwrap_err();
    assert!(matches!(err, CodecError::Format { .. }));

    let second = SortKeyCodec::utc(TimeResolution::Second);
    let err = second.decode(&SortKey::new("20240820#bills")).unwrap_err();
    assert!(matches!(err, CodecError::Format { .. }));
}

#[test]
fn decode_rejects_invalid_calendar_values() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    for raw in ["20241340", "2024082", "abcdefgh", "20240820#"] {
        let err = codec.decode(&SortKey::new(raw)).unwrap_err();
        assert!(matches!(err, CodecError::Format { .. }), "{raw} should not decode");
    }
}

#[test]
fn upper_bound_inclusive_encodes_next_unit() {
    let day = SortKeyCodec::utc(TimeResolution::Day);
    let at = datetime!(2024-08-27 13:00 UTC);
    assert_eq!(day.upper_bound(at, true).expect("bound").as_str(), "20240828");
    assert_eq!(day.upper_bound(at, false).expect("bound").as_str(), "20240827");

    let second = SortKeyCodec::utc(TimeResolution::Second);
    let bound = second.upper_bound(datetime!(2024-08-27 23:59:59 UTC), true).expect("bound");
    assert_eq!(bound.as_str(), "20240828000000");
}

#[test]
fn inclusive_bound_covers_tagged_keys_of_the_same_day() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    let at = datetime!(2024-08-27 00:00 UTC);
    let bound = codec.upper_bound(at, true).expect("bound");
    let tagged = codec.encode(at, Some(&tag("zzzz"))).expect("encode");
    let next_day = codec.encode(datetime!(2024-08-28 00:00 UTC), None).expect("encode");
    assert!(tagged < bound);
    assert!(next_day >= bound);
}

#[test]
fn separator_must_sort_below_digits() {
    for separator in ['a', '0', '9', ' ', '\u{e9}'] {
        let err = SortKeyCodec::new(TimeResolution::Day, offset!(UTC), separator).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSeparator(_)));
    }
    for separator in ['#', '!', '/', '-', '.'] {
        assert!(SortKeyCodec::new(TimeResolution::Day, offset!(UTC), separator).is_ok());
    }
}

#[test]
fn negative_years_are_out_of_range() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    let instant = Date::from_calendar_date(-1, Month::June, 1).unwrap().midnight().assume_utc();
    let err = codec.encode(instant, None).unwrap_err();
    assert!(matches!(err, CodecError::OutOfRange(_)));
}

#[test]
fn upper_bound_past_last_day_is_out_of_range() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    let err = codec.upper_bound(datetime!(9999-12-31 12:00 UTC), true).unwrap_err();
    assert!(matches!(err, CodecError::OutOfRange(_)));
}

#[test]
fn oversized_tag_is_rejected_as_invalid_key() {
    let codec = SortKeyCodec::utc(TimeResolution::Day);
    let long = tag(&"x".repeat(1100));
    let err = codec.encode(datetime!(2024-08-20 00:00 UTC), Some(&long)).unwrap_err();
    assert!(matches!(err, CodecError::InvalidKey(_)));
}

#[test]
fn tags_reject_empty_and_control_characters() {
    assert!(matches!(IntervalTag::new(""), Err(CodecError::InvalidTag(_))));
    assert!(matches!(IntervalTag::new("bills\ngroup"), Err(CodecError::InvalidTag(_))));
}

#[test]
fn end_of_day_is_next_local_midnight() {
    let codec = SortKeyCodec::new(TimeResolution::Day, offset!(-3), '#').expect("codec");
    let end = codec.end_of_day(date!(2024-08-20)).expect("end of day");
    assert_eq!(end, datetime!(2024-08-21 03:00 UTC));
    assert!(codec.end_of_day(date!(9999-12-31)).is_err());
}
