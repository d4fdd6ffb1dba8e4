// crates/interval-store-cli/src/input.rs
// ============================================================================
// Module: CLI Input Parsing
// Description: Instant arguments and bulk JSON input decoding.
// Purpose: Turn untrusted command-line text into validated records and keys.
// Dependencies: interval-store-core, serde, serde_json, time
// ============================================================================

//! ## Overview
//! Instants are accepted as `YYYY-MM-DD` or RFC 3339. A bare date means the
//! start of that day in the codec's offset when used as a start or query
//! instant, and the start of the following day when used as an interval end,
//! so `--start 2024-08-20 --end 2024-08-25` covers both days in full.
//!
//! Bulk input files are bounded in size and decoded strictly; every entry is
//! validated before any store call is made.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use interval_store_core::CodecError;
use interval_store_core::IntervalRecord;
use interval_store_core::IntervalTag;
use interval_store_core::OwnerId;
use interval_store_core::Payload;
use interval_store_core::RecordKey;
use interval_store_core::SortKey;
use interval_store_core::SortKeyCodec;
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a bulk input file.
pub const MAX_INPUT_BYTES: usize = 8 * 1024 * 1024;

/// Calendar date layout.
const DATE_LAYOUT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Input parsing errors.
#[derive(Debug, Error)]
pub enum InputError {
    /// Input file could not be read.
    #[error("failed to read {path}: {reason}")]
    Read {
        /// File path.
        path: String,
        /// Failure detail.
        reason: String,
    },
    /// Input file exceeds the size limit.
    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    TooLarge {
        /// File path.
        path: String,
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
    /// Input is not valid JSON of the expected shape.
    #[error("invalid input json: {0}")]
    Json(String),
    /// An instant argument is malformed.
    #[error("invalid instant '{value}': expected YYYY-MM-DD or RFC 3339")]
    Instant {
        /// Offending text.
        value: String,
    },
    /// An entry failed validation.
    #[error("entry {index}: {reason}")]
    Entry {
        /// Zero-based entry position.
        index: usize,
        /// Validation failure.
        reason: String,
    },
}

// ============================================================================
// SECTION: Instants
// ============================================================================

/// A parsed instant argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantArg {
    /// A calendar date in the codec's offset.
    Date(Date),
    /// An exact instant.
    Instant(OffsetDateTime),
}

impl InstantArg {
    /// Parses `YYYY-MM-DD` or RFC 3339 text.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Instant`] when neither layout matches.
    pub fn parse(value: &str) -> Result<Self, InputError> {
        let trimmed = value.trim();
        if let Ok(date) = Date::parse(trimmed, DATE_LAYOUT) {
            return Ok(Self::Date(date));
        }
        OffsetDateTime::parse(trimmed, &Rfc3339).map(Self::Instant).map_err(|_| {
            InputError::Instant {
                value: value.to_string(),
            }
        })
    }

    /// Resolves the argument as an interval start or query instant.
    #[must_use]
    pub fn as_start(self, codec: &SortKeyCodec) -> OffsetDateTime {
        match self {
            Self::Date(date) => codec.day_start(date),
            Self::Instant(instant) => instant,
        }
    }

    /// Resolves the argument as an interval end.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the following day is out of range.
    pub fn as_end(self, codec: &SortKeyCodec) -> Result<OffsetDateTime, CodecError> {
        match self {
            Self::Date(date) => codec.end_of_day(date),
            Self::Instant(instant) => Ok(instant),
        }
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// Payload as written in input files: plain text or a tagged payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PayloadInput {
    /// Plain text.
    Text(String),
    /// `{"kind": "text" | "binary", "value": ...}`.
    Tagged(Payload),
}

impl From<PayloadInput> for Payload {
    fn from(input: PayloadInput) -> Self {
        match input {
            PayloadInput::Text(text) => Self::Text(text),
            PayloadInput::Tagged(payload) => payload,
        }
    }
}

/// One record entry of a `bulk-put` input file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordInput {
    /// Owner id.
    owner: String,
    /// Interval start.
    start: String,
    /// Interval end.
    end: String,
    /// Optional tag.
    #[serde(default)]
    tag: Option<String>,
    /// Payload.
    payload: PayloadInput,
}

/// One key entry of a `bulk-delete` input file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyInput {
    /// Owner id.
    owner: String,
    /// Encoded sort key.
    sort_key: String,
}

/// Builds one validated record from arguments.
///
/// # Errors
///
/// Returns [`InputError`] when an instant, the owner, or the tag is invalid,
/// or the interval starts after it ends.
pub fn build_record(
    owner: &str,
    start: &str,
    end: &str,
    tag: Option<&str>,
    payload: Payload,
    codec: &SortKeyCodec,
) -> Result<IntervalRecord, InputError> {
    let entry = |reason: String| InputError::Entry {
        index: 0,
        reason,
    };
    let start = InstantArg::parse(start)?.as_start(codec);
    let end = InstantArg::parse(end)?.as_end(codec).map_err(|err| entry(err.to_string()))?;
    let owner = OwnerId::parse(owner).map_err(|err| entry(err.to_string()))?;
    let tag = tag.map(IntervalTag::new).transpose().map_err(|err| entry(err.to_string()))?;
    IntervalRecord::new(owner, start, tag.as_ref(), end, payload, codec)
        .map_err(|err| entry(err.to_string()))
}

/// Decodes a JSON array of records.
///
/// # Errors
///
/// Returns [`InputError::Json`] for malformed JSON and [`InputError::Entry`]
/// naming the first invalid entry.
pub fn parse_records(
    bytes: &[u8],
    codec: &SortKeyCodec,
) -> Result<Vec<IntervalRecord>, InputError> {
    let entries: Vec<RecordInput> =
        serde_json::from_slice(bytes).map_err(|err| InputError::Json(err.to_string()))?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            build_record(
                &entry.owner,
                &entry.start,
                &entry.end,
                entry.tag.as_deref(),
                entry.payload.into(),
                codec,
            )
            .map_err(|err| reindex(err, index))
        })
        .collect()
}

/// Decodes a JSON array of keys.
///
/// # Errors
///
/// Returns [`InputError::Json`] for malformed JSON and [`InputError::Entry`]
/// naming the first invalid key.
pub fn parse_keys(bytes: &[u8]) -> Result<Vec<RecordKey>, InputError> {
    let entries: Vec<KeyInput> =
        serde_json::from_slice(bytes).map_err(|err| InputError::Json(err.to_string()))?;
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let key = RecordKey::new(OwnerId::new(entry.owner), SortKey::new(entry.sort_key));
            key.validate().map_err(|err| InputError::Entry {
                index,
                reason: err.to_string(),
            })?;
            Ok(key)
        })
        .collect()
}

/// Moves an entry error to its position in the input array.
fn reindex(err: InputError, index: usize) -> InputError {
    match err {
        InputError::Entry {
            reason,
            ..
        } => InputError::Entry {
            index,
            reason,
        },
        other => InputError::Entry {
            index,
            reason: other.to_string(),
        },
    }
}

// ============================================================================
// SECTION: Files
// ============================================================================

/// Reads a file from disk while enforcing a hard size limit.
///
/// # Errors
///
/// Returns [`InputError::Read`] on I/O failure and [`InputError::TooLarge`]
/// when the file exceeds `max_bytes`.
pub fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, InputError> {
    let label = path.display().to_string();
    let io_error = |err: std::io::Error| InputError::Read {
        path: label.clone(),
        reason: err.to_string(),
    };
    let file = File::open(path).map_err(io_error)?;
    let size = file.metadata().map_err(io_error)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(InputError::TooLarge {
            path: label.clone(),
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(io_error)?;
    if bytes.len() > max_bytes {
        return Err(InputError::TooLarge {
            path: label,
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}
