// crates/interval-store-core/src/core/sort_key.rs
// ============================================================================
// Module: Sort Key Codec
// Description: Chronological sort-key encoding for interval records.
// Purpose: Map instants (plus optional tags) to keys whose byte order is time order.
// Dependencies: thiserror, time
// ============================================================================

//! ## Overview
//! A sort key is a fixed-width, zero-padded calendar rendering of the start
//! instant in a configured civil offset, optionally followed by a separator
//! and a tag. The separator must sort below every ASCII digit so that two keys
//! sharing a start instant sort after the bare prefix and before any later
//! instant.
//!
//! Range scans only offer strict and non-strict "less than" on the key, so the
//! codec also produces upper bounds: the inclusive form encodes the next
//! resolution unit and is used with `<`, which covers every tagged key for the
//! bound instant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::Date;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::Time;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::core::identifiers::IntervalTag;
use crate::core::identifiers::SortKey;
use crate::core::time::TimeResolution;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default separator between the chronological prefix and the tag.
pub const DEFAULT_SEPARATOR: char = '#';
/// Largest year that renders in four digits.
const MAX_ENCODABLE_YEAR: i32 = 9999;
/// Day-resolution layout.
const DAY_LAYOUT: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day]");
/// Second-resolution layout.
const SECOND_LAYOUT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Sort-key and identifier codec errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Owner or sort key violates size rules.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// Tag violates content rules.
    #[error("invalid tag: {0}")]
    InvalidTag(String),
    /// Separator cannot preserve chronological ordering.
    #[error("invalid separator: {0}")]
    InvalidSeparator(String),
    /// Instant cannot be rendered in the fixed-width layout.
    #[error("instant out of encodable range: {0}")]
    OutOfRange(String),
    /// Sort key does not parse under the configured layout.
    #[error("sort key {key} does not parse: {reason}")]
    Format {
        /// Offending sort key.
        key: String,
        /// Parse failure reason.
        reason: String,
    },
}

// ============================================================================
// SECTION: Decoded Keys
// ============================================================================

/// A sort key split into its start instant and optional tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSortKey {
    /// Start instant in the codec's configured offset.
    pub start: OffsetDateTime,
    /// Tag suffix when present.
    pub tag: Option<IntervalTag>,
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Bijective mapping between instants and chronological sort keys.
///
/// # Invariants
/// - `encode(t1) < encode(t2)` whenever `t1 < t2` at the configured resolution.
/// - Instants are rendered in `offset`; the codec never reads process time zone state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKeyCodec {
    /// Prefix granularity.
    resolution: TimeResolution,
    /// Civil offset used for calendar rendering.
    offset: UtcOffset,
    /// Prefix/tag separator.
    separator: char,
}

impl Default for SortKeyCodec {
    fn default() -> Self {
        Self {
            resolution: TimeResolution::Day,
            offset: UtcOffset::UTC,
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl SortKeyCodec {
    /// Creates a codec.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidSeparator`] when the separator is not a
    /// printable ASCII character sorting below `'0'`.
    pub fn new(
        resolution: TimeResolution,
        offset: UtcOffset,
        separator: char,
    ) -> Result<Self, CodecError> {
        if !separator.is_ascii_graphic() || separator >= '0' {
            return Err(CodecError::InvalidSeparator(format!(
                "separator '{separator}' must be printable ascii below '0'"
            )));
        }
        Ok(Self {
            resolution,
            offset,
            separator,
        })
    }

    /// Creates a UTC codec with the default separator.
    #[must_use]
    pub const fn utc(resolution: TimeResolution) -> Self {
        Self {
            resolution,
            offset: UtcOffset::UTC,
            separator: DEFAULT_SEPARATOR,
        }
    }

    /// Returns the configured resolution.
    #[must_use]
    pub const fn resolution(&self) -> TimeResolution {
        self.resolution
    }

    /// Returns the configured civil offset.
    #[must_use]
    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Returns the configured separator.
    #[must_use]
    pub const fn separator(&self) -> char {
        self.separator
    }

    /// Encodes an instant and optional tag into a sort key.
    ///
    /// Sub-resolution components of `instant` are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the instant is outside years `0000..=9999`
    /// in the configured offset or the resulting key exceeds size limits.
    pub fn encode(
        &self,
        instant: OffsetDateTime,
        tag: Option<&IntervalTag>,
    ) -> Result<SortKey, CodecError> {
        let local = self.localize(instant)?;
        let layout = match self.resolution {
            TimeResolution::Day => DAY_LAYOUT,
            TimeResolution::Second => SECOND_LAYOUT,
        };
        let mut key =
            local.format(layout).map_err(|err| CodecError::OutOfRange(err.to_string()))?;
        if let Some(tag) = tag {
            key.push(self.separator);
            key.push_str(tag.as_str());
        }
        let key = SortKey::new(key);
        key.validate()?;
        Ok(key)
    }

    /// Decodes a sort key into its start instant and tag.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Format`] when the prefix is not a valid calendar
    /// value at the configured resolution, or when the character following the
    /// prefix is not the separator (typically a resolution mismatch).
    pub fn decode(&self, key: &SortKey) -> Result<DecodedSortKey, CodecError> {
        let raw = key.as_str();
        let width = self.resolution.prefix_len();
        let format_error = |reason: &str| CodecError::Format {
            key: raw.to_string(),
            reason: reason.to_string(),
        };
        let prefix = raw.get(.. width).ok_or_else(|| format_error("key shorter than prefix"))?;
        if !prefix.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(format_error("prefix is not numeric"));
        }
        let rest = &raw[width ..];
        let tag = if rest.is_empty() {
            None
        } else {
            let suffix = rest
                .strip_prefix(self.separator)
                .ok_or_else(|| format_error("prefix is not followed by the separator"))?;
            Some(IntervalTag::new(suffix).map_err(|err| format_error(&err.to_string()))?)
        };
        let local = match self.resolution {
            TimeResolution::Day => Date::parse(prefix, DAY_LAYOUT)
                .map(Date::midnight)
                .map_err(|err| format_error(&err.to_string()))?,
            TimeResolution::Second => PrimitiveDateTime::parse(prefix, SECOND_LAYOUT)
                .map_err(|err| format_error(&err.to_string()))?,
        };
        Ok(DecodedSortKey {
            start: local.assume_offset(self.offset),
            tag,
        })
    }

    /// Returns a strict upper bound for keys at or before `instant`.
    ///
    /// With `inclusive = true` the bound is the encoding of the next
    /// resolution unit, so `key < bound` admits every key (tagged or not)
    /// whose start falls in `instant`'s unit. With `inclusive = false` the
    /// bound is the encoding of `instant` itself, so `key < bound` admits only
    /// keys from earlier units.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when the bound is not encodable.
    pub fn upper_bound(
        &self,
        instant: OffsetDateTime,
        inclusive: bool,
    ) -> Result<SortKey, CodecError> {
        let truncated = self.truncate(instant)?;
        let bound = if inclusive {
            truncated.checked_add(self.resolution.unit()).ok_or_else(|| {
                CodecError::OutOfRange("upper bound overflows the calendar".to_string())
            })?
        } else {
            truncated
        };
        self.encode(bound, None)
    }

    /// Truncates an instant to the configured resolution in the configured offset.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when the instant is not encodable.
    pub fn truncate(&self, instant: OffsetDateTime) -> Result<OffsetDateTime, CodecError> {
        let local = self.localize(instant)?;
        match self.resolution {
            TimeResolution::Day => Ok(local.replace_time(Time::MIDNIGHT)),
            TimeResolution::Second => local
                .replace_nanosecond(0)
                .map_err(|err| CodecError::OutOfRange(err.to_string())),
        }
    }

    /// Returns the first instant of `date` in the configured offset.
    #[must_use]
    pub fn day_start(&self, date: Date) -> OffsetDateTime {
        date.midnight().assume_offset(self.offset)
    }

    /// Returns the first instant of the day after `date` in the configured offset.
    ///
    /// This is the exclusive end of an interval covering `date` entirely.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::OutOfRange`] when `date` is the last representable day.
    pub fn end_of_day(&self, date: Date) -> Result<OffsetDateTime, CodecError> {
        let next = date
            .next_day()
            .filter(|next| next.year() <= MAX_ENCODABLE_YEAR)
            .ok_or_else(|| CodecError::OutOfRange(format!("no encodable day follows {date}")))?;
        Ok(self.day_start(next))
    }

    /// Converts an instant into the configured offset, enforcing the year range.
    fn localize(&self, instant: OffsetDateTime) -> Result<OffsetDateTime, CodecError> {
        let local = instant.checked_to_offset(self.offset).ok_or_else(|| {
            CodecError::OutOfRange("instant overflows the configured offset".to_string())
        })?;
        if !(0 ..= MAX_ENCODABLE_YEAR).contains(&local.year()) {
            return Err(CodecError::OutOfRange(format!(
                "year {} is outside 0000..={MAX_ENCODABLE_YEAR}",
                local.year()
            )));
        }
        Ok(local)
    }
}
