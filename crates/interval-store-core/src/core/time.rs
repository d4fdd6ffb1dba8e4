// crates/interval-store-core/src/core/time.rs
// ============================================================================
// Module: Interval Store Time Model
// Description: Time resolution and boundary semantics for interval queries.
// Purpose: Make instant granularity and inclusive/exclusive edges explicit values.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Interval records are keyed by a fixed-width rendering of their start instant.
//! The rendering granularity is a [`TimeResolution`], and the treatment of an
//! instant that lands exactly on an interval edge is a [`ContainmentPolicy`].
//! Neither is ambient state: callers thread both through the codec and the
//! store explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::Duration;

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Granularity of the chronological sort-key prefix.
///
/// # Invariants
/// - All records sharing an owner must use the same resolution; mixed
///   resolutions misorder range scans and fail decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeResolution {
    /// `YYYYMMDD` prefix.
    #[default]
    Day,
    /// `YYYYMMDDHHMMSS` prefix.
    Second,
}

impl TimeResolution {
    /// Returns the width of the encoded prefix in bytes.
    #[must_use]
    pub const fn prefix_len(self) -> usize {
        match self {
            Self::Day => 8,
            Self::Second => 14,
        }
    }

    /// Returns one unit of this resolution.
    #[must_use]
    pub const fn unit(self) -> Duration {
        match self {
            Self::Day => Duration::DAY,
            Self::Second => Duration::SECOND,
        }
    }

    /// Returns a stable label for the resolution.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Second => "second",
        }
    }
}

// ============================================================================
// SECTION: Boundaries
// ============================================================================

/// Treatment of an instant equal to an interval edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// The edge itself is contained.
    #[default]
    Inclusive,
    /// The edge itself is not contained.
    Exclusive,
}

impl Boundary {
    /// Returns true for [`Boundary::Inclusive`].
    #[must_use]
    pub const fn is_inclusive(self) -> bool {
        matches!(self, Self::Inclusive)
    }
}

/// Edge semantics for "interval contains instant" queries.
///
/// # Invariants
/// - `start` is compared at codec resolution: with day resolution an
///   exclusive start drops every interval starting on the query day.
/// - `end` is compared in whole seconds against the stored end instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContainmentPolicy {
    /// Start-edge semantics.
    #[serde(default)]
    pub start: Boundary,
    /// End-edge semantics.
    #[serde(default)]
    pub end: Boundary,
}

impl ContainmentPolicy {
    /// Both edges inclusive: `start <= t <= end`.
    pub const CLOSED: Self = Self {
        start: Boundary::Inclusive,
        end: Boundary::Inclusive,
    };

    /// Inclusive start, exclusive end: `start <= t < end`.
    pub const HALF_OPEN: Self = Self {
        start: Boundary::Inclusive,
        end: Boundary::Exclusive,
    };

    /// Returns whether a stored end instant admits the query instant.
    #[must_use]
    pub const fn admits_end(self, end_unix: i64, at_unix: i64) -> bool {
        match self.end {
            Boundary::Inclusive => end_unix >= at_unix,
            Boundary::Exclusive => end_unix > at_unix,
        }
    }
}
