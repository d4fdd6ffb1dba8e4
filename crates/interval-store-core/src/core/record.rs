// crates/interval-store-core/src/core/record.rs
// ============================================================================
// Module: Interval Records
// Description: Interval record model and write-time validation.
// Purpose: Keep the start <= end invariant at the caller boundary.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! An [`IntervalRecord`] is immutable once written: updates are full rewrites
//! under the same `(owner, sort_key)`. The store does not check that the start
//! instant precedes the end instant, so records are validated here before
//! they reach a backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::identifiers::IntervalTag;
use crate::core::identifiers::OwnerId;
use crate::core::identifiers::SortKey;
use crate::core::sort_key::CodecError;
use crate::core::sort_key::DecodedSortKey;
use crate::core::sort_key::SortKeyCodec;
use crate::core::time::Boundary;
use crate::core::time::ContainmentPolicy;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Record validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Key or tag failed codec rules.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Interval starts after it ends.
    #[error("interval starts after it ends: start {start_unix} > end {end_unix}")]
    StartAfterEnd {
        /// Start instant in unix seconds.
        start_unix: i64,
        /// End instant in unix seconds.
        end_unix: i64,
    },
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Opaque record payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the payload size in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns true when the payload is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Primary key of an interval record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Partition key.
    pub owner: OwnerId,
    /// Sort key.
    pub sort_key: SortKey,
}

impl RecordKey {
    /// Creates a record key.
    #[must_use]
    pub const fn new(owner: OwnerId, sort_key: SortKey) -> Self {
        Self {
            owner,
            sort_key,
        }
    }

    /// Validates key size limits.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] when either key component is invalid.
    pub fn validate(&self) -> Result<(), CodecError> {
        self.owner.validate()?;
        self.sort_key.validate()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.sort_key)
    }
}

/// A time interval owned by a subject.
///
/// # Invariants
/// - `start(sort_key) <= end_unix` for records built via [`IntervalRecord::new`].
/// - `end_unix` doubles as the store's time-to-live attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    /// Partition key.
    pub owner: OwnerId,
    /// Chronological sort key.
    pub sort_key: SortKey,
    /// End instant in unix seconds.
    pub end_unix: i64,
    /// Opaque payload.
    pub payload: Payload,
}

impl IntervalRecord {
    /// Builds a validated record from its start/end instants.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the key cannot be encoded or the interval
    /// starts after it ends.
    pub fn new(
        owner: OwnerId,
        start: OffsetDateTime,
        tag: Option<&IntervalTag>,
        end: OffsetDateTime,
        payload: Payload,
        codec: &SortKeyCodec,
    ) -> Result<Self, RecordError> {
        let record = Self {
            owner,
            sort_key: codec.encode(start, tag)?,
            end_unix: end.unix_timestamp(),
            payload,
        };
        record.validate(codec)?;
        Ok(record)
    }

    /// Validates key limits and the start/end ordering.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a key is invalid, the sort key does not
    /// decode, or the interval starts after it ends.
    pub fn validate(&self, codec: &SortKeyCodec) -> Result<DecodedSortKey, RecordError> {
        self.owner.validate()?;
        self.sort_key.validate()?;
        let decoded = codec.decode(&self.sort_key)?;
        let start_unix = decoded.start.unix_timestamp();
        if start_unix > self.end_unix {
            return Err(RecordError::StartAfterEnd {
                start_unix,
                end_unix: self.end_unix,
            });
        }
        Ok(decoded)
    }

    /// Returns the record's primary key.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.owner.clone(), self.sort_key.clone())
    }

    /// Evaluates containment of `at` without touching a store.
    ///
    /// The start edge is compared at codec resolution, mirroring the
    /// key-condition bound a store query uses.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the sort key does not decode or `at` is not encodable.
    pub fn contains(
        &self,
        codec: &SortKeyCodec,
        at: OffsetDateTime,
        policy: ContainmentPolicy,
    ) -> Result<bool, CodecError> {
        let start = codec.decode(&self.sort_key)?.start;
        let at_unit = codec.truncate(at)?;
        let started = match policy.start {
            Boundary::Inclusive => start <= at_unit,
            Boundary::Exclusive => start < at_unit,
        };
        Ok(started && policy.admits_end(self.end_unix, at.unix_timestamp()))
    }
}
