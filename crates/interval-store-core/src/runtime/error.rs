// crates/interval-store-core/src/runtime/error.rs
// ============================================================================
// Module: Interval Store Errors
// Description: Error taxonomy surfaced by the interval store runtime.
// Purpose: Carry operation, key, and consumed capacity with every failure.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Errors are split by whether retrying can help. Validation, format, and
//! decode failures are caller or data bugs and are never retried. Store
//! unavailability is surfaced directly for single-item calls; bulk mutations
//! retry internally and report leftovers as [`IntervalStoreError::BatchIncomplete`].

use thiserror::Error;

use crate::core::CapacityUnits;
use crate::interfaces::StoreError;
use crate::runtime::bulk::BatchIncomplete;
use crate::telemetry::StoreOperation;

/// Interval store runtime errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed payload contents.
#[derive(Debug, Error)]
pub enum IntervalStoreError {
    /// Record, key, or argument is malformed.
    #[error("{operation} rejected for {key}: {reason}")]
    Validation {
        /// Operation that was refused.
        operation: StoreOperation,
        /// Key or owner addressed.
        key: String,
        /// Validation failure.
        reason: String,
    },
    /// An instant or key cannot be encoded.
    #[error("{operation} cannot encode {key}: {reason}")]
    Format {
        /// Operation that was refused.
        operation: StoreOperation,
        /// Key or owner addressed.
        key: String,
        /// Encoding failure.
        reason: String,
    },
    /// A stored item does not decode into an interval record.
    #[error("{operation} returned undecodable item {key}: {reason}")]
    Decode {
        /// Operation that returned the item.
        operation: StoreOperation,
        /// Key of the offending item.
        key: String,
        /// Decoding failure.
        reason: String,
        /// Capacity consumed before the failure.
        consumed: CapacityUnits,
    },
    /// A store call failed.
    #[error("{operation} failed for {key}: {source}")]
    StoreUnavailable {
        /// Operation that failed.
        operation: StoreOperation,
        /// Key or owner addressed.
        key: String,
        /// Underlying store error.
        source: StoreError,
        /// Capacity consumed before the failure.
        consumed: CapacityUnits,
    },
    /// The caller cancelled the operation.
    #[error("{operation} cancelled for {key}")]
    Cancelled {
        /// Operation that was cancelled.
        operation: StoreOperation,
        /// Key or owner addressed.
        key: String,
        /// Capacity consumed before cancellation.
        consumed: CapacityUnits,
    },
    /// A query needed more pages than allowed.
    #[error("{operation} for {key} exceeded {max_pages} pages")]
    LimitExceeded {
        /// Operation that hit the limit.
        operation: StoreOperation,
        /// Owner addressed.
        key: String,
        /// Configured page limit.
        max_pages: usize,
        /// Capacity consumed before the limit was hit.
        consumed: CapacityUnits,
    },
    /// A bulk mutation ended with operations still unapplied.
    #[error("{0}")]
    BatchIncomplete(Box<BatchIncomplete>),
}

impl IntervalStoreError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation {
                ..
            } => "validation",
            Self::Format {
                ..
            } => "format",
            Self::Decode {
                ..
            } => "decode",
            Self::StoreUnavailable {
                ..
            } => "store_unavailable",
            Self::Cancelled {
                ..
            } => "cancelled",
            Self::LimitExceeded {
                ..
            } => "limit_exceeded",
            Self::BatchIncomplete(_) => "batch_incomplete",
        }
    }

    /// Returns capacity consumed before the failure.
    #[must_use]
    pub fn consumed(&self) -> CapacityUnits {
        match self {
            Self::Validation {
                ..
            }
            | Self::Format {
                ..
            } => CapacityUnits::ZERO,
            Self::Decode {
                consumed,
                ..
            }
            | Self::StoreUnavailable {
                consumed,
                ..
            }
            | Self::Cancelled {
                consumed,
                ..
            }
            | Self::LimitExceeded {
                consumed,
                ..
            } => *consumed,
            Self::BatchIncomplete(incomplete) => incomplete.consumed,
        }
    }
}
