// crates/interval-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Interval Store Interfaces
// Description: Backend-agnostic contract for sorted key-value stores.
// Purpose: Define the store surface consumed by the interval store runtime.
// Dependencies: async-trait, serde, thiserror
// ============================================================================

//! ## Overview
//! The runtime only needs exact-match partition lookup, an ordered range scan
//! on the sort key with one scalar post-filter, single-item writes, and a
//! best-effort batch write. Backends implement [`KeyValueStore`]; session,
//! credential, and table provisioning concerns stay outside this contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::CapacityUnits;
use crate::core::RecordKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default maximum number of operations accepted by one batch write call.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 25;

// ============================================================================
// SECTION: Items
// ============================================================================

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// String attribute.
    String(String),
    /// Integer attribute.
    Number(i64),
    /// Binary attribute.
    Binary(Vec<u8>),
}

impl AttributeValue {
    /// Returns the string value when this is a string attribute.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Number(_) | Self::Binary(_) => None,
        }
    }

    /// Returns the integer value when this is a number attribute.
    #[must_use]
    pub const fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::String(_) | Self::Binary(_) => None,
        }
    }
}

/// Attribute map of a stored item, excluding its key.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A stored item: primary key plus attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
    /// Primary key.
    pub key: RecordKey,
    /// Non-key attributes.
    pub attributes: Attributes,
}

/// One operation of a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOperation {
    /// Insert or overwrite an item.
    Put {
        /// Item to write.
        item: StoreItem,
    },
    /// Delete an item; absent items are a no-op.
    Delete {
        /// Key to delete.
        key: RecordKey,
    },
}

impl WriteOperation {
    /// Returns the key addressed by the operation.
    #[must_use]
    pub const fn key(&self) -> &RecordKey {
        match self {
            Self::Put {
                item,
            } => &item.key,
            Self::Delete {
                key,
            } => key,
        }
    }

    /// Returns a stable label for the operation kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Put {
                ..
            } => "put",
            Self::Delete {
                ..
            } => "delete",
        }
    }
}

// ============================================================================
// SECTION: Query Types
// ============================================================================

/// Sort-key comparison supported natively by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOperator {
    /// `sort_key < bound`.
    LessThan,
    /// `sort_key <= bound`.
    LessThanOrEqual,
    /// `sort_key = bound`.
    Equal,
}

impl KeyOperator {
    /// Evaluates the operator against a candidate key.
    #[must_use]
    pub fn matches(self, candidate: &str, bound: &str) -> bool {
        match self {
            Self::LessThan => candidate < bound,
            Self::LessThanOrEqual => candidate <= bound,
            Self::Equal => candidate == bound,
        }
    }
}

/// Sort-key range condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKeyCondition {
    /// Comparison operator.
    pub operator: KeyOperator,
    /// Bound compared against each sort key.
    pub bound: String,
}

/// Threshold comparison applied after the key scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// `attribute >= value`.
    GreaterThanOrEqual,
    /// `attribute > value`.
    GreaterThan,
}

/// Scalar post-filter on a numeric attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    /// Attribute name.
    pub attribute: String,
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Threshold value.
    pub value: i64,
}

impl PostFilter {
    /// Evaluates the filter against an attribute map; missing or non-numeric
    /// attributes never match.
    #[must_use]
    pub fn matches(&self, attributes: &Attributes) -> bool {
        let Some(actual) = attributes.get(&self.attribute).and_then(AttributeValue::as_number)
        else {
            return false;
        };
        match self.operator {
            FilterOperator::GreaterThanOrEqual => actual >= self.value,
            FilterOperator::GreaterThan => actual > self.value,
        }
    }
}

/// Opaque continuation token: the last key evaluated by the previous page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub RecordKey);

/// Single-partition range query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Partition key value.
    pub partition: String,
    /// Sort-key condition.
    pub condition: SortKeyCondition,
    /// Optional post-filter.
    pub filter: Option<PostFilter>,
    /// Resume point from a previous page.
    pub start_after: Option<ContinuationToken>,
    /// Optional page size limit.
    pub limit: Option<usize>,
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// Result of a point read.
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemOutput {
    /// Item when present.
    pub item: Option<StoreItem>,
    /// Consumed capacity.
    pub consumed: CapacityUnits,
}

/// Result of one batch write call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteOutput {
    /// Consumed capacity.
    pub consumed: CapacityUnits,
    /// Operations the store did not apply.
    pub unprocessed: Vec<WriteOperation>,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    /// Items in ascending sort-key order.
    pub items: Vec<StoreItem>,
    /// Consumed capacity.
    pub consumed: CapacityUnits,
    /// Present when more pages remain.
    pub continuation: Option<ContinuationToken>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Store call errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed item payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport or service failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Store rejected the call for throughput reasons.
    #[error("store throttled: {0}")]
    Throttled(String),
    /// Call exceeded its timeout.
    #[error("store call timed out: {0}")]
    Timeout(String),
    /// Store rejected the request as malformed.
    #[error("store rejected request: {0}")]
    Invalid(String),
}

impl StoreError {
    /// Returns true when the same call may succeed if retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Invalid(_))
    }

    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Throttled(_) => "throttled",
            Self::Timeout(_) => "timeout",
            Self::Invalid(_) => "invalid",
        }
    }
}

// ============================================================================
// SECTION: Store Contract
// ============================================================================

/// Sorted key-value store with partition lookup and ordered sort-key scans.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Writes one item, overwriting any item with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    async fn put_item(&self, item: StoreItem) -> Result<CapacityUnits, StoreError>;

    /// Reads one item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    async fn get_item(&self, key: &RecordKey) -> Result<GetItemOutput, StoreError>;

    /// Deletes one item; deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    async fn delete_item(&self, key: &RecordKey) -> Result<CapacityUnits, StoreError>;

    /// Applies a batch of operations on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the call itself fails. Partial application
    /// is reported through [`BatchWriteOutput::unprocessed`], not as an error.
    async fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
    ) -> Result<BatchWriteOutput, StoreError>;

    /// Runs one page of a range query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError>;

    /// Maximum operations accepted by one [`KeyValueStore::batch_write`] call.
    fn max_batch_items(&self) -> usize {
        DEFAULT_MAX_BATCH_ITEMS
    }

    /// Whether [`QueryRequest::filter`] is evaluated by the store.
    fn supports_post_filter(&self) -> bool {
        true
    }
}
