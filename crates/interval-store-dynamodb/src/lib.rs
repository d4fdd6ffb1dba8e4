// crates/interval-store-dynamodb/src/lib.rs
// ============================================================================
// Module: Interval Store DynamoDB Library
// Description: DynamoDB backend for the interval store.
// Purpose: Expose the DynamoDB store and its wire conversions.
// Dependencies: crate::{convert, store}
// ============================================================================

//! ## Overview
//! Implements [`interval_store_core::KeyValueStore`] over `aws-sdk-dynamodb`.
//! The table uses a string partition key holding the owner id and a string
//! sort key holding the encoded sort key; every other attribute is stored as
//! a string, integer number, or binary value.

/// Pure conversions between contract and SDK types.
pub mod convert;
/// DynamoDB store implementation.
pub mod store;

pub use convert::DEFAULT_PARTITION_KEY;
pub use convert::DEFAULT_SORT_KEY;
pub use convert::KeySchema;
pub use store::DynamoDbStore;
pub use store::DynamoDbStoreConfig;
