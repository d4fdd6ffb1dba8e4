// crates/interval-store-core/src/lib.rs
// ============================================================================
// Module: Interval Store Core Library
// Description: Public API surface for the interval store core.
// Purpose: Expose interval types, the store contract, and runtime facades.
// Dependencies: crate::{audit, core, interfaces, runtime, telemetry}
// ============================================================================

//! ## Overview
//! Interval store core stores and queries time-interval records in a sorted
//! key-value store whose only access paths are partition lookup and an ordered
//! sort-key scan. It is backend-agnostic: backends implement
//! [`KeyValueStore`], and [`InMemoryKeyValueStore`] covers tests and demos.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::Boundary;
pub use crate::core::CapacityUnits;
pub use crate::core::CodecError;
pub use crate::core::ContainmentPolicy;
pub use crate::core::DEFAULT_SEPARATOR;
pub use crate::core::DecodedSortKey;
pub use crate::core::IntervalRecord;
pub use crate::core::IntervalTag;
pub use crate::core::OwnerId;
pub use crate::core::Payload;
pub use crate::core::RecordError;
pub use crate::core::RecordKey;
pub use crate::core::SortKey;
pub use crate::core::SortKeyCodec;
pub use crate::core::TimeResolution;
pub use audit::FileAuditSink;
pub use audit::IntervalAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::AttributeValue;
pub use interfaces::Attributes;
pub use interfaces::BatchWriteOutput;
pub use interfaces::ContinuationToken;
pub use interfaces::FilterOperator;
pub use interfaces::GetItemOutput;
pub use interfaces::KeyOperator;
pub use interfaces::KeyValueStore;
pub use interfaces::PostFilter;
pub use interfaces::QueryPage;
pub use interfaces::QueryRequest;
pub use interfaces::SortKeyCondition;
pub use interfaces::StoreError;
pub use interfaces::StoreItem;
pub use interfaces::WriteOperation;
pub use runtime::AttributeSchema;
pub use runtime::BatchIncomplete;
pub use runtime::BatchReport;
pub use runtime::BulkMutator;
pub use runtime::CallContext;
pub use runtime::CancelHandle;
pub use runtime::CancelSignal;
pub use runtime::ChunkOutcome;
pub use runtime::ChunkStatus;
pub use runtime::FixedClock;
pub use runtime::GetOutcome;
pub use runtime::InMemoryKeyValueStore;
pub use runtime::IncompleteReason;
pub use runtime::IntervalStore;
pub use runtime::IntervalStoreConfig;
pub use runtime::IntervalStoreError;
pub use runtime::QueryOutcome;
pub use runtime::RetryPolicy;
pub use runtime::StoreClock;
pub use runtime::SystemClock;
pub use runtime::cancel_pair;
pub use telemetry::NoopMetrics;
pub use telemetry::StoreMetricEvent;
pub use telemetry::StoreMetrics;
pub use telemetry::StoreOperation;
