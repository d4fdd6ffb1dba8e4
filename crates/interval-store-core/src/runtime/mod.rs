// crates/interval-store-core/src/runtime/mod.rs
// ============================================================================
// Module: Interval Store Runtime
// Description: Store facade, bulk mutator, call context, and in-memory store.
// Purpose: Execute interval operations against any key-value store backend.
// Dependencies: crate::{core, interfaces}, rand, tokio
// ============================================================================

//! ## Overview
//! Runtime modules turn interval semantics into store calls. The facades are
//! stateless: persisted state lives only in the backend.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod bulk;
pub mod context;
pub mod error;
pub mod interval_store;
pub mod memory;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bulk::BatchIncomplete;
pub use bulk::BatchReport;
pub use bulk::BulkMutator;
pub use bulk::ChunkOutcome;
pub use bulk::ChunkStatus;
pub use bulk::IncompleteReason;
pub use bulk::RetryPolicy;
pub use bulk::plan_chunks;
pub use context::CallContext;
pub use context::CancelHandle;
pub use context::CancelSignal;
pub use context::cancel_pair;
pub use error::IntervalStoreError;
pub use interval_store::GetOutcome;
pub use interval_store::IntervalStore;
pub use interval_store::IntervalStoreConfig;
pub use interval_store::QueryOutcome;
pub use memory::FixedClock;
pub use memory::InMemoryKeyValueStore;
pub use memory::StoreClock;
pub use memory::SystemClock;
pub use schema::AttributeSchema;
