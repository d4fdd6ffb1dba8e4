// crates/interval-store-core/src/core/mod.rs
// ============================================================================
// Module: Interval Store Core Types
// Description: Data model, identifiers, and the sort-key codec.
// Purpose: Group backend-agnostic types shared by the runtime and backends.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Core types carry no I/O. They define what an interval record is, how its
//! sort key orders chronologically, and which edge semantics a containment
//! query applies.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod capacity;
pub mod identifiers;
pub mod record;
pub mod sort_key;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use self::capacity::CapacityUnits;
pub use self::identifiers::IntervalTag;
pub use self::identifiers::MAX_OWNER_BYTES;
pub use self::identifiers::MAX_SORT_KEY_BYTES;
pub use self::identifiers::OwnerId;
pub use self::identifiers::SortKey;
pub use self::record::IntervalRecord;
pub use self::record::Payload;
pub use self::record::RecordError;
pub use self::record::RecordKey;
pub use self::sort_key::CodecError;
pub use self::sort_key::DEFAULT_SEPARATOR;
pub use self::sort_key::DecodedSortKey;
pub use self::sort_key::SortKeyCodec;
pub use self::time::Boundary;
pub use self::time::ContainmentPolicy;
pub use self::time::TimeResolution;
