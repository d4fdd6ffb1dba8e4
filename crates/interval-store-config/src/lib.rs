// crates/interval-store-config/src/lib.rs
// ============================================================================
// Module: Interval Store Config Library
// Description: Configuration model and validation for the interval store.
// Purpose: Load one TOML file and build the core runtime types from it.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Loads `interval-store.toml`, validates it fail-closed, and converts the
//! validated sections into [`interval_store_core::IntervalStoreConfig`],
//! [`interval_store_core::RetryPolicy`], and an audit sink. Backend
//! connection settings stay plain data so this crate carries no SDK.

pub mod config;

pub use config::*;
