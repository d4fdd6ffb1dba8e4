// crates/interval-store-cli/src/lib.rs
// ============================================================================
// Module: Interval Store CLI Library
// Description: Shared helpers for the interval store command-line interface.
// Purpose: Keep argument parsing and the demo scenario testable off the binary.
// Dependencies: crate::{demo, input}
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) parses arguments and selects a
//! backend; this library turns command-line text and JSON input files into
//! interval records and runs the demo scenario against any store.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Demo scenario replayed by the `demo` command.
pub mod demo;
/// Instant parsing and bulk input decoding.
pub mod input;
