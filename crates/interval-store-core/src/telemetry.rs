// crates/interval-store-core/src/telemetry.rs
// ============================================================================
// Module: Interval Store Telemetry
// Description: Metric hooks for store calls issued by the runtime.
// Purpose: Provide call labels and latency buckets without a metrics backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A thin metrics interface for store call counters and latency histograms.
//! Deployments plug in their own exporter by implementing [`StoreMetrics`].
//! Labels never include owner identifiers or payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for store call histograms.
pub const STORE_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Store operation classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    /// Single-item put.
    Put,
    /// Single-item get.
    Get,
    /// Single-item delete.
    Delete,
    /// Containment query (all pages).
    Query,
    /// One batch write call.
    BatchWrite,
}

impl StoreOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Get => "get",
            Self::Delete => "delete",
            Self::Query => "query",
            Self::BatchWrite => "batch_write",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store call outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Call succeeded.
    Ok,
    /// Call failed.
    Error,
}

impl CallOutcome {
    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Store call metric event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetricEvent {
    /// Operation classification.
    pub operation: StoreOperation,
    /// Call outcome.
    pub outcome: CallOutcome,
    /// Normalized error kind label when the call failed.
    pub error_kind: Option<&'static str>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for store calls.
pub trait StoreMetrics: Send + Sync {
    /// Records one completed call and its latency.
    fn record_call(&self, event: StoreMetricEvent, latency: Duration);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl StoreMetrics for NoopMetrics {
    fn record_call(&self, _event: StoreMetricEvent, _latency: Duration) {}
}
