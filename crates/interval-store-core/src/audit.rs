// crates/interval-store-core/src/audit.rs
// ============================================================================
// Module: Interval Store Audit Logging
// Description: Structured audit events for store calls and bulk mutations.
// Purpose: Emit JSON-line logs without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events record which operation ran against which key, how it ended,
//! and what capacity it consumed. Payloads are never logged. Sinks serialize
//! events as JSON lines so deployments can route them to any log pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::CapacityUnits;
use crate::runtime::bulk::ChunkStatus;
use crate::telemetry::CallOutcome;
use crate::telemetry::StoreOperation;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event for a single-item call or a containment query.
#[derive(Debug, Clone, Serialize)]
pub struct IntervalAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation classification.
    pub operation: StoreOperation,
    /// Owner the call addressed.
    pub owner: String,
    /// Sort key for point operations.
    pub sort_key: Option<String>,
    /// Call outcome.
    pub outcome: CallOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Records returned or written.
    pub items: usize,
    /// Query pages fetched.
    pub pages: usize,
    /// Consumed capacity.
    pub consumed: CapacityUnits,
}

/// Inputs required to construct an interval audit event.
pub struct IntervalAuditEventParams {
    /// Operation classification.
    pub operation: StoreOperation,
    /// Owner the call addressed.
    pub owner: String,
    /// Sort key for point operations.
    pub sort_key: Option<String>,
    /// Call outcome.
    pub outcome: CallOutcome,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Records returned or written.
    pub items: usize,
    /// Query pages fetched.
    pub pages: usize,
    /// Consumed capacity.
    pub consumed: CapacityUnits,
}

impl IntervalAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: IntervalAuditEventParams) -> Self {
        Self {
            event: "interval_call",
            timestamp_ms: now_ms(),
            operation: params.operation,
            owner: params.owner,
            sort_key: params.sort_key,
            outcome: params.outcome,
            error_kind: params.error_kind,
            items: params.items,
            pages: params.pages,
            consumed: params.consumed,
        }
    }
}

/// Bulk mutation event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkEventKind {
    /// A chunk was submitted to the store.
    ChunkSubmit,
    /// Unprocessed operations are scheduled for resubmission.
    ChunkRetry,
    /// A chunk stopped, fully applied or not.
    ChunkComplete,
    /// Every operation of the batch was applied.
    BatchComplete,
    /// The batch ended with operations remaining.
    BatchIncomplete,
}

/// Audit event for bulk mutation progress.
#[derive(Debug, Clone, Serialize)]
pub struct BulkAuditEvent {
    /// Event identifier.
    pub event: BulkEventKind,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Chunk index for chunk-level events.
    pub chunk: Option<usize>,
    /// Submission attempt (1-based) for chunk-level events.
    pub attempt: Option<u32>,
    /// Operations covered by the event.
    pub operations: usize,
    /// Operations still unprocessed.
    pub unprocessed: usize,
    /// Backoff delay before the next attempt.
    pub delay_ms: Option<u64>,
    /// Chunk status for completion events.
    pub status: Option<ChunkStatus>,
    /// Stop reason label.
    pub reason: Option<String>,
    /// Consumed capacity so far.
    pub consumed: CapacityUnits,
}

/// Inputs required to construct a bulk audit event.
#[derive(Default)]
pub struct BulkAuditEventParams {
    /// Chunk index for chunk-level events.
    pub chunk: Option<usize>,
    /// Submission attempt (1-based) for chunk-level events.
    pub attempt: Option<u32>,
    /// Operations covered by the event.
    pub operations: usize,
    /// Operations still unprocessed.
    pub unprocessed: usize,
    /// Backoff delay before the next attempt.
    pub delay_ms: Option<u64>,
    /// Chunk status for completion events.
    pub status: Option<ChunkStatus>,
    /// Stop reason label.
    pub reason: Option<String>,
    /// Consumed capacity so far.
    pub consumed: CapacityUnits,
}

impl BulkAuditEvent {
    /// Creates a new bulk audit event with a consistent timestamp.
    #[must_use]
    pub fn new(event: BulkEventKind, params: BulkAuditEventParams) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            chunk: params.chunk,
            attempt: params.attempt,
            operations: params.operations,
            unprocessed: params.unprocessed,
            delay_ms: params.delay_ms,
            status: params.status,
            reason: params.reason,
            consumed: params.consumed,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for interval store events.
pub trait IntervalAuditSink: Send + Sync {
    /// Record a single-item or query event.
    fn record(&self, event: &IntervalAuditEvent);

    /// Record a bulk mutation event.
    fn record_bulk(&self, _event: &BulkAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl IntervalAuditSink for StderrAuditSink {
    fn record(&self, event: &IntervalAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_bulk(&self, event: &BulkAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl IntervalAuditSink for FileAuditSink {
    fn record(&self, event: &IntervalAuditEvent) {
        self.append(event);
    }

    fn record_bulk(&self, event: &BulkAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl IntervalAuditSink for NoopAuditSink {
    fn record(&self, _event: &IntervalAuditEvent) {}

    fn record_bulk(&self, _event: &BulkAuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time in milliseconds since epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
