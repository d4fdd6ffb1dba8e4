// crates/interval-store-core/src/runtime/bulk.rs
// ============================================================================
// Module: Bulk Mutator
// Description: Chunked batch writes with bounded retry of unprocessed items.
// Purpose: Drive best-effort batch APIs to full application or a clear residual.
// Dependencies: crate::interfaces, rand, serde, tokio
// ============================================================================

//! ## Overview
//! Batch writes are best effort: the store may hand back any subset of a
//! chunk as unprocessed. [`BulkMutator::apply_batch`] splits the input into
//! store-sized chunks, submits them under bounded parallelism, and resubmits
//! only the unprocessed subset of each chunk with full-jitter exponential
//! backoff. Put and delete are idempotent, so resubmission never duplicates
//! an effect.
//!
//! Every loop is bounded: by the attempt ceiling, by the wall-clock budget,
//! and by the caller's deadline and cancellation signal. When any bound stops
//! the batch with operations remaining, the caller gets
//! [`IntervalStoreError::BatchIncomplete`] with the residual operations and a
//! per-chunk status. On cancellation no further chunk is submitted and every
//! in-flight chunk reports what it had confirmed before stopping. Capacity
//! and applied counts are reduced from per-chunk results on the calling task;
//! chunk tasks share no mutable state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio::time::sleep;

use crate::audit::BulkAuditEvent;
use crate::audit::BulkAuditEventParams;
use crate::audit::BulkEventKind;
use crate::audit::IntervalAuditSink;
use crate::audit::NoopAuditSink;
use crate::core::CapacityUnits;
use crate::core::RecordKey;
use crate::interfaces::KeyValueStore;
use crate::interfaces::WriteOperation;
use crate::runtime::context::CallContext;
use crate::runtime::context::CallFailure;
use crate::runtime::context::CancelSignal;
use crate::runtime::context::earliest;
use crate::runtime::context::guarded;
use crate::runtime::error::IntervalStoreError;
use crate::telemetry::CallOutcome;
use crate::telemetry::NoopMetrics;
use crate::telemetry::StoreMetricEvent;
use crate::telemetry::StoreMetrics;
use crate::telemetry::StoreOperation;

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

/// Retry and parallelism bounds for bulk mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum submissions per chunk, including the first.
    pub max_attempts: u32,
    /// Backoff base delay.
    pub base_delay: Duration,
    /// Backoff delay cap.
    pub max_delay: Duration,
    /// Wall-clock budget for the whole batch.
    pub budget: Duration,
    /// Timeout applied to each batch write call.
    pub call_timeout: Option<Duration>,
    /// Maximum chunks in flight at once.
    pub max_in_flight: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            budget: Duration::from_secs(60),
            call_timeout: Some(Duration::from_secs(10)),
            max_in_flight: 4,
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff cap before the given retry: `min(max, base * 2^retry)`.
    #[must_use]
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Returns a full-jitter delay drawn uniformly from `0 ..= backoff_ceiling(retry)`.
    #[must_use]
    pub fn jittered_delay(&self, retry: u32) -> Duration {
        let ceiling = u64::try_from(self.backoff_ceiling(retry).as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0 ..= ceiling))
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Final state of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Every operation was confirmed applied.
    Applied,
    /// The store confirmed some operations and returned the rest unprocessed.
    Partial,
    /// The last call failed, timed out, or was abandoned; its effect is unknown.
    Unknown,
    /// The chunk was never submitted.
    NotSubmitted,
}

impl ChunkStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Partial => "partial",
            Self::Unknown => "unknown",
            Self::NotSubmitted => "not_submitted",
        }
    }
}

/// Per-chunk report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkOutcome {
    /// Chunk position in submission order.
    pub index: usize,
    /// Final chunk status.
    pub status: ChunkStatus,
    /// Operations in the chunk.
    pub operations: usize,
    /// Operations confirmed applied.
    pub applied: usize,
    /// Submissions made.
    pub attempts: u32,
}

/// Reason a batch stopped with operations remaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum IncompleteReason {
    /// A chunk hit the attempt ceiling.
    RetryCeiling,
    /// The budget or caller deadline elapsed.
    DeadlineExceeded,
    /// The caller cancelled.
    Cancelled,
    /// The store rejected a chunk as malformed, or a chunk task failed.
    Rejected(String),
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryCeiling => f.write_str("retry ceiling reached"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// A batch that ended with operations not confirmed applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchIncomplete {
    /// Why the batch stopped.
    pub reason: IncompleteReason,
    /// Operations confirmed applied.
    pub applied: usize,
    /// Consumed capacity across all calls.
    pub consumed: CapacityUnits,
    /// Per-chunk outcomes in submission order.
    pub chunks: Vec<ChunkOutcome>,
    /// Operations not confirmed applied, in submission order.
    pub residual: Vec<WriteOperation>,
}

impl BatchIncomplete {
    /// Returns the keys of the residual operations.
    #[must_use]
    pub fn residual_keys(&self) -> Vec<RecordKey> {
        self.residual.iter().map(|operation| operation.key().clone()).collect()
    }
}

impl fmt::Display for BatchIncomplete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch incomplete ({}): {} applied, {} remaining, {} consumed",
            self.reason,
            self.applied,
            self.residual.len(),
            self.consumed
        )
    }
}

/// A fully applied batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Operations applied.
    pub applied: usize,
    /// Consumed capacity across all calls.
    pub consumed: CapacityUnits,
    /// Chunks submitted.
    pub chunks: usize,
    /// Submissions made across all chunks.
    pub attempts: u32,
}

// ============================================================================
// SECTION: Chunking
// ============================================================================

/// Splits operations into chunks of at most `size`, preserving order.
///
/// A chunk is also closed early when the next operation addresses a key
/// already present in it, since batch APIs reject duplicate keys per call.
/// Chunks may run concurrently, so writes to one key that land in different
/// chunks have no defined relative order unless `max_in_flight` is 1.
#[must_use]
pub fn plan_chunks(operations: Vec<WriteOperation>, size: usize) -> Vec<Vec<WriteOperation>> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<WriteOperation> = Vec::with_capacity(size);
    let mut keys: BTreeSet<RecordKey> = BTreeSet::new();
    for operation in operations {
        if current.len() == size || keys.contains(operation.key()) {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
            keys.clear();
        }
        keys.insert(operation.key().clone());
        current.push(operation);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ============================================================================
// SECTION: Bulk Mutator
// ============================================================================

/// Applies large sets of puts and deletes through a store's batch API.
pub struct BulkMutator {
    /// Backend store.
    store: Arc<dyn KeyValueStore>,
    /// Retry bounds.
    policy: RetryPolicy,
    /// Operations per chunk.
    batch_size: usize,
    /// Audit sink.
    audit: Arc<dyn IntervalAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn StoreMetrics>,
}

impl BulkMutator {
    /// Creates a mutator using the store's batch limit as chunk size.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        let batch_size = store.max_batch_items().max(1);
        Self {
            store,
            policy,
            batch_size,
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Sets the chunk size, clamped to `1 ..= store.max_batch_items()`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, self.store.max_batch_items().max(1));
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn IntervalAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn StoreMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the effective chunk size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Applies every operation, retrying unprocessed subsets within bounds.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalStoreError::BatchIncomplete`] when the attempt
    /// ceiling, the budget, the caller deadline, cancellation, or a store
    /// rejection stops the batch with operations not confirmed applied.
    pub async fn apply_batch(
        &self,
        ctx: &CallContext,
        operations: Vec<WriteOperation>,
    ) -> Result<BatchReport, IntervalStoreError> {
        let deadline = earliest(ctx.deadline, Instant::now().checked_add(self.policy.budget));
        let chunks = plan_chunks(operations, self.batch_size);
        let mut ledger = BatchLedger::new(&chunks);
        let mut queue: VecDeque<(usize, Vec<WriteOperation>)> =
            chunks.into_iter().enumerate().collect();
        let mut join_set: JoinSet<ChunkResult> = JoinSet::new();
        let max_in_flight = self.policy.max_in_flight.max(1);
        let mut halt: Option<IncompleteReason> = None;
        let mut cancel_seen = false;

        loop {
            if halt.is_none() {
                if ctx.cancel.is_cancelled() {
                    halt = Some(IncompleteReason::Cancelled);
                } else if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    halt = Some(IncompleteReason::DeadlineExceeded);
                }
            }
            while halt.is_none() && join_set.len() < max_in_flight {
                let Some((index, chunk)) = queue.pop_front() else {
                    break;
                };
                ledger.mark_in_flight(index);
                join_set.spawn(
                    ChunkDriver {
                        store: Arc::clone(&self.store),
                        policy: self.policy,
                        cancel: ctx.cancel.clone(),
                        deadline,
                        audit: Arc::clone(&self.audit),
                        metrics: Arc::clone(&self.metrics),
                    }
                    .run(index, chunk),
                );
            }
            if join_set.is_empty() {
                break;
            }
            tokio::select! {
                biased;
                // In-flight chunks observe the same signal and return their
                // confirmed progress, so they are drained rather than aborted.
                () = ctx.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    halt = Some(IncompleteReason::Cancelled);
                }
                joined = join_set.join_next() => match joined {
                    Some(Ok(result)) => ledger.absorb(result),
                    Some(Err(err)) if !err.is_cancelled() => {
                        ledger.task_failed(err.to_string());
                    }
                    Some(Err(_)) | None => {}
                },
            }
        }

        let report = ledger.finish(halt);
        match report {
            Ok(report) => {
                self.emit(BulkEventKind::BatchComplete, BulkAuditEventParams {
                    operations: report.applied,
                    consumed: report.consumed,
                    ..BulkAuditEventParams::default()
                });
                Ok(report)
            }
            Err(incomplete) => {
                self.emit(BulkEventKind::BatchIncomplete, BulkAuditEventParams {
                    operations: incomplete.applied + incomplete.residual.len(),
                    unprocessed: incomplete.residual.len(),
                    reason: Some(incomplete.reason.to_string()),
                    consumed: incomplete.consumed,
                    ..BulkAuditEventParams::default()
                });
                Err(IntervalStoreError::BatchIncomplete(Box::new(incomplete)))
            }
        }
    }

    /// Records a batch-level audit event.
    fn emit(&self, kind: BulkEventKind, params: BulkAuditEventParams) {
        self.audit.record_bulk(&BulkAuditEvent::new(kind, params));
    }
}

// ============================================================================
// SECTION: Chunk Driver
// ============================================================================

/// Per-chunk result reduced by the calling task.
struct ChunkResult {
    /// Chunk position.
    index: usize,
    /// Final status.
    status: ChunkStatus,
    /// Operations confirmed applied.
    applied: usize,
    /// Consumed capacity across attempts.
    consumed: CapacityUnits,
    /// Submissions made.
    attempts: u32,
    /// Operations not confirmed applied.
    residual: Vec<WriteOperation>,
    /// Why the chunk stopped early.
    stop: Option<IncompleteReason>,
}

/// Everything a spawned chunk task owns.
struct ChunkDriver {
    /// Backend store.
    store: Arc<dyn KeyValueStore>,
    /// Retry bounds.
    policy: RetryPolicy,
    /// Caller cancellation.
    cancel: CancelSignal,
    /// Batch deadline.
    deadline: Option<Instant>,
    /// Audit sink.
    audit: Arc<dyn IntervalAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn StoreMetrics>,
}

impl ChunkDriver {
    /// Submits one chunk until it is applied or a bound stops it.
    async fn run(self, index: usize, chunk: Vec<WriteOperation>) -> ChunkResult {
        let total = chunk.len();
        let ctx = CallContext {
            deadline: self.deadline,
            cancel: self.cancel.clone(),
        };
        let mut remaining = chunk;
        let mut consumed = CapacityUnits::ZERO;
        let mut attempts: u32 = 0;
        let (status, stop) = loop {
            attempts += 1;
            self.emit(BulkEventKind::ChunkSubmit, BulkAuditEventParams {
                chunk: Some(index),
                attempt: Some(attempts),
                operations: remaining.len(),
                consumed,
                ..BulkAuditEventParams::default()
            });
            let started = std::time::Instant::now();
            let result =
                guarded(&ctx, self.policy.call_timeout, self.store.batch_write(remaining.clone()))
                    .await;
            self.record_metric(&result, started.elapsed());
            // Confirmed means the store answered; otherwise the call's effect is unknown.
            let confirmed = match result {
                Ok(output) => {
                    consumed += output.consumed;
                    remaining = output.unprocessed;
                    if remaining.is_empty() {
                        break (ChunkStatus::Applied, None);
                    }
                    true
                }
                Err(CallFailure::Cancelled) => {
                    break (ChunkStatus::Unknown, Some(IncompleteReason::Cancelled));
                }
                Err(CallFailure::Store(err)) if !err.is_retryable() => {
                    break (ChunkStatus::Unknown, Some(IncompleteReason::Rejected(err.to_string())));
                }
                Err(CallFailure::Store(_)) => false,
            };
            let status = if confirmed { ChunkStatus::Partial } else { ChunkStatus::Unknown };
            if attempts >= self.policy.max_attempts {
                break (status, Some(IncompleteReason::RetryCeiling));
            }
            let delay = self.policy.jittered_delay(attempts.saturating_sub(1));
            let resume = Instant::now().checked_add(delay);
            if let (Some(deadline), Some(resume)) = (self.deadline, resume)
                && resume >= deadline
            {
                break (status, Some(IncompleteReason::DeadlineExceeded));
            }
            self.emit(BulkEventKind::ChunkRetry, BulkAuditEventParams {
                chunk: Some(index),
                attempt: Some(attempts),
                operations: total,
                unprocessed: remaining.len(),
                delay_ms: Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)),
                consumed,
                ..BulkAuditEventParams::default()
            });
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    break (status, Some(IncompleteReason::Cancelled));
                }
                () = sleep(delay) => {}
            }
        };
        let applied = total.saturating_sub(remaining.len());
        self.emit(BulkEventKind::ChunkComplete, BulkAuditEventParams {
            chunk: Some(index),
            attempt: Some(attempts),
            operations: total,
            unprocessed: remaining.len(),
            status: Some(status),
            reason: stop.as_ref().map(ToString::to_string),
            consumed,
            ..BulkAuditEventParams::default()
        });
        ChunkResult {
            index,
            status,
            applied,
            consumed,
            attempts,
            residual: remaining,
            stop,
        }
    }

    /// Records the latency metric for one batch write call.
    fn record_metric<T>(&self, result: &Result<T, CallFailure>, latency: Duration) {
        let (outcome, error_kind) = match result {
            Ok(_) => (CallOutcome::Ok, None),
            Err(CallFailure::Store(err)) => (CallOutcome::Error, Some(err.kind())),
            Err(CallFailure::Cancelled) => (CallOutcome::Error, Some("cancelled")),
        };
        self.metrics.record_call(
            StoreMetricEvent {
                operation: StoreOperation::BatchWrite,
                outcome,
                error_kind,
            },
            latency,
        );
    }

    /// Records a chunk-level audit event.
    fn emit(&self, kind: BulkEventKind, params: BulkAuditEventParams) {
        self.audit.record_bulk(&BulkAuditEvent::new(kind, params));
    }
}

// ============================================================================
// SECTION: Batch Ledger
// ============================================================================

/// Reduction state for a batch, owned by the calling task.
struct BatchLedger {
    /// Per-chunk outcomes.
    chunks: Vec<ChunkOutcome>,
    /// Per-chunk operations not confirmed applied.
    residual: Vec<Vec<WriteOperation>>,
    /// Consumed capacity across chunks.
    consumed: CapacityUnits,
    /// First chunk-level stop reason.
    first_stop: Option<IncompleteReason>,
}

impl BatchLedger {
    /// Starts a ledger with every chunk unsubmitted.
    fn new(chunks: &[Vec<WriteOperation>]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .enumerate()
                .map(|(index, chunk)| ChunkOutcome {
                    index,
                    status: ChunkStatus::NotSubmitted,
                    operations: chunk.len(),
                    applied: 0,
                    attempts: 0,
                })
                .collect(),
            residual: chunks.to_vec(),
            consumed: CapacityUnits::ZERO,
            first_stop: None,
        }
    }

    /// Marks a chunk as submitted; it stays unknown until its result arrives.
    fn mark_in_flight(&mut self, index: usize) {
        if let Some(outcome) = self.chunks.get_mut(index) {
            outcome.status = ChunkStatus::Unknown;
        }
    }

    /// Folds one chunk result into the ledger.
    fn absorb(&mut self, result: ChunkResult) {
        if let Some(outcome) = self.chunks.get_mut(result.index) {
            outcome.status = result.status;
            outcome.applied = result.applied;
            outcome.attempts = result.attempts;
        }
        if let Some(residual) = self.residual.get_mut(result.index) {
            *residual = result.residual;
        }
        self.consumed += result.consumed;
        if self.first_stop.is_none() {
            self.first_stop = result.stop;
        }
    }

    /// Records a chunk task that ended without a result.
    fn task_failed(&mut self, reason: String) {
        self.first_stop.get_or_insert(IncompleteReason::Rejected(reason));
    }

    /// Produces the batch report or the incomplete residual.
    fn finish(self, halt: Option<IncompleteReason>) -> Result<BatchReport, BatchIncomplete> {
        let applied = self.chunks.iter().map(|chunk| chunk.applied).sum();
        let residual: Vec<WriteOperation> = self.residual.into_iter().flatten().collect();
        if residual.is_empty() {
            return Ok(BatchReport {
                applied,
                consumed: self.consumed,
                chunks: self.chunks.len(),
                attempts: self.chunks.iter().map(|chunk| chunk.attempts).sum(),
            });
        }
        let reason = halt.or(self.first_stop).unwrap_or_else(|| {
            IncompleteReason::Rejected("chunk task ended without a result".to_string())
        });
        Err(BatchIncomplete {
            reason,
            applied,
            consumed: self.consumed,
            chunks: self.chunks,
            residual,
        })
    }
}
