// crates/interval-store-core/tests/bulk_mutator.rs
// ============================================================================
// Module: Bulk Mutator Tests
// Description: Chunking, retry convergence, and bounded termination.
// Purpose: Validate that batches either apply fully or report a residual.
// Dependencies: interval-store-core, tokio
// ============================================================================

//! ## Overview
//! Drives [`BulkMutator`] against stores that return unprocessed subsets
//! (halves or seeded random subsets),
//! never make progress, hang, throttle, or reject outright.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use std::collections::BTreeSet;

use async_trait::async_trait;
use interval_store_core::Attributes;
use interval_store_core::AttributeValue;
use interval_store_core::BatchWriteOutput;
use interval_store_core::BulkMutator;
use interval_store_core::CallContext;
use interval_store_core::CapacityUnits;
use interval_store_core::ChunkStatus;
use interval_store_core::GetItemOutput;
use interval_store_core::InMemoryKeyValueStore;
use interval_store_core::IncompleteReason;
use interval_store_core::IntervalStoreError;
use interval_store_core::KeyValueStore;
use interval_store_core::OwnerId;
use interval_store_core::QueryPage;
use interval_store_core::QueryRequest;
use interval_store_core::RecordKey;
use interval_store_core::RetryPolicy;
use interval_store_core::SortKey;
use interval_store_core::StoreError;
use interval_store_core::StoreItem;
use interval_store_core::WriteOperation;
use interval_store_core::audit::BulkAuditEvent;
use interval_store_core::audit::BulkEventKind;
use interval_store_core::audit::IntervalAuditEvent;
use interval_store_core::audit::IntervalAuditSink;
use interval_store_core::cancel_pair;
use interval_store_core::runtime::BatchIncomplete;
use interval_store_core::runtime::plan_chunks;
use proptest::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn key(owner: &str, sort_key: &str) -> RecordKey {
    RecordKey::new(OwnerId::new(owner), SortKey::new(sort_key))
}

fn put(owner: &str, sort_key: &str) -> WriteOperation {
    let mut attributes = Attributes::new();
    attributes.insert("LastDay".to_string(), AttributeValue::Number(1_725_000_000));
    attributes.insert("Data".to_string(), AttributeValue::String("XYZ".to_string()));
    WriteOperation::Put {
        item: StoreItem {
            key: key(owner, sort_key),
            attributes,
        },
    }
}

fn delete(owner: &str, sort_key: &str) -> WriteOperation {
    WriteOperation::Delete {
        key: key(owner, sort_key),
    }
}

fn puts(count: usize) -> Vec<WriteOperation> {
    (0 .. count)
        .map(|index| put(&format!("owner-{}", index % 7), &format!("2024082{index:03}")))
        .collect()
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 10,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        budget: Duration::from_secs(10),
        call_timeout: Some(Duration::from_secs(1)),
        max_in_flight: 4,
    }
}

fn incomplete(err: IntervalStoreError) -> BatchIncomplete {
    match err {
        IntervalStoreError::BatchIncomplete(incomplete) => *incomplete,
        other => panic!("expected incomplete batch, got {other}"),
    }
}

/// How the test store answers batch writes.
enum BatchBehavior {
    /// Applies only the first half of each batch while flaky calls remain.
    Halving(AtomicUsize),
    /// Accepts every batch and applies none of it.
    Stalled,
    /// Never answers.
    Hanging,
    /// Returns scripted errors for the first calls, then applies.
    Scripted(Mutex<Vec<StoreError>>),
    /// Leaves a random non-empty subset unprocessed while flaky calls remain.
    RandomSubsets {
        /// Flaky calls left across all chunks.
        flaky_calls: AtomicUsize,
        /// Seeded subset picker.
        rng: Mutex<StdRng>,
    },
}

/// Memory store with scripted batch-write behavior.
struct TestStore {
    inner: InMemoryKeyValueStore,
    behavior: BatchBehavior,
    calls: AtomicUsize,
}

impl TestStore {
    fn new(inner: InMemoryKeyValueStore, behavior: BatchBehavior) -> Arc<Self> {
        Arc::new(Self {
            inner,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for TestStore {
    async fn put_item(&self, item: StoreItem) -> Result<CapacityUnits, StoreError> {
        self.inner.put_item(item).await
    }

    async fn get_item(&self, key: &RecordKey) -> Result<GetItemOutput, StoreError> {
        self.inner.get_item(key).await
    }

    async fn delete_item(&self, key: &RecordKey) -> Result<CapacityUnits, StoreError> {
        self.inner.delete_item(key).await
    }

    async fn batch_write(
        &self,
        mut operations: Vec<WriteOperation>,
    ) -> Result<BatchWriteOutput, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            BatchBehavior::Halving(flaky_calls) => {
                let flaky = flaky_calls
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if !flaky {
                    return self.inner.batch_write(operations).await;
                }
                let unprocessed = operations.split_off(operations.len().div_ceil(2));
                let output = self.inner.batch_write(operations).await?;
                Ok(BatchWriteOutput {
                    consumed: output.consumed,
                    unprocessed,
                })
            }
            BatchBehavior::Stalled => Ok(BatchWriteOutput {
                consumed: CapacityUnits::ZERO,
                unprocessed: operations,
            }),
            BatchBehavior::Hanging => std::future::pending().await,
            BatchBehavior::RandomSubsets {
                flaky_calls,
                rng,
            } => {
                let flaky = flaky_calls
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok();
                if !flaky {
                    return self.inner.batch_write(operations).await;
                }
                let (unprocessed, applied) =
                    split_random_subset(operations, &mut rng.lock().unwrap());
                if applied.is_empty() {
                    return Ok(BatchWriteOutput {
                        consumed: CapacityUnits::ZERO,
                        unprocessed,
                    });
                }
                let output = self.inner.batch_write(applied).await?;
                Ok(BatchWriteOutput {
                    consumed: output.consumed,
                    unprocessed,
                })
            }
            BatchBehavior::Scripted(errors) => {
                let scripted = errors.lock().unwrap().pop();
                match scripted {
                    Some(err) => Err(err),
                    None => self.inner.batch_write(operations).await,
                }
            }
        }
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError> {
        self.inner.query(request).await
    }
}

/// Splits a batch into a non-empty unprocessed subset and the applied rest.
fn split_random_subset(
    operations: Vec<WriteOperation>,
    rng: &mut StdRng,
) -> (Vec<WriteOperation>, Vec<WriteOperation>) {
    let forced = rng.gen_range(0 .. operations.len());
    let mut unprocessed = Vec::new();
    let mut applied = Vec::new();
    for (index, operation) in operations.into_iter().enumerate() {
        if index == forced || rng.gen_bool(0.5) {
            unprocessed.push(operation);
        } else {
            applied.push(operation);
        }
    }
    (unprocessed, applied)
}

#[derive(Default)]
struct RecordingAudit {
    events: Mutex<Vec<BulkEventKind>>,
}

impl IntervalAuditSink for RecordingAudit {
    fn record(&self, _event: &IntervalAuditEvent) {}

    fn record_bulk(&self, event: &BulkAuditEvent) {
        self.events.lock().unwrap().push(event.event);
    }
}

// ============================================================================
// SECTION: Chunking
// ============================================================================

#[test]
fn chunks_fill_to_the_batch_limit() {
    let sizes = |count: usize| -> Vec<usize> {
        plan_chunks(puts(count), 25).iter().map(Vec::len).collect()
    };
    assert_eq!(sizes(25), vec![25]);
    assert_eq!(sizes(26), vec![25, 1]);
    assert_eq!(sizes(60), vec![25, 25, 10]);
    assert!(sizes(0).is_empty());
}

#[test]
fn chunks_split_before_a_repeated_key() {
    let chunks = plan_chunks(
        vec![put("123", "a"), put("123", "b"), delete("123", "a"), put("123", "c")],
        25,
    );
    let keys: Vec<Vec<&str>> = chunks
        .iter()
        .map(|chunk| chunk.iter().map(|op| op.key().sort_key.as_str()).collect())
        .collect();
    assert_eq!(keys, vec![vec!["a", "b"], vec!["a", "c"]]);
    assert_eq!(chunks[1][0].kind(), "delete");
}

#[test]
fn batch_size_is_clamped_to_the_store_limit() {
    let store = Arc::new(InMemoryKeyValueStore::new().with_max_batch_items(10));
    let mutator = BulkMutator::new(store, RetryPolicy::default());
    assert_eq!(mutator.batch_size(), 10);
    assert_eq!(mutator.with_batch_size(100).batch_size(), 10);
}

// ============================================================================
// SECTION: Backoff
// ============================================================================

#[test]
fn backoff_ceiling_doubles_until_capped() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.backoff_ceiling(0), Duration::from_millis(50));
    assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(100));
    assert_eq!(policy.backoff_ceiling(4), Duration::from_millis(800));
    assert_eq!(policy.backoff_ceiling(10), Duration::from_secs(5));
    assert_eq!(policy.backoff_ceiling(u32::MAX), Duration::from_secs(5));
}

#[test]
fn jittered_delay_stays_within_ceiling() {
    let policy = RetryPolicy::default();
    for retry in 0 .. 8 {
        for _ in 0 .. 32 {
            assert!(policy.jittered_delay(retry) <= policy.backoff_ceiling(retry));
        }
    }
}

// ============================================================================
// SECTION: Convergence
// ============================================================================

#[tokio::test]
async fn unprocessed_subsets_are_resubmitted_until_applied() {
    let memory = InMemoryKeyValueStore::new();
    let store = TestStore::new(memory.clone(), BatchBehavior::Halving(AtomicUsize::new(6)));
    let audit = Arc::new(RecordingAudit::default());
    let mutator = BulkMutator::new(store, fast_policy()).with_audit(audit.clone());

    let report = mutator.apply_batch(&CallContext::background(), puts(60)).await.unwrap();

    assert_eq!(report.applied, 60);
    assert_eq!(report.chunks, 3);
    assert!(report.attempts > 3);
    assert!(report.consumed >= CapacityUnits::new(60.0));
    assert_eq!(memory.len().unwrap(), 60);
    let events = audit.events.lock().unwrap();
    assert!(events.contains(&BulkEventKind::ChunkRetry));
    assert_eq!(events.last(), Some(&BulkEventKind::BatchComplete));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn random_unprocessed_subsets_below_the_ceiling_converge(
        count in 1_usize ..= 60,
        flaky in 0_usize .. 8,
        seed in any::<u64>(),
    ) {
        let runtime =
            tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        let memory = InMemoryKeyValueStore::new();
        let store = TestStore::new(memory.clone(), BatchBehavior::RandomSubsets {
            flaky_calls: AtomicUsize::new(flaky),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        });
        let policy = RetryPolicy {
            max_attempts: 8,
            ..fast_policy()
        };
        let mutator = BulkMutator::new(store.clone(), policy);
        let operations = puts(count);
        let expected: BTreeSet<RecordKey> =
            operations.iter().map(|operation| operation.key().clone()).collect();

        let report = runtime
            .block_on(mutator.apply_batch(&CallContext::background(), operations))
            .unwrap();

        prop_assert_eq!(report.applied, count);
        prop_assert_eq!(store.calls(), count.div_ceil(25) + flaky);
        let stored: BTreeSet<RecordKey> = expected
            .iter()
            .filter(|key| memory.contains(key).unwrap())
            .cloned()
            .collect();
        prop_assert_eq!(&stored, &expected);
        prop_assert_eq!(memory.len().unwrap(), count);
    }
}

#[tokio::test]
async fn bulk_delete_removes_previously_written_items() {
    let memory = InMemoryKeyValueStore::new();
    let mutator = BulkMutator::new(Arc::new(memory.clone()), fast_policy());
    let ctx = CallContext::background();
    let operations: Vec<WriteOperation> = (125 ..= 129)
        .flat_map(|owner| {
            ["20240820", "20240822", "20240825", "20240827", "20240828"]
                .map(|day| put(&owner.to_string(), &format!("{day}#bills#groupid1")))
        })
        .collect();
    let deletes: Vec<WriteOperation> = operations
        .iter()
        .map(|op| WriteOperation::Delete {
            key: op.key().clone(),
        })
        .collect();

    let written = mutator.apply_batch(&ctx, operations).await.unwrap();
    assert_eq!(written.applied, 25);
    assert_eq!(written.chunks, 1);
    assert_eq!(memory.len().unwrap(), 25);

    let removed = mutator.apply_batch(&ctx, deletes).await.unwrap();
    assert_eq!(removed.applied, 25);
    assert!(memory.is_empty().unwrap());
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let mutator = BulkMutator::new(Arc::new(InMemoryKeyValueStore::new()), fast_policy());
    let report = mutator.apply_batch(&CallContext::background(), Vec::new()).await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.consumed, CapacityUnits::ZERO);
}

#[tokio::test]
async fn throttled_calls_are_retried() {
    let memory = InMemoryKeyValueStore::new();
    let store = TestStore::new(
        memory.clone(),
        BatchBehavior::Scripted(Mutex::new(vec![
            StoreError::Throttled("slow down".to_string()),
            StoreError::Unavailable("connection reset".to_string()),
        ])),
    );
    let mutator = BulkMutator::new(store, fast_policy());

    let report = mutator.apply_batch(&CallContext::background(), puts(5)).await.unwrap();

    assert_eq!(report.applied, 5);
    assert_eq!(report.attempts, 3);
    assert_eq!(memory.len().unwrap(), 5);
}

// ============================================================================
// SECTION: Bounded Termination
// ============================================================================

#[tokio::test]
async fn stalled_store_stops_at_the_attempt_ceiling() {
    let store = TestStore::new(InMemoryKeyValueStore::new(), BatchBehavior::Stalled);
    let policy = RetryPolicy {
        max_attempts: 3,
        ..fast_policy()
    };
    let mutator = BulkMutator::new(store.clone(), policy);
    let operations = puts(30);

    let err = mutator.apply_batch(&CallContext::background(), operations.clone()).await.unwrap_err();
    let incomplete = incomplete(err);

    assert_eq!(incomplete.reason, IncompleteReason::RetryCeiling);
    assert_eq!(incomplete.applied, 0);
    assert_eq!(incomplete.residual, operations);
    assert_eq!(store.calls(), 6);
    assert!(incomplete.chunks.iter().all(|chunk| {
        chunk.status == ChunkStatus::Partial && chunk.attempts == 3
    }));
}

#[tokio::test]
async fn budget_bounds_a_stalled_batch() {
    let store = TestStore::new(InMemoryKeyValueStore::new(), BatchBehavior::Stalled);
    let policy = RetryPolicy {
        max_attempts: u32::MAX,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        budget: Duration::from_millis(100),
        ..fast_policy()
    };
    let mutator = BulkMutator::new(store, policy);

    let started = tokio::time::Instant::now();
    let err = mutator.apply_batch(&CallContext::background(), puts(10)).await.unwrap_err();

    assert_eq!(incomplete(err).reason, IncompleteReason::DeadlineExceeded);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn caller_deadline_bounds_a_stalled_batch() {
    let store = TestStore::new(InMemoryKeyValueStore::new(), BatchBehavior::Stalled);
    let policy = RetryPolicy {
        max_attempts: u32::MAX,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(10),
        ..fast_policy()
    };
    let mutator = BulkMutator::new(store, policy);
    let ctx = CallContext::with_timeout(Duration::from_millis(80));

    let err = mutator.apply_batch(&ctx, puts(10)).await.unwrap_err();
    let incomplete = incomplete(err);

    assert_eq!(incomplete.reason, IncompleteReason::DeadlineExceeded);
    assert_eq!(incomplete.residual.len(), 10);
}

#[tokio::test]
async fn cancellation_stops_in_flight_and_queued_chunks() {
    let store = TestStore::new(InMemoryKeyValueStore::new(), BatchBehavior::Hanging);
    let policy = RetryPolicy {
        max_in_flight: 1,
        call_timeout: None,
        ..fast_policy()
    };
    let mutator = BulkMutator::new(store, policy);
    let (handle, signal) = cancel_pair();
    let ctx = CallContext::background().cancelled_by(signal);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let err = mutator.apply_batch(&ctx, puts(60)).await.unwrap_err();
    let incomplete = incomplete(err);

    assert_eq!(incomplete.reason, IncompleteReason::Cancelled);
    assert_eq!(incomplete.residual.len(), 60);
    let statuses: Vec<ChunkStatus> = incomplete.chunks.iter().map(|chunk| chunk.status).collect();
    assert_eq!(statuses, vec![
        ChunkStatus::Unknown,
        ChunkStatus::NotSubmitted,
        ChunkStatus::NotSubmitted,
    ]);
}

#[tokio::test]
async fn cancellation_during_backoff_keeps_confirmed_progress() {
    let memory = InMemoryKeyValueStore::new();
    let store = TestStore::new(memory.clone(), BatchBehavior::Halving(AtomicUsize::new(1_000)));
    let policy = RetryPolicy {
        base_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(10),
        budget: Duration::from_secs(60),
        max_in_flight: 1,
        ..fast_policy()
    };
    let mutator = BulkMutator::new(store, policy);
    let (handle, signal) = cancel_pair();
    let ctx = CallContext::background().cancelled_by(signal);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let err = mutator.apply_batch(&ctx, puts(8)).await.unwrap_err();
    let incomplete = incomplete(err);

    assert_eq!(incomplete.reason, IncompleteReason::Cancelled);
    assert_eq!(incomplete.chunks[0].status, ChunkStatus::Partial);
    assert!(incomplete.applied >= 4);
    assert_eq!(incomplete.chunks[0].applied, incomplete.applied);
    assert_eq!(incomplete.residual.len(), 8 - incomplete.applied);
    assert!(incomplete.consumed >= CapacityUnits::new(4.0));
    assert_eq!(memory.len().unwrap(), incomplete.applied);
}

#[tokio::test]
async fn cancelled_before_start_submits_nothing() {
    let store = TestStore::new(InMemoryKeyValueStore::new(), BatchBehavior::Stalled);
    let mutator = BulkMutator::new(store.clone(), fast_policy());
    let (handle, signal) = cancel_pair();
    handle.cancel();

    let err = mutator
        .apply_batch(&CallContext::background().cancelled_by(signal), puts(30))
        .await
        .unwrap_err();
    let incomplete = incomplete(err);

    assert_eq!(incomplete.reason, IncompleteReason::Cancelled);
    assert_eq!(store.calls(), 0);
    assert!(incomplete.chunks.iter().all(|chunk| chunk.status == ChunkStatus::NotSubmitted));
}

#[tokio::test]
async fn store_rejection_is_not_retried() {
    let store = TestStore::new(
        InMemoryKeyValueStore::new(),
        BatchBehavior::Scripted(Mutex::new(vec![StoreError::Invalid(
            "item exceeds size limit".to_string(),
        )])),
    );
    let policy = RetryPolicy {
        max_in_flight: 1,
        ..fast_policy()
    };
    let mutator = BulkMutator::new(store, policy).with_batch_size(5);

    let err = mutator.apply_batch(&CallContext::background(), puts(10)).await.unwrap_err();
    let incomplete = incomplete(err);

    assert!(matches!(&incomplete.reason, IncompleteReason::Rejected(reason) if reason.contains("size limit")));
    assert_eq!(incomplete.chunks[0].status, ChunkStatus::Unknown);
    assert_eq!(incomplete.chunks[0].attempts, 1);
    assert_eq!(incomplete.chunks[1].status, ChunkStatus::Applied);
    assert_eq!(incomplete.applied, 5);
    assert_eq!(incomplete.residual_keys().len(), 5);
}
