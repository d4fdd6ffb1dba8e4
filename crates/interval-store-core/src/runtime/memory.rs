// crates/interval-store-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Key-Value Store
// Description: Ordered in-memory store for tests, demos, and local runs.
// Purpose: Implement the full store contract without external services.
// Dependencies: crate::interfaces, async-trait
// ============================================================================

//! ## Overview
//! [`InMemoryKeyValueStore`] keeps items in a partition map of sort-key
//! ordered maps. It mirrors the semantics callers rely on from a hosted
//! store: ordered range scans with an optional post-filter, page limits with
//! continuation tokens, duplicate-key rejection inside one batch, and passive
//! time-to-live expiry driven by an injectable [`StoreClock`].
//! It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use crate::core::CapacityUnits;
use crate::core::OwnerId;
use crate::core::RecordKey;
use crate::core::SortKey;
use crate::interfaces::AttributeValue;
use crate::interfaces::Attributes;
use crate::interfaces::BatchWriteOutput;
use crate::interfaces::ContinuationToken;
use crate::interfaces::DEFAULT_MAX_BATCH_ITEMS;
use crate::interfaces::GetItemOutput;
use crate::interfaces::KeyOperator;
use crate::interfaces::KeyValueStore;
use crate::interfaces::QueryPage;
use crate::interfaces::QueryRequest;
use crate::interfaces::StoreError;
use crate::interfaces::StoreItem;
use crate::interfaces::WriteOperation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Capacity units charged per item written or deleted.
const WRITE_UNITS_PER_ITEM: f64 = 1.0;
/// Capacity units charged per item read.
const READ_UNITS_PER_ITEM: f64 = 0.5;
/// Minimum capacity units charged per call.
const MIN_UNITS_PER_CALL: f64 = 0.5;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Wall-clock source for time-to-live evaluation.
pub trait StoreClock: Send + Sync {
    /// Returns the current time in unix seconds.
    fn now_unix(&self) -> i64;
}

/// System wall clock.
pub struct SystemClock;

impl StoreClock for SystemClock {
    fn now_unix(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct FixedClock {
    /// Current time in unix seconds.
    now: AtomicI64,
}

impl FixedClock {
    /// Creates a clock reading `now_unix`.
    #[must_use]
    pub const fn new(now_unix: i64) -> Self {
        Self {
            now: AtomicI64::new(now_unix),
        }
    }

    /// Moves the clock to `now_unix`.
    pub fn set(&self, now_unix: i64) {
        self.now.store(now_unix, Ordering::SeqCst);
    }
}

impl StoreClock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Partition map: owner -> sort key -> attributes.
type Partitions = BTreeMap<String, BTreeMap<String, Attributes>>;

/// In-memory key-value store for tests and examples.
#[derive(Clone)]
pub struct InMemoryKeyValueStore {
    /// Item map protected by a mutex.
    partitions: Arc<Mutex<Partitions>>,
    /// Numeric attribute interpreted as expiry, when enabled.
    ttl_attribute: Option<String>,
    /// Clock used for expiry.
    clock: Arc<dyn StoreClock>,
    /// Maximum items evaluated per query page.
    page_limit: Option<usize>,
    /// Maximum operations per batch write.
    max_batch_items: usize,
    /// Whether query post-filters are evaluated here.
    post_filter: bool,
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKeyValueStore {
    /// Creates an empty store without expiry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partitions: Arc::new(Mutex::new(BTreeMap::new())),
            ttl_attribute: None,
            clock: Arc::new(SystemClock),
            page_limit: None,
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            post_filter: true,
        }
    }

    /// Treats `attribute` as an expiry instant in unix seconds.
    #[must_use]
    pub fn with_ttl_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.ttl_attribute = Some(attribute.into());
        self
    }

    /// Replaces the expiry clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn StoreClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Caps the items evaluated per query page.
    #[must_use]
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = Some(page_limit.max(1));
        self
    }

    /// Sets the batch write limit.
    #[must_use]
    pub fn with_max_batch_items(mut self, max_batch_items: usize) -> Self {
        self.max_batch_items = max_batch_items.max(1);
        self
    }

    /// Disables server-side post-filters; queries return every key match.
    #[must_use]
    pub const fn without_post_filter(mut self) -> Self {
        self.post_filter = false;
        self
    }

    /// Returns the number of stored items, including expired ones not yet purged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.values().map(BTreeMap::len).sum())
    }

    /// Returns true when no items are stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Returns true when `key` is stored, ignoring expiry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store lock is poisoned.
    pub fn contains(&self, key: &RecordKey) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .get(key.owner.as_str())
            .is_some_and(|partition| partition.contains_key(key.sort_key.as_str())))
    }

    /// Removes every expired item and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the store lock is poisoned.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now_unix();
        let mut guard = self.lock()?;
        let mut removed = 0;
        for partition in guard.values_mut() {
            let before = partition.len();
            partition.retain(|_, attributes| !self.is_expired(attributes, now));
            removed += before - partition.len();
        }
        guard.retain(|_, partition| !partition.is_empty());
        drop(guard);
        Ok(removed)
    }

    /// Locks the item map.
    fn lock(&self) -> Result<MutexGuard<'_, Partitions>, StoreError> {
        self.partitions
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store mutex poisoned".to_string()))
    }

    /// Returns true when the item's expiry attribute is strictly in the past.
    fn is_expired(&self, attributes: &Attributes, now: i64) -> bool {
        self.ttl_attribute
            .as_ref()
            .and_then(|attribute| attributes.get(attribute))
            .and_then(AttributeValue::as_number)
            .is_some_and(|expires| expires < now)
    }

    /// Applies one write to the locked map.
    fn apply(partitions: &mut Partitions, operation: WriteOperation) {
        match operation {
            WriteOperation::Put {
                item,
            } => {
                let RecordKey {
                    owner,
                    sort_key,
                } = item.key;
                partitions
                    .entry(owner.as_str().to_string())
                    .or_default()
                    .insert(sort_key.into_inner(), item.attributes);
            }
            WriteOperation::Delete {
                key,
            } => {
                if let Some(partition) = partitions.get_mut(key.owner.as_str()) {
                    partition.remove(key.sort_key.as_str());
                    if partition.is_empty() {
                        partitions.remove(key.owner.as_str());
                    }
                }
            }
        }
    }
}

/// Returns the first key position a query scans from.
///
/// `Equal` seeks straight to its bound; the other operators scan from the
/// start of the partition. A continuation token past that point wins.
fn scan_start(request: &QueryRequest) -> Bound<String> {
    let after = request.start_after.as_ref().map(|token| token.0.sort_key.as_str());
    let bound = &request.condition.bound;
    match (request.condition.operator, after) {
        (KeyOperator::Equal, Some(after)) if after < bound.as_str() => {
            Bound::Included(bound.clone())
        }
        (KeyOperator::Equal, None) => Bound::Included(bound.clone()),
        (_, Some(after)) => Bound::Excluded(after.to_string()),
        (_, None) => Bound::Unbounded,
    }
}

/// Charges capacity for a call touching `items` items at `per_item` units.
fn charge(items: usize, per_item: f64) -> CapacityUnits {
    let items = u32::try_from(items).unwrap_or(u32::MAX);
    CapacityUnits::new((f64::from(items) * per_item).max(MIN_UNITS_PER_CALL))
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn put_item(&self, item: StoreItem) -> Result<CapacityUnits, StoreError> {
        let mut guard = self.lock()?;
        Self::apply(
            &mut guard,
            WriteOperation::Put {
                item,
            },
        );
        drop(guard);
        Ok(charge(1, WRITE_UNITS_PER_ITEM))
    }

    async fn get_item(&self, key: &RecordKey) -> Result<GetItemOutput, StoreError> {
        let now = self.clock.now_unix();
        let guard = self.lock()?;
        let item = guard
            .get(key.owner.as_str())
            .and_then(|partition| partition.get(key.sort_key.as_str()))
            .filter(|attributes| !self.is_expired(attributes, now))
            .map(|attributes| StoreItem {
                key: key.clone(),
                attributes: attributes.clone(),
            });
        drop(guard);
        Ok(GetItemOutput {
            item,
            consumed: charge(1, READ_UNITS_PER_ITEM),
        })
    }

    async fn delete_item(&self, key: &RecordKey) -> Result<CapacityUnits, StoreError> {
        let mut guard = self.lock()?;
        Self::apply(
            &mut guard,
            WriteOperation::Delete {
                key: key.clone(),
            },
        );
        drop(guard);
        Ok(charge(1, WRITE_UNITS_PER_ITEM))
    }

    async fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
    ) -> Result<BatchWriteOutput, StoreError> {
        if operations.is_empty() {
            return Err(StoreError::Invalid("batch write requires at least one operation".into()));
        }
        if operations.len() > self.max_batch_items {
            return Err(StoreError::Invalid(format!(
                "batch write exceeds {} operations: {}",
                self.max_batch_items,
                operations.len()
            )));
        }
        let mut seen = BTreeSet::new();
        let duplicate = operations.iter().map(WriteOperation::key).find(|key| !seen.insert(*key));
        if let Some(duplicate) = duplicate {
            return Err(StoreError::Invalid(format!(
                "batch write contains duplicate key {duplicate}"
            )));
        }
        let applied = operations.len();
        let mut guard = self.lock()?;
        for operation in operations {
            Self::apply(&mut guard, operation);
        }
        drop(guard);
        Ok(BatchWriteOutput {
            consumed: charge(applied, WRITE_UNITS_PER_ITEM),
            unprocessed: Vec::new(),
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError> {
        let now = self.clock.now_unix();
        let limit = match (request.limit, self.page_limit) {
            (Some(requested), Some(cap)) => requested.min(cap),
            (Some(limit), None) | (None, Some(limit)) => limit,
            (None, None) => usize::MAX,
        }
        .max(1);
        let lower = scan_start(request);
        let guard = self.lock()?;
        let mut evaluated = 0_usize;
        let mut items = Vec::new();
        let mut last_key: Option<String> = None;
        let mut more = false;
        if let Some(partition) = guard.get(&request.partition) {
            let candidates = partition
                .range::<String, _>((lower, Bound::Unbounded))
                .take_while(|(sort_key, _)| {
                    request.condition.operator.matches(sort_key, &request.condition.bound)
                });
            for (sort_key, attributes) in candidates {
                if evaluated == limit {
                    more = true;
                    break;
                }
                evaluated += 1;
                last_key = Some(sort_key.clone());
                if self.is_expired(attributes, now) {
                    continue;
                }
                if self.post_filter
                    && let Some(filter) = &request.filter
                    && !filter.matches(attributes)
                {
                    continue;
                }
                items.push(StoreItem {
                    key: RecordKey::new(
                        OwnerId::new(request.partition.clone()),
                        SortKey::new(sort_key.clone()),
                    ),
                    attributes: attributes.clone(),
                });
            }
        }
        drop(guard);
        let continuation = if more {
            last_key.map(|sort_key| {
                ContinuationToken(RecordKey::new(
                    OwnerId::new(request.partition.clone()),
                    SortKey::new(sort_key),
                ))
            })
        } else {
            None
        };
        Ok(QueryPage {
            items,
            consumed: charge(evaluated, READ_UNITS_PER_ITEM),
            continuation,
        })
    }

    fn max_batch_items(&self) -> usize {
        self.max_batch_items
    }

    fn supports_post_filter(&self) -> bool {
        self.post_filter
    }
}
