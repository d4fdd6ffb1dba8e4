// crates/interval-store-core/src/runtime/interval_store.rs
// ============================================================================
// Module: Interval Store
// Description: Point operations and containment queries over interval records.
// Purpose: Encode "interval contains instant" as a sort-key range plus filter.
// Dependencies: crate::{core, interfaces}, serde, time
// ============================================================================

//! ## Overview
//! The store cannot test range overlap natively. A containment query is
//! answered with the two predicates it does support:
//!
//! - the sort key (chronological start) is strictly below an upper bound
//!   derived from the query instant, and
//! - the numeric end attribute passes a threshold post-filter.
//!
//! Pages are followed until the store stops returning continuation tokens or
//! the configured page limit is hit. When the backend cannot filter
//! server-side, the same predicate is applied to each page here.
//!
//! [`IntervalStore`] is a stateless facade: every call goes to the backend
//! and nothing is cached.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use serde::Serialize;
use time::OffsetDateTime;

use crate::audit::IntervalAuditEvent;
use crate::audit::IntervalAuditEventParams;
use crate::audit::IntervalAuditSink;
use crate::audit::NoopAuditSink;
use crate::core::Boundary;
use crate::core::CapacityUnits;
use crate::core::ContainmentPolicy;
use crate::core::IntervalRecord;
use crate::core::OwnerId;
use crate::core::RecordKey;
use crate::core::SortKey;
use crate::core::SortKeyCodec;
use crate::interfaces::FilterOperator;
use crate::interfaces::KeyOperator;
use crate::interfaces::KeyValueStore;
use crate::interfaces::PostFilter;
use crate::interfaces::QueryRequest;
use crate::interfaces::SortKeyCondition;
use crate::interfaces::StoreItem;
use crate::runtime::context::CallContext;
use crate::runtime::context::CallFailure;
use crate::runtime::context::guarded;
use crate::runtime::error::IntervalStoreError;
use crate::runtime::schema::AttributeSchema;
use crate::telemetry::CallOutcome;
use crate::telemetry::NoopMetrics;
use crate::telemetry::StoreMetricEvent;
use crate::telemetry::StoreMetrics;
use crate::telemetry::StoreOperation;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default upper bound on pages fetched by one containment query.
pub const DEFAULT_MAX_QUERY_PAGES: usize = 1_000;
/// Default timeout applied to each store call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalStoreConfig {
    /// Sort-key codec shared by writers and queries.
    pub codec: SortKeyCodec,
    /// Edge semantics for containment queries.
    pub policy: ContainmentPolicy,
    /// Non-key attribute names.
    pub schema: AttributeSchema,
    /// Timeout applied to each store call.
    pub call_timeout: Option<Duration>,
    /// Maximum pages fetched by one containment query.
    pub max_pages: usize,
    /// Page size hint passed to the store.
    pub page_limit: Option<usize>,
}

impl Default for IntervalStoreConfig {
    fn default() -> Self {
        Self {
            codec: SortKeyCodec::default(),
            policy: ContainmentPolicy::default(),
            schema: AttributeSchema::default(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            max_pages: DEFAULT_MAX_QUERY_PAGES,
            page_limit: None,
        }
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of a point read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetOutcome {
    /// Record when present.
    pub record: Option<IntervalRecord>,
    /// Consumed capacity.
    pub consumed: CapacityUnits,
}

/// Result of a containment query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutcome {
    /// Containing records in ascending sort-key order.
    pub records: Vec<IntervalRecord>,
    /// Consumed capacity across all pages.
    pub consumed: CapacityUnits,
    /// Pages fetched.
    pub pages: usize,
}

// ============================================================================
// SECTION: Interval Store
// ============================================================================

/// Facade over a [`KeyValueStore`] for interval records.
pub struct IntervalStore {
    /// Backend store.
    store: Arc<dyn KeyValueStore>,
    /// Store configuration.
    config: IntervalStoreConfig,
    /// Audit sink.
    audit: Arc<dyn IntervalAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn StoreMetrics>,
}

impl IntervalStore {
    /// Creates an interval store with no-op audit and metrics sinks.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: IntervalStoreConfig) -> Self {
        Self {
            store,
            config,
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
        }
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

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &IntervalStoreConfig {
        &self.config
    }

    /// Returns the sort-key codec.
    #[must_use]
    pub const fn codec(&self) -> &SortKeyCodec {
        &self.config.codec
    }

    /// Writes one record, overwriting any record with the same key.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalStoreError::Validation`] for malformed records and
    /// [`IntervalStoreError::StoreUnavailable`] or
    /// [`IntervalStoreError::Cancelled`] when the call does not complete.
    pub async fn put(
        &self,
        ctx: &CallContext,
        record: &IntervalRecord,
    ) -> Result<CapacityUnits, IntervalStoreError> {
        let started = Instant::now();
        let result = self.put_record(ctx, record).await;
        let summary = match &result {
            Ok(consumed) => CallSummary::succeeded(1, 0, *consumed),
            Err(err) => CallSummary::failed(err),
        };
        self.observe(StoreOperation::Put, &record.owner, Some(&record.sort_key), started, summary);
        result
    }

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalStoreError::Decode`] when the stored item is not a
    /// valid interval record, plus the errors of [`IntervalStore::put`].
    pub async fn get(
        &self,
        ctx: &CallContext,
        owner: &OwnerId,
        sort_key: &SortKey,
    ) -> Result<GetOutcome, IntervalStoreError> {
        let started = Instant::now();
        let key = RecordKey::new(owner.clone(), sort_key.clone());
        let result = self.get_record(ctx, &key).await;
        let summary = match &result {
            Ok(outcome) => {
                CallSummary::succeeded(usize::from(outcome.record.is_some()), 0, outcome.consumed)
            }
            Err(err) => CallSummary::failed(err),
        };
        self.observe(StoreOperation::Get, owner, Some(sort_key), started, summary);
        result
    }

    /// Deletes one record; deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`IntervalStore::put`].
    pub async fn delete(
        &self,
        ctx: &CallContext,
        owner: &OwnerId,
        sort_key: &SortKey,
    ) -> Result<CapacityUnits, IntervalStoreError> {
        let started = Instant::now();
        let key = RecordKey::new(owner.clone(), sort_key.clone());
        let result = self.delete_record(ctx, &key).await;
        let summary = match &result {
            Ok(consumed) => CallSummary::succeeded(0, 0, *consumed),
            Err(err) => CallSummary::failed(err),
        };
        self.observe(StoreOperation::Delete, owner, Some(sort_key), started, summary);
        result
    }

    /// Returns every record of `owner` whose interval contains `at`.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalStoreError::Format`] when `at` cannot be encoded,
    /// [`IntervalStoreError::Decode`] when any returned item does not decode,
    /// [`IntervalStoreError::LimitExceeded`] when more than the configured
    /// page count is needed, and store or cancellation errors otherwise.
    pub async fn query_containing(
        &self,
        ctx: &CallContext,
        owner: &OwnerId,
        at: OffsetDateTime,
    ) -> Result<QueryOutcome, IntervalStoreError> {
        let started = Instant::now();
        let result = self.scan_containing(ctx, owner, at).await;
        let summary = match &result {
            Ok(outcome) => {
                CallSummary::succeeded(outcome.records.len(), outcome.pages, outcome.consumed)
            }
            Err(err) => CallSummary::failed(err),
        };
        self.observe(StoreOperation::Query, owner, None, started, summary);
        result
    }

    /// Builds the key condition and post-filter for a containment query.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalStoreError::Format`] when `at` cannot be encoded.
    pub fn containment_predicates(
        &self,
        owner: &OwnerId,
        at: OffsetDateTime,
    ) -> Result<(SortKeyCondition, PostFilter), IntervalStoreError> {
        let policy = self.config.policy;
        let bound = self.config.codec.upper_bound(at, policy.start.is_inclusive()).map_err(
            |err| IntervalStoreError::Format {
                operation: StoreOperation::Query,
                key: owner.to_string(),
                reason: err.to_string(),
            },
        )?;
        let condition = SortKeyCondition {
            operator: KeyOperator::LessThan,
            bound: bound.into_inner(),
        };
        let operator = match policy.end {
            Boundary::Inclusive => FilterOperator::GreaterThanOrEqual,
            Boundary::Exclusive => FilterOperator::GreaterThan,
        };
        let filter = PostFilter {
            attribute: self.config.schema.end_attribute.clone(),
            operator,
            value: at.unix_timestamp(),
        };
        Ok((condition, filter))
    }

    // ------------------------------------------------------------------------
    // Operation bodies
    // ------------------------------------------------------------------------

    /// Validates and writes one record.
    async fn put_record(
        &self,
        ctx: &CallContext,
        record: &IntervalRecord,
    ) -> Result<CapacityUnits, IntervalStoreError> {
        let key = record.key();
        record.validate(&self.config.codec).map_err(|err| IntervalStoreError::Validation {
            operation: StoreOperation::Put,
            key: key.to_string(),
            reason: err.to_string(),
        })?;
        let item = self.config.schema.to_item(record);
        guarded(ctx, self.config.call_timeout, self.store.put_item(item)).await.map_err(
            |failure| call_failure(StoreOperation::Put, &key, failure, CapacityUnits::ZERO),
        )
    }

    /// Reads and decodes one record.
    async fn get_record(
        &self,
        ctx: &CallContext,
        key: &RecordKey,
    ) -> Result<GetOutcome, IntervalStoreError> {
        validate_key(StoreOperation::Get, key)?;
        let output = guarded(ctx, self.config.call_timeout, self.store.get_item(key))
            .await
            .map_err(|failure| {
                call_failure(StoreOperation::Get, key, failure, CapacityUnits::ZERO)
            })?;
        let record = output
            .item
            .map(|item| self.decode_item(StoreOperation::Get, item, output.consumed))
            .transpose()?;
        Ok(GetOutcome {
            record,
            consumed: output.consumed,
        })
    }

    /// Deletes one record.
    async fn delete_record(
        &self,
        ctx: &CallContext,
        key: &RecordKey,
    ) -> Result<CapacityUnits, IntervalStoreError> {
        validate_key(StoreOperation::Delete, key)?;
        guarded(ctx, self.config.call_timeout, self.store.delete_item(key)).await.map_err(
            |failure| call_failure(StoreOperation::Delete, key, failure, CapacityUnits::ZERO),
        )
    }

    /// Pages through the range scan and collects containing records.
    async fn scan_containing(
        &self,
        ctx: &CallContext,
        owner: &OwnerId,
        at: OffsetDateTime,
    ) -> Result<QueryOutcome, IntervalStoreError> {
        owner.validate().map_err(|err| IntervalStoreError::Validation {
            operation: StoreOperation::Query,
            key: owner.to_string(),
            reason: err.to_string(),
        })?;
        let (condition, filter) = self.containment_predicates(owner, at)?;
        let server_filter = self.store.supports_post_filter();
        let mut request = QueryRequest {
            partition: owner.as_str().to_string(),
            condition,
            filter: server_filter.then(|| filter.clone()),
            start_after: None,
            limit: self.config.page_limit,
        };
        let mut outcome = QueryOutcome {
            records: Vec::new(),
            consumed: CapacityUnits::ZERO,
            pages: 0,
        };
        loop {
            if outcome.pages >= self.config.max_pages {
                return Err(IntervalStoreError::LimitExceeded {
                    operation: StoreOperation::Query,
                    key: owner.to_string(),
                    max_pages: self.config.max_pages,
                    consumed: outcome.consumed,
                });
            }
            let page = guarded(ctx, self.config.call_timeout, self.store.query(&request))
                .await
                .map_err(|failure| match failure {
                    CallFailure::Store(source) => IntervalStoreError::StoreUnavailable {
                        operation: StoreOperation::Query,
                        key: owner.to_string(),
                        source,
                        consumed: outcome.consumed,
                    },
                    CallFailure::Cancelled => IntervalStoreError::Cancelled {
                        operation: StoreOperation::Query,
                        key: owner.to_string(),
                        consumed: outcome.consumed,
                    },
                })?;
            outcome.pages += 1;
            outcome.consumed += page.consumed;
            for item in page.items {
                if !server_filter && !filter.matches(&item.attributes) {
                    continue;
                }
                let record = self.decode_item(StoreOperation::Query, item, outcome.consumed)?;
                outcome.records.push(record);
            }
            match page.continuation {
                Some(token) => request.start_after = Some(token),
                None => return Ok(outcome),
            }
        }
    }

    /// Decodes one stored item, checking its sort key against the codec.
    fn decode_item(
        &self,
        operation: StoreOperation,
        item: StoreItem,
        consumed: CapacityUnits,
    ) -> Result<IntervalRecord, IntervalStoreError> {
        let key = item.key.to_string();
        let decode_error = |reason: String| IntervalStoreError::Decode {
            operation,
            key: key.clone(),
            reason,
            consumed,
        };
        self.config.codec.decode(&item.key.sort_key).map_err(|err| decode_error(err.to_string()))?;
        self.config.schema.to_record(item).map_err(decode_error)
    }

    /// Emits the audit event and latency metric for one public call.
    fn observe(
        &self,
        operation: StoreOperation,
        owner: &OwnerId,
        sort_key: Option<&SortKey>,
        started: Instant,
        summary: CallSummary,
    ) {
        let outcome = if summary.error_kind.is_some() { CallOutcome::Error } else { CallOutcome::Ok };
        self.metrics.record_call(
            StoreMetricEvent {
                operation,
                outcome,
                error_kind: summary.error_kind,
            },
            started.elapsed(),
        );
        self.audit.record(&IntervalAuditEvent::new(IntervalAuditEventParams {
            operation,
            owner: owner.to_string(),
            sort_key: sort_key.map(ToString::to_string),
            outcome,
            error_kind: summary.error_kind,
            items: summary.items,
            pages: summary.pages,
            consumed: summary.consumed,
        }));
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Observable totals of one public call.
struct CallSummary {
    /// Records returned or written.
    items: usize,
    /// Query pages fetched.
    pages: usize,
    /// Consumed capacity.
    consumed: CapacityUnits,
    /// Error kind label when the call failed.
    error_kind: Option<&'static str>,
}

impl CallSummary {
    /// Summary of a successful call.
    const fn succeeded(items: usize, pages: usize, consumed: CapacityUnits) -> Self {
        Self {
            items,
            pages,
            consumed,
            error_kind: None,
        }
    }

    /// Summary of a failed call.
    fn failed(err: &IntervalStoreError) -> Self {
        Self {
            items: 0,
            pages: 0,
            consumed: err.consumed(),
            error_kind: Some(err.kind()),
        }
    }
}

/// Validates key limits for point operations.
fn validate_key(operation: StoreOperation, key: &RecordKey) -> Result<(), IntervalStoreError> {
    key.validate().map_err(|err| IntervalStoreError::Validation {
        operation,
        key: key.to_string(),
        reason: err.to_string(),
    })
}

/// Maps a guarded call failure onto the runtime error taxonomy.
fn call_failure(
    operation: StoreOperation,
    key: &RecordKey,
    failure: CallFailure,
    consumed: CapacityUnits,
) -> IntervalStoreError {
    match failure {
        CallFailure::Store(source) => IntervalStoreError::StoreUnavailable {
            operation,
            key: key.to_string(),
            source,
            consumed,
        },
        CallFailure::Cancelled => IntervalStoreError::Cancelled {
            operation,
            key: key.to_string(),
            consumed,
        },
    }
}
