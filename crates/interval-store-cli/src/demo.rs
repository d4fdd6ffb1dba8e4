// crates/interval-store-cli/src/demo.rs
// ============================================================================
// Module: Demo Scenario
// Description: Fixed put / query / delete walkthrough over the interval store.
// Purpose: Exercise every store operation end to end against any backend.
// Dependencies: interval-store-core, serde, thiserror, time
// ============================================================================

//! ## Overview
//! Replays the reference walkthrough: single puts for owners `123` and `124`,
//! a 25-record bulk put for owners `125` through `129`, a containment query
//! for owner `123` on 2024-08-27, one single delete, and a bulk delete of the
//! bulk-put keys. Each record covers whole days: its end is the start of the
//! day after its last day, which is also its TTL instant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use interval_store_core::BatchReport;
use interval_store_core::BulkMutator;
use interval_store_core::CallContext;
use interval_store_core::CapacityUnits;
use interval_store_core::IntervalRecord;
use interval_store_core::IntervalStore;
use interval_store_core::IntervalStoreError;
use interval_store_core::IntervalTag;
use interval_store_core::OwnerId;
use interval_store_core::Payload;
use interval_store_core::QueryOutcome;
use interval_store_core::SortKey;
use interval_store_core::SortKeyCodec;
use interval_store_core::WriteOperation;
use serde::Serialize;
use thiserror::Error;
use time::Date;
use time::Month;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Payload stored on every demo record.
pub const DEMO_PAYLOAD: &str = "XYZ";
/// Owner queried by the demo.
pub const QUERY_OWNER: &str = "123";
/// Owner of the record removed by the single delete.
pub const DELETE_OWNER: &str = "124";
/// Owners written by the bulk put.
pub const BULK_OWNERS: [&str; 5] = ["125", "126", "127", "128", "129"];

/// `(owner, tag, first day, last day)` as `(month, day)` pairs in 2024.
const SINGLE_PUTS: [(&str, &str, (Month, u8), (Month, u8)); 8] = [
    ("123", "bills#groupid1", (Month::August, 20), (Month::August, 25)),
    ("123", "bills#groupid1", (Month::August, 22), (Month::August, 27)),
    ("123", "bills#groupid1", (Month::August, 25), (Month::August, 30)),
    ("123", "bills#groupid1", (Month::August, 27), (Month::September, 1)),
    ("123", "bills#groupid1", (Month::August, 28), (Month::September, 4)),
    ("123", "bills#groupid1", (Month::August, 29), (Month::September, 5)),
    ("124", "bills#groupid2", (Month::August, 26), (Month::August, 28)),
    ("124", "bills#groupid2", (Month::August, 27), (Month::August, 29)),
];

/// Intervals written for every bulk owner.
const BULK_INTERVALS: [((Month, u8), (Month, u8)); 5] = [
    ((Month::August, 20), (Month::August, 25)),
    ((Month::August, 22), (Month::August, 27)),
    ((Month::August, 25), (Month::August, 30)),
    ((Month::August, 27), (Month::September, 1)),
    ((Month::August, 28), (Month::September, 4)),
];

/// Tag on every bulk record.
const BULK_TAG: &str = "bills#groupid1";
/// Year of every demo date.
const DEMO_YEAR: i32 = 2024;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Capacity report for a sequence of single-item calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleCallsReport {
    /// Calls made.
    pub calls: usize,
    /// Consumed capacity across all calls.
    pub consumed: CapacityUnits,
}

/// Outcome of the demo walkthrough.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemoReport {
    /// Single puts.
    pub puts: SingleCallsReport,
    /// Bulk put.
    pub bulk_put: BatchReport,
    /// Containment query for owner `123` on 2024-08-27.
    pub query: QueryOutcome,
    /// Single delete.
    pub delete: SingleCallsReport,
    /// Bulk delete.
    pub bulk_delete: BatchReport,
}

/// Demo failures.
#[derive(Debug, Error)]
pub enum DemoError {
    /// A fixture could not be built with the configured codec.
    #[error("demo fixture rejected: {0}")]
    Fixture(String),
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] IntervalStoreError),
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// Builds a 2024 calendar date.
fn demo_date((month, day): (Month, u8)) -> Result<Date, DemoError> {
    Date::from_calendar_date(DEMO_YEAR, month, day)
        .map_err(|err| DemoError::Fixture(err.to_string()))
}

/// Builds one whole-day record.
fn day_record(
    owner: &str,
    tag: &str,
    first: (Month, u8),
    last: (Month, u8),
    codec: &SortKeyCodec,
) -> Result<IntervalRecord, DemoError> {
    let tag = IntervalTag::new(tag).map_err(|err| DemoError::Fixture(err.to_string()))?;
    let start = codec.day_start(demo_date(first)?);
    let end =
        codec.end_of_day(demo_date(last)?).map_err(|err| DemoError::Fixture(err.to_string()))?;
    IntervalRecord::new(
        OwnerId::new(owner),
        start,
        Some(&tag),
        end,
        Payload::Text(DEMO_PAYLOAD.to_string()),
        codec,
    )
    .map_err(|err| DemoError::Fixture(err.to_string()))
}

/// Records written one at a time.
///
/// # Errors
///
/// Returns [`DemoError::Fixture`] when the codec cannot encode a fixture.
pub fn single_put_records(codec: &SortKeyCodec) -> Result<Vec<IntervalRecord>, DemoError> {
    SINGLE_PUTS
        .iter()
        .map(|(owner, tag, first, last)| day_record(owner, tag, *first, *last, codec))
        .collect()
}

/// Records written by the bulk put, grouped by owner.
///
/// # Errors
///
/// Returns [`DemoError::Fixture`] when the codec cannot encode a fixture.
pub fn bulk_records(codec: &SortKeyCodec) -> Result<Vec<IntervalRecord>, DemoError> {
    BULK_OWNERS
        .iter()
        .flat_map(|owner| BULK_INTERVALS.iter().map(move |(first, last)| (owner, first, last)))
        .map(|(owner, first, last)| day_record(owner, BULK_TAG, *first, *last, codec))
        .collect()
}

/// Runs the walkthrough.
///
/// # Errors
///
/// Returns [`DemoError::Fixture`] when fixtures cannot be encoded and
/// [`DemoError::Store`] when any store operation fails.
pub async fn run_demo(
    store: &IntervalStore,
    bulk: &BulkMutator,
    ctx: &CallContext,
) -> Result<DemoReport, DemoError> {
    let codec = *store.codec();

    let singles = single_put_records(&codec)?;
    let mut puts = SingleCallsReport {
        calls: 0,
        consumed: CapacityUnits::ZERO,
    };
    for record in &singles {
        puts.consumed += store.put(ctx, record).await?;
        puts.calls += 1;
    }

    let bulk_items = bulk_records(&codec)?;
    let bulk_keys: Vec<_> = bulk_items.iter().map(IntervalRecord::key).collect();
    let schema = &store.config().schema;
    let operations = bulk_items
        .iter()
        .map(|record| WriteOperation::Put {
            item: schema.to_item(record),
        })
        .collect();
    let bulk_put = bulk.apply_batch(ctx, operations).await?;

    let query_day = demo_date((Month::August, 27))?;
    let query =
        store.query_containing(ctx, &OwnerId::new(QUERY_OWNER), codec.day_start(query_day)).await?;

    let delete_key = deleted_sort_key(&codec)?;
    let consumed = store.delete(ctx, &OwnerId::new(DELETE_OWNER), &delete_key).await?;
    let delete = SingleCallsReport {
        calls: 1,
        consumed,
    };

    let operations = bulk_keys
        .into_iter()
        .map(|key| WriteOperation::Delete {
            key,
        })
        .collect();
    let bulk_delete = bulk.apply_batch(ctx, operations).await?;

    Ok(DemoReport {
        puts,
        bulk_put,
        query,
        delete,
        bulk_delete,
    })
}

/// Tag of the record removed by the single delete.
fn deleted_tag() -> Result<IntervalTag, DemoError> {
    IntervalTag::new("bills#groupid2").map_err(|err| DemoError::Fixture(err.to_string()))
}

/// Sort key of the record removed by the single delete, for display.
///
/// # Errors
///
/// Returns [`DemoError::Fixture`] when the codec cannot encode the key.
pub fn deleted_sort_key(codec: &SortKeyCodec) -> Result<SortKey, DemoError> {
    let day = demo_date((Month::August, 27))?;
    codec
        .encode(codec.day_start(day), Some(&deleted_tag()?))
        .map_err(|err| DemoError::Fixture(err.to_string()))
}
