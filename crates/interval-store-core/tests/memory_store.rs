// crates/interval-store-core/tests/memory_store.rs
// ============================================================================
// Module: In-Memory Store Contract Tests
// Description: Store contract behavior of the in-memory backend.
// Purpose: Pin batch validation, range scans, paging, and attribute mapping.
// Dependencies: interval-store-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Exercises [`InMemoryKeyValueStore`] directly through [`KeyValueStore`],
//! plus the attribute schema and filter helpers it relies on.

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

use interval_store_core::AttributeSchema;
use interval_store_core::AttributeValue;
use interval_store_core::Attributes;
use interval_store_core::CapacityUnits;
use interval_store_core::ContinuationToken;
use interval_store_core::FilterOperator;
use interval_store_core::InMemoryKeyValueStore;
use interval_store_core::IntervalRecord;
use interval_store_core::KeyOperator;
use interval_store_core::KeyValueStore;
use interval_store_core::OwnerId;
use interval_store_core::Payload;
use interval_store_core::PostFilter;
use interval_store_core::QueryRequest;
use interval_store_core::RecordKey;
use interval_store_core::SortKey;
use interval_store_core::SortKeyCondition;
use interval_store_core::StoreError;
use interval_store_core::StoreItem;
use interval_store_core::WriteOperation;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn item(owner: &str, sort_key: &str, end: i64) -> StoreItem {
    let mut attributes = Attributes::new();
    attributes.insert("LastDay".to_string(), AttributeValue::Number(end));
    attributes.insert("Data".to_string(), AttributeValue::String("XYZ".to_string()));
    StoreItem {
        key: RecordKey::new(OwnerId::new(owner), SortKey::new(sort_key)),
        attributes,
    }
}

fn put(owner: &str, sort_key: &str, end: i64) -> WriteOperation {
    WriteOperation::Put {
        item: item(owner, sort_key, end),
    }
}

fn below(bound: &str) -> QueryRequest {
    QueryRequest {
        partition: "123".to_string(),
        condition: SortKeyCondition {
            operator: KeyOperator::LessThan,
            bound: bound.to_string(),
        },
        filter: None,
        start_after: None,
        limit: None,
    }
}

async fn seeded() -> InMemoryKeyValueStore {
    let store = InMemoryKeyValueStore::new();
    let operations = vec![
        put("123", "20240820#a", 100),
        put("123", "20240822#a", 200),
        put("123", "20240825#a", 300),
        put("123", "20240828#a", 400),
        put("124", "20240821#a", 500),
    ];
    store.batch_write(operations).await.unwrap();
    store
}

fn token(sort_key: &str) -> ContinuationToken {
    ContinuationToken(RecordKey::new(OwnerId::new("123"), SortKey::new(sort_key)))
}

fn sort_keys(items: &[StoreItem]) -> Vec<&str> {
    items.iter().map(|item| item.key.sort_key.as_str()).collect()
}

// ============================================================================
// SECTION: Batch Writes
// ============================================================================

#[tokio::test]
async fn batch_write_rejects_empty_oversized_and_duplicate_batches() {
    let store = InMemoryKeyValueStore::new().with_max_batch_items(2);

    let empty = store.batch_write(Vec::new()).await.unwrap_err();
    assert!(matches!(empty, StoreError::Invalid(_)));

    let oversized = store
        .batch_write(vec![put("1", "a", 1), put("1", "b", 1), put("1", "c", 1)])
        .await
        .unwrap_err();
    assert!(matches!(oversized, StoreError::Invalid(_)));

    let duplicate = store
        .batch_write(vec![put("1", "a", 1), WriteOperation::Delete {
            key: RecordKey::new(OwnerId::new("1"), SortKey::new("a")),
        }])
        .await
        .unwrap_err();
    assert!(duplicate.to_string().contains("duplicate key 1/a"));
    assert!(!duplicate.is_retryable());
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn batch_write_charges_per_item() {
    let store = InMemoryKeyValueStore::new();
    let output = store
        .batch_write(vec![put("1", "a", 1), put("1", "b", 1), put("2", "a", 1)])
        .await
        .unwrap();
    assert!(output.unprocessed.is_empty());
    assert_eq!(output.consumed, CapacityUnits::new(3.0));
    assert_eq!(store.len().unwrap(), 3);
}

// ============================================================================
// SECTION: Range Scans
// ============================================================================

#[tokio::test]
async fn query_scans_one_partition_in_sort_key_order() {
    let store = seeded().await;
    let page = store.query(&below("20240826")).await.unwrap();
    assert_eq!(sort_keys(&page.items), vec!["20240820#a", "20240822#a", "20240825#a"]);
    assert!(page.continuation.is_none());
    assert_eq!(page.consumed, CapacityUnits::new(1.5));
}

#[tokio::test]
async fn key_operators_compare_lexicographically() {
    let store = seeded().await;
    let mut request = below("20240825#a");
    request.condition.operator = KeyOperator::LessThanOrEqual;
    let inclusive = store.query(&request).await.unwrap();
    assert_eq!(inclusive.items.len(), 3);

    request.condition.operator = KeyOperator::LessThan;
    let exclusive = store.query(&request).await.unwrap();
    assert_eq!(exclusive.items.len(), 2);
}

#[tokio::test]
async fn equal_operator_seeks_past_earlier_keys() {
    let store = seeded().await;
    let mut request = below("20240825#a");
    request.condition.operator = KeyOperator::Equal;
    let page = store.query(&request).await.unwrap();
    assert_eq!(sort_keys(&page.items), vec!["20240825#a"]);
    assert!(page.continuation.is_none());

    request.condition.bound = "20240823".to_string();
    let missing = store.query(&request).await.unwrap();
    assert!(missing.items.is_empty());
}

#[tokio::test]
async fn equal_operator_honors_the_continuation_token() {
    let store = seeded().await;
    let mut request = below("20240825#a");
    request.condition.operator = KeyOperator::Equal;

    request.start_after = Some(token("20240820#a"));
    let before = store.query(&request).await.unwrap();
    assert_eq!(sort_keys(&before.items), vec!["20240825#a"]);

    request.start_after = Some(token("20240825#a"));
    let after = store.query(&request).await.unwrap();
    assert!(after.items.is_empty());
}

#[tokio::test]
async fn post_filter_drops_items_after_evaluation() {
    let store = seeded().await;
    let mut request = below("20240829");
    request.filter = Some(PostFilter {
        attribute: "LastDay".to_string(),
        operator: FilterOperator::GreaterThan,
        value: 200,
    });
    let page = store.query(&request).await.unwrap();
    assert_eq!(sort_keys(&page.items), vec!["20240825#a", "20240828#a"]);
    assert_eq!(page.consumed, CapacityUnits::new(2.0));
}

#[tokio::test]
async fn pages_resume_after_the_continuation_token() {
    let store = seeded().await;
    let mut request = below("20240829");
    request.limit = Some(3);

    let first = store.query(&request).await.unwrap();
    assert_eq!(first.items.len(), 3);
    let token = first.continuation.unwrap();
    assert_eq!(token.0.sort_key.as_str(), "20240825#a");

    request.start_after = Some(token);
    let second = store.query(&request).await.unwrap();
    assert_eq!(sort_keys(&second.items), vec!["20240828#a"]);
    assert!(second.continuation.is_none());
}

#[tokio::test]
async fn missing_partition_returns_an_empty_page() {
    let store = seeded().await;
    let mut request = below("99999999");
    request.partition = "nobody".to_string();
    let page = store.query(&request).await.unwrap();
    assert!(page.items.is_empty());
    assert!(page.continuation.is_none());
    assert_eq!(page.consumed, CapacityUnits::new(0.5));
}

// ============================================================================
// SECTION: Attribute Mapping
// ============================================================================

#[test]
fn post_filter_requires_a_numeric_attribute() {
    let filter = PostFilter {
        attribute: "LastDay".to_string(),
        operator: FilterOperator::GreaterThanOrEqual,
        value: 10,
    };
    let mut attributes = Attributes::new();
    assert!(!filter.matches(&attributes));
    attributes.insert("LastDay".to_string(), AttributeValue::String("10".to_string()));
    assert!(!filter.matches(&attributes));
    attributes.insert("LastDay".to_string(), AttributeValue::Number(10));
    assert!(filter.matches(&attributes));
}

#[test]
fn schema_round_trips_binary_payloads() {
    let schema = AttributeSchema::default();
    let record = IntervalRecord {
        owner: OwnerId::new("123"),
        sort_key: SortKey::new("20240820#bills"),
        end_unix: 1_724_641_200,
        payload: Payload::Binary(vec![0, 1, 2]),
    };
    let item = schema.to_item(&record);
    assert_eq!(item.attributes.get("LastDay"), Some(&AttributeValue::Number(1_724_641_200)));
    assert_eq!(schema.to_record(item).unwrap(), record);
}

#[test]
fn schema_rejects_items_without_an_end_attribute() {
    let schema = AttributeSchema::default();
    let mut bad = item("123", "20240820", 1);
    bad.attributes.remove("LastDay");
    let reason = schema.to_record(bad).unwrap_err();
    assert!(reason.contains("LastDay"));
}

#[test]
fn write_operations_serialize_with_an_op_tag() {
    let value = serde_json::to_value(put("123", "20240820", 7)).unwrap();
    assert_eq!(value["op"], "put");
    assert_eq!(value["item"]["attributes"]["LastDay"]["type"], "number");
    assert_eq!(value["item"]["attributes"]["LastDay"]["value"], 7);
}
