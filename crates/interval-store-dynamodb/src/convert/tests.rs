// crates/interval-store-dynamodb/src/convert/tests.rs
// ============================================================================
// Module: DynamoDB Conversion Unit Tests
// Description: Unit tests for item, request, and expression mapping.
// Purpose: Pin the wire shapes sent to DynamoDB without a live table.
// ============================================================================

#![allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]

use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use aws_sdk_dynamodb::types::ConsumedCapacity;
use interval_store_core::AttributeValue;
use interval_store_core::Attributes;
use interval_store_core::CapacityUnits;
use interval_store_core::FilterOperator;
use interval_store_core::KeyOperator;
use interval_store_core::OwnerId;
use interval_store_core::PostFilter;
use interval_store_core::QueryRequest;
use interval_store_core::RecordKey;
use interval_store_core::SortKey;
use interval_store_core::SortKeyCondition;
use interval_store_core::StoreError;
use interval_store_core::StoreItem;
use interval_store_core::WriteOperation;

use super::KeySchema;
use super::capacity;
use super::classify_error_code;
use super::from_dynamo;

fn record_key() -> RecordKey {
    RecordKey::new(OwnerId::new("123"), SortKey::new("20240820#bills#groupid1"))
}

fn store_item() -> StoreItem {
    let mut attributes = Attributes::new();
    attributes.insert("LastDay".to_string(), AttributeValue::Number(1_724_641_200));
    attributes.insert("Data".to_string(), AttributeValue::String("XYZ".to_string()));
    StoreItem {
        key: record_key(),
        attributes,
    }
}

#[test]
fn item_flattens_key_beside_attributes() {
    let map = KeySchema::default().item_to_map(store_item()).expect("map");
    assert_eq!(map.get("UserID"), Some(&DynamoValue::S("123".to_string())));
    assert_eq!(
        map.get("FirstDay"),
        Some(&DynamoValue::S("20240820#bills#groupid1".to_string()))
    );
    assert_eq!(map.get("LastDay"), Some(&DynamoValue::N("1724641200".to_string())));
    assert_eq!(map.get("Data"), Some(&DynamoValue::S("XYZ".to_string())));
}

#[test]
fn item_round_trips_through_a_dynamo_map() {
    let keys = KeySchema::default();
    let mut item = store_item();
    item.attributes.insert("Blob".to_string(), AttributeValue::Binary(vec![0, 255]));
    let map = keys.item_to_map(item.clone()).expect("map");
    assert_eq!(keys.map_to_item(map).expect("item"), item);
}

#[test]
fn attribute_colliding_with_a_key_is_rejected() {
    let mut item = store_item();
    item.attributes.insert("UserID".to_string(), AttributeValue::String("999".to_string()));
    let err = KeySchema::default().item_to_map(item).expect_err("collision");
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn non_integer_numbers_are_rejected() {
    let err = from_dynamo("LastDay", DynamoValue::N("1.5".to_string())).expect_err("decimal");
    assert!(err.to_string().contains("LastDay"));
    let err = from_dynamo("Flag", DynamoValue::Bool(true)).expect_err("bool");
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[test]
fn custom_key_names_are_honored() {
    let keys = KeySchema {
        partition_key: "pk".to_string(),
        sort_key: "sk".to_string(),
    };
    let map = keys.key_map(&record_key());
    assert_eq!(map.len(), 2);
    assert_eq!(keys.record_key(&map).expect("key"), record_key());
    assert!(KeySchema::default().record_key(&map).is_err());
}

#[test]
fn write_requests_round_trip_for_unprocessed_items() {
    let keys = KeySchema::default();
    for operation in [
        WriteOperation::Put {
            item: store_item(),
        },
        WriteOperation::Delete {
            key: record_key(),
        },
    ] {
        let request = keys.write_request(operation.clone()).expect("request");
        assert_eq!(keys.write_operation(&request).expect("operation"), operation);
    }
}

#[test]
fn query_expression_uses_placeholders() {
    let request = QueryRequest {
        partition: "123".to_string(),
        condition: SortKeyCondition {
            operator: KeyOperator::LessThan,
            bound: "20240828".to_string(),
        },
        filter: Some(PostFilter {
            attribute: "LastDay".to_string(),
            operator: FilterOperator::GreaterThan,
            value: 1_724_727_600,
        }),
        start_after: None,
        limit: None,
    };
    let expression = KeySchema::default().query_expression(&request);
    assert_eq!(expression.key_condition, "#pk = :pk AND #sk < :sk");
    assert_eq!(expression.filter.as_deref(), Some("#flt > :flt"));
    assert_eq!(expression.names.get("#sk").map(String::as_str), Some("FirstDay"));
    assert_eq!(expression.names.get("#flt").map(String::as_str), Some("LastDay"));
    assert_eq!(expression.values.get(":sk"), Some(&DynamoValue::S("20240828".to_string())));
    assert_eq!(expression.values.get(":flt"), Some(&DynamoValue::N("1724727600".to_string())));
}

#[test]
fn query_expression_without_filter_binds_only_keys() {
    let request = QueryRequest {
        partition: "123".to_string(),
        condition: SortKeyCondition {
            operator: KeyOperator::LessThanOrEqual,
            bound: "20240827".to_string(),
        },
        filter: None,
        start_after: None,
        limit: Some(10),
    };
    let expression = KeySchema::default().query_expression(&request);
    assert_eq!(expression.key_condition, "#pk = :pk AND #sk <= :sk");
    assert!(expression.filter.is_none());
    assert_eq!(expression.names.len(), 2);
    assert_eq!(expression.values.len(), 2);
}

#[test]
fn error_codes_map_to_store_errors() {
    let throttled = classify_error_code(Some("ProvisionedThroughputExceededException"), "slow");
    assert!(matches!(throttled, StoreError::Throttled(_)));
    assert!(throttled.is_retryable());

    let invalid = classify_error_code(Some("ValidationException"), "bad key");
    assert!(matches!(invalid, StoreError::Invalid(_)));
    assert!(!invalid.is_retryable());

    let unknown = classify_error_code(None, "boom");
    assert!(matches!(unknown, StoreError::Unavailable(ref message) if message.contains("boom")));
}

#[test]
fn consumed_capacity_is_summed() {
    let reported = [
        ConsumedCapacity::builder().capacity_units(1.0).build(),
        ConsumedCapacity::builder().build(),
        ConsumedCapacity::builder().capacity_units(2.5).build(),
    ];
    assert_eq!(capacity(&reported), CapacityUnits::new(3.5));
    assert_eq!(capacity(Option::<&ConsumedCapacity>::None), CapacityUnits::ZERO);
}
