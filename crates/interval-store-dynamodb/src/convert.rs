// crates/interval-store-dynamodb/src/convert.rs
// ============================================================================
// Module: DynamoDB Conversions
// Description: Mapping between store contract types and DynamoDB wire types.
// Purpose: Keep request building and response parsing pure and testable.
// Dependencies: aws-sdk-dynamodb, interval-store-core
// ============================================================================

//! ## Overview
//! The store contract models items as a [`RecordKey`] plus an attribute map.
//! DynamoDB models them as one flat attribute map in which the table's key
//! attributes sit beside the others. [`KeySchema`] names those key attributes
//! and converts in both directions; query predicates become placeholder-based
//! key condition and filter expressions so attribute names never collide with
//! reserved words.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use aws_sdk_dynamodb::types::ConsumedCapacity;
use aws_sdk_dynamodb::types::DeleteRequest;
use aws_sdk_dynamodb::types::PutRequest;
use aws_sdk_dynamodb::types::WriteRequest;
use interval_store_core::AttributeValue;
use interval_store_core::Attributes;
use interval_store_core::CapacityUnits;
use interval_store_core::FilterOperator;
use interval_store_core::KeyOperator;
use interval_store_core::OwnerId;
use interval_store_core::QueryRequest;
use interval_store_core::RecordKey;
use interval_store_core::SortKey;
use interval_store_core::StoreError;
use interval_store_core::StoreItem;
use interval_store_core::WriteOperation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default partition key attribute name.
pub const DEFAULT_PARTITION_KEY: &str = "UserID";
/// Default sort key attribute name.
pub const DEFAULT_SORT_KEY: &str = "FirstDay";

/// Expression placeholder for the partition key name.
const PARTITION_NAME: &str = "#pk";
/// Expression placeholder for the sort key name.
const SORT_NAME: &str = "#sk";
/// Expression placeholder for the filtered attribute name.
const FILTER_NAME: &str = "#flt";
/// Expression placeholder for the partition key value.
const PARTITION_VALUE: &str = ":pk";
/// Expression placeholder for the sort key bound.
const SORT_VALUE: &str = ":sk";
/// Expression placeholder for the filter value.
const FILTER_VALUE: &str = ":flt";

/// DynamoDB error codes that signal throughput pressure.
const THROTTLING_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "LimitExceededException",
];

/// DynamoDB error codes that signal a malformed or unauthorized request.
const INVALID_CODES: &[&str] = &[
    "ValidationException",
    "ResourceNotFoundException",
    "ConditionalCheckFailedException",
    "ItemCollectionSizeLimitExceededException",
    "AccessDeniedException",
    "UnrecognizedClientException",
    "SerializationException",
];

/// A DynamoDB item or key map.
pub type DynamoItem = HashMap<String, DynamoValue>;

// ============================================================================
// SECTION: Key Schema
// ============================================================================

/// Names of the table's key attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition (hash) key attribute, holding the owner id.
    pub partition_key: String,
    /// Sort (range) key attribute, holding the encoded sort key.
    pub sort_key: String,
}

impl Default for KeySchema {
    fn default() -> Self {
        Self {
            partition_key: DEFAULT_PARTITION_KEY.to_string(),
            sort_key: DEFAULT_SORT_KEY.to_string(),
        }
    }
}

/// Key condition and filter for one query page.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    /// Key condition expression.
    pub key_condition: String,
    /// Filter expression, when the request carries a post-filter.
    pub filter: Option<String>,
    /// Placeholder to attribute-name bindings.
    pub names: HashMap<String, String>,
    /// Placeholder to value bindings.
    pub values: DynamoItem,
}

impl KeySchema {
    /// Builds the primary-key map for `key`.
    #[must_use]
    pub fn key_map(&self, key: &RecordKey) -> DynamoItem {
        HashMap::from([
            (self.partition_key.clone(), DynamoValue::S(key.owner.as_str().to_string())),
            (self.sort_key.clone(), DynamoValue::S(key.sort_key.as_str().to_string())),
        ])
    }

    /// Reads the primary key out of an item or key map.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when a key attribute is missing or not
    /// a string.
    pub fn record_key(&self, map: &DynamoItem) -> Result<RecordKey, StoreError> {
        let owner = string_attribute(map, &self.partition_key)?;
        let sort_key = string_attribute(map, &self.sort_key)?;
        Ok(RecordKey::new(OwnerId::new(owner), SortKey::new(sort_key)))
    }

    /// Flattens a store item into a DynamoDB item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when a non-key attribute reuses a key
    /// attribute name.
    pub fn item_to_map(&self, item: StoreItem) -> Result<DynamoItem, StoreError> {
        let StoreItem {
            key,
            attributes,
        } = item;
        let mut map = self.key_map(&key);
        for (name, value) in attributes {
            if map.contains_key(&name) {
                return Err(StoreError::Invalid(format!(
                    "attribute {name} collides with a table key attribute"
                )));
            }
            map.insert(name, to_dynamo(value));
        }
        Ok(map)
    }

    /// Splits a DynamoDB item into key and attributes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the key is missing or an attribute
    /// has a type outside the contract.
    pub fn map_to_item(&self, map: DynamoItem) -> Result<StoreItem, StoreError> {
        let key = self.record_key(&map)?;
        let mut attributes = Attributes::new();
        for (name, value) in map {
            if name == self.partition_key || name == self.sort_key {
                continue;
            }
            let value = from_dynamo(&name, value)?;
            attributes.insert(name, value);
        }
        Ok(StoreItem {
            key,
            attributes,
        })
    }

    /// Converts a contract write into a batch write request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the request cannot be built.
    pub fn write_request(&self, operation: WriteOperation) -> Result<WriteRequest, StoreError> {
        let request = match operation {
            WriteOperation::Put {
                item,
            } => {
                let put = PutRequest::builder()
                    .set_item(Some(self.item_to_map(item)?))
                    .build()
                    .map_err(build_error)?;
                WriteRequest::builder().put_request(put).build()
            }
            WriteOperation::Delete {
                key,
            } => {
                let delete = DeleteRequest::builder()
                    .set_key(Some(self.key_map(&key)))
                    .build()
                    .map_err(build_error)?;
                WriteRequest::builder().delete_request(delete).build()
            }
        };
        Ok(request)
    }

    /// Converts an unprocessed batch write request back into a contract write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the request is empty or malformed.
    pub fn write_operation(&self, request: &WriteRequest) -> Result<WriteOperation, StoreError> {
        if let Some(put) = request.put_request() {
            let item = self.map_to_item(put.item().clone())?;
            return Ok(WriteOperation::Put {
                item,
            });
        }
        if let Some(delete) = request.delete_request() {
            let key = self.record_key(delete.key())?;
            return Ok(WriteOperation::Delete {
                key,
            });
        }
        Err(StoreError::Invalid("unprocessed write request has no operation".to_string()))
    }

    /// Builds the key condition and filter expressions for a query page.
    #[must_use]
    pub fn query_expression(&self, request: &QueryRequest) -> QueryExpression {
        let key_operator = match request.condition.operator {
            KeyOperator::LessThan => "<",
            KeyOperator::LessThanOrEqual => "<=",
            KeyOperator::Equal => "=",
        };
        let mut names = HashMap::from([
            (PARTITION_NAME.to_string(), self.partition_key.clone()),
            (SORT_NAME.to_string(), self.sort_key.clone()),
        ]);
        let mut values = HashMap::from([
            (PARTITION_VALUE.to_string(), DynamoValue::S(request.partition.clone())),
            (SORT_VALUE.to_string(), DynamoValue::S(request.condition.bound.clone())),
        ]);
        let filter = request.filter.as_ref().map(|filter| {
            let operator = match filter.operator {
                FilterOperator::GreaterThanOrEqual => ">=",
                FilterOperator::GreaterThan => ">",
            };
            names.insert(FILTER_NAME.to_string(), filter.attribute.clone());
            values.insert(FILTER_VALUE.to_string(), DynamoValue::N(filter.value.to_string()));
            format!("{FILTER_NAME} {operator} {FILTER_VALUE}")
        });
        QueryExpression {
            key_condition: format!(
                "{PARTITION_NAME} = {PARTITION_VALUE} AND {SORT_NAME} {key_operator} {SORT_VALUE}"
            ),
            filter,
            names,
            values,
        }
    }
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// Converts a contract attribute into a DynamoDB attribute.
#[must_use]
pub fn to_dynamo(value: AttributeValue) -> DynamoValue {
    match value {
        AttributeValue::String(text) => DynamoValue::S(text),
        AttributeValue::Number(number) => DynamoValue::N(number.to_string()),
        AttributeValue::Binary(bytes) => DynamoValue::B(Blob::new(bytes)),
    }
}

/// Converts a DynamoDB attribute into a contract attribute.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] for non-integer numbers and attribute
/// types the contract does not model.
pub fn from_dynamo(name: &str, value: DynamoValue) -> Result<AttributeValue, StoreError> {
    match value {
        DynamoValue::S(text) => Ok(AttributeValue::String(text)),
        DynamoValue::N(number) => number.parse::<i64>().map(AttributeValue::Number).map_err(|_| {
            StoreError::Invalid(format!("attribute {name} is not a 64-bit integer"))
        }),
        DynamoValue::B(blob) => Ok(AttributeValue::Binary(blob.into_inner())),
        _ => Err(StoreError::Invalid(format!("attribute {name} has an unsupported type"))),
    }
}

/// Reads a string attribute.
fn string_attribute(map: &DynamoItem, name: &str) -> Result<String, StoreError> {
    map.get(name)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .ok_or_else(|| StoreError::Invalid(format!("key attribute {name} is missing or not a string")))
}

// ============================================================================
// SECTION: Capacity and Errors
// ============================================================================

/// Sums reported consumed capacity.
pub fn capacity<'a>(consumed: impl IntoIterator<Item = &'a ConsumedCapacity>) -> CapacityUnits {
    consumed
        .into_iter()
        .filter_map(ConsumedCapacity::capacity_units)
        .map(CapacityUnits::new)
        .sum()
}

/// Classifies a DynamoDB service error code.
#[must_use]
pub fn classify_error_code(code: Option<&str>, message: &str) -> StoreError {
    let label = code.unwrap_or("UnknownError");
    let detail = format!("{label}: {message}");
    match code {
        Some(code) if THROTTLING_CODES.contains(&code) => StoreError::Throttled(detail),
        Some(code) if INVALID_CODES.contains(&code) => StoreError::Invalid(detail),
        _ => StoreError::Unavailable(detail),
    }
}

/// Maps an SDK builder failure.
pub(crate) fn build_error(err: BuildError) -> StoreError {
    StoreError::Invalid(err.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
