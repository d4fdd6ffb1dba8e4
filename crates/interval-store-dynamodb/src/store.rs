// crates/interval-store-dynamodb/src/store.rs
// ============================================================================
// Module: DynamoDB Store
// Description: DynamoDB-backed implementation of the key-value store contract.
// Purpose: Run interval records against a hosted or local DynamoDB table.
// Dependencies: aws-config, aws-sdk-dynamodb, aws-smithy-types, interval-store-core
// ============================================================================

//! ## Overview
//! [`DynamoDbStore`] issues one SDK call per contract call and always asks
//! for total consumed capacity. Batch writes report DynamoDB's unprocessed
//! items back as contract writes so the bulk mutator can resubmit them.
//! Throughput, timeout, and validation failures are classified into
//! [`StoreError`] variants; retrying is left to callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::ProvideErrorMetadata;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::AttributeDefinition;
use aws_sdk_dynamodb::types::BillingMode;
use aws_sdk_dynamodb::types::KeySchemaElement;
use aws_sdk_dynamodb::types::KeyType;
use aws_sdk_dynamodb::types::ReturnConsumedCapacity;
use aws_sdk_dynamodb::types::ScalarAttributeType;
use aws_sdk_dynamodb::types::TimeToLiveSpecification;
use aws_smithy_types::timeout::TimeoutConfig;
use interval_store_core::BatchWriteOutput;
use interval_store_core::CapacityUnits;
use interval_store_core::ContinuationToken;
use interval_store_core::GetItemOutput;
use interval_store_core::KeyValueStore;
use interval_store_core::QueryPage;
use interval_store_core::QueryRequest;
use interval_store_core::RecordKey;
use interval_store_core::StoreError;
use interval_store_core::StoreItem;
use interval_store_core::WriteOperation;

use crate::convert::KeySchema;
use crate::convert::build_error;
use crate::convert::capacity;
use crate::convert::classify_error_code;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for a DynamoDB-backed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbStoreConfig {
    /// Table name.
    pub table: String,
    /// Key attribute names.
    pub keys: KeySchema,
    /// AWS region (falls back to environment configuration).
    pub region: Option<String>,
    /// Custom endpoint URL, e.g. DynamoDB Local.
    pub endpoint: Option<String>,
    /// SDK operation timeout, including SDK-level retries.
    pub operation_timeout: Option<Duration>,
    /// Use strongly consistent reads for gets and queries.
    pub consistent_reads: bool,
}

impl DynamoDbStoreConfig {
    /// Creates a configuration for `table` with default key names.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            keys: KeySchema::default(),
            region: None,
            endpoint: None,
            operation_timeout: None,
            consistent_reads: true,
        }
    }

    /// Validates required fields.
    fn validate(&self) -> Result<(), StoreError> {
        if self.table.trim().is_empty() {
            return Err(StoreError::Invalid("table must be set".to_string()));
        }
        if self.keys.partition_key.is_empty() || self.keys.sort_key.is_empty() {
            return Err(StoreError::Invalid("key attribute names must be set".to_string()));
        }
        if self.keys.partition_key == self.keys.sort_key {
            return Err(StoreError::Invalid(
                "partition and sort key attributes must differ".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// DynamoDB-backed key-value store.
#[derive(Clone)]
pub struct DynamoDbStore {
    /// SDK client handle.
    client: Client,
    /// Table name.
    table: String,
    /// Key attribute names.
    keys: KeySchema,
    /// Strongly consistent reads flag.
    consistent_reads: bool,
}

impl fmt::Debug for DynamoDbStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamoDbStore")
            .field("table", &self.table)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl DynamoDbStore {
    /// Loads shared AWS configuration and connects to the table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the configuration is invalid.
    pub async fn connect(config: DynamoDbStoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&shared_config);
        if let Some(timeout) = config.operation_timeout {
            builder = builder
                .timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        }
        Self::from_client(Client::from_conf(builder.build()), config)
    }

    /// Wraps an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the configuration is invalid.
    pub fn from_client(client: Client, config: DynamoDbStoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self {
            client,
            table: config.table,
            keys: config.keys,
            consistent_reads: config.consistent_reads,
        })
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Creates the table when it does not exist, optionally enabling TTL on
    /// `ttl_attribute`. Returns true when the table was created.
    ///
    /// The hosted service creates tables asynchronously; callers there must
    /// wait for the table to become active before writing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when describing or creating the table fails.
    pub async fn ensure_table(&self, ttl_attribute: Option<&str>) -> Result<bool, StoreError> {
        match self.client.describe_table().table_name(&self.table).send().await {
            Ok(_) => return Ok(false),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(DescribeTableError::is_resource_not_found_exception) => {}
            Err(err) => return Err(store_error("DescribeTable", &err)),
        }
        let definitions = [&self.keys.partition_key, &self.keys.sort_key]
            .into_iter()
            .map(|name| {
                AttributeDefinition::builder()
                    .attribute_name(name)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(build_error)?;
        let key_schema = vec![
            KeySchemaElement::builder()
                .attribute_name(&self.keys.partition_key)
                .key_type(KeyType::Hash)
                .build()
                .map_err(build_error)?,
            KeySchemaElement::builder()
                .attribute_name(&self.keys.sort_key)
                .key_type(KeyType::Range)
                .build()
                .map_err(build_error)?,
        ];
        self.client
            .create_table()
            .table_name(&self.table)
            .set_attribute_definitions(Some(definitions))
            .set_key_schema(Some(key_schema))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|err| store_error("CreateTable", &err))?;
        if let Some(attribute) = ttl_attribute {
            let specification = TimeToLiveSpecification::builder()
                .attribute_name(attribute)
                .enabled(true)
                .build()
                .map_err(build_error)?;
            self.client
                .update_time_to_live()
                .table_name(&self.table)
                .time_to_live_specification(specification)
                .send()
                .await
                .map_err(|err| store_error("UpdateTimeToLive", &err))?;
        }
        Ok(true)
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn put_item(&self, item: StoreItem) -> Result<CapacityUnits, StoreError> {
        let output = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(self.keys.item_to_map(item)?))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|err| store_error("PutItem", &err))?;
        Ok(capacity(output.consumed_capacity()))
    }

    async fn get_item(&self, key: &RecordKey) -> Result<GetItemOutput, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(self.keys.key_map(key)))
            .consistent_read(self.consistent_reads)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|err| store_error("GetItem", &err))?;
        let item = output.item().cloned().map(|map| self.keys.map_to_item(map)).transpose()?;
        Ok(GetItemOutput {
            item,
            consumed: capacity(output.consumed_capacity()),
        })
    }

    async fn delete_item(&self, key: &RecordKey) -> Result<CapacityUnits, StoreError> {
        let output = self
            .client
            .delete_item()
            .table_name(&self.table)
            .set_key(Some(self.keys.key_map(key)))
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|err| store_error("DeleteItem", &err))?;
        Ok(capacity(output.consumed_capacity()))
    }

    async fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
    ) -> Result<BatchWriteOutput, StoreError> {
        if operations.is_empty() {
            return Err(StoreError::Invalid("batch write requires at least one operation".into()));
        }
        let requests = operations
            .into_iter()
            .map(|operation| self.keys.write_request(operation))
            .collect::<Result<Vec<_>, _>>()?;
        let output = self
            .client
            .batch_write_item()
            .request_items(&self.table, requests)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|err| store_error("BatchWriteItem", &err))?;
        let unprocessed = output
            .unprocessed_items()
            .and_then(|tables| tables.get(&self.table))
            .map(|requests| {
                requests
                    .iter()
                    .map(|request| self.keys.write_operation(request))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?
            .unwrap_or_default();
        Ok(BatchWriteOutput {
            consumed: capacity(output.consumed_capacity()),
            unprocessed,
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError> {
        let expression = self.keys.query_expression(request);
        let output = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression(expression.key_condition)
            .set_filter_expression(expression.filter)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(Some(expression.values))
            .set_exclusive_start_key(
                request.start_after.as_ref().map(|token| self.keys.key_map(&token.0)),
            )
            .set_limit(request.limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)))
            .consistent_read(self.consistent_reads)
            .return_consumed_capacity(ReturnConsumedCapacity::Total)
            .send()
            .await
            .map_err(|err| store_error("Query", &err))?;
        let items = output
            .items()
            .iter()
            .cloned()
            .map(|map| self.keys.map_to_item(map))
            .collect::<Result<Vec<_>, _>>()?;
        let continuation = output
            .last_evaluated_key()
            .filter(|key| !key.is_empty())
            .map(|key| self.keys.record_key(key))
            .transpose()?
            .map(ContinuationToken);
        Ok(QueryPage {
            items,
            consumed: capacity(output.consumed_capacity()),
            continuation,
        })
    }
}

// ============================================================================
// SECTION: Error Mapping
// ============================================================================

/// Maps an SDK failure for `operation` into a contract error.
fn store_error<E, R>(operation: &str, err: &SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::TimeoutError(_) => StoreError::Timeout(format!("{operation} timed out")),
        SdkError::DispatchFailure(failure) if failure.is_timeout() => {
            StoreError::Timeout(format!("{operation} connect timed out"))
        }
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StoreError::Unavailable(format!("{operation} transport failure"))
        }
        SdkError::ConstructionFailure(_) => {
            StoreError::Invalid(format!("{operation} request could not be constructed"))
        }
        _ => classify_error_code(err.code(), err.message().unwrap_or(operation)),
    }
}
