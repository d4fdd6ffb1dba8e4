// crates/interval-store-config/src/config.rs
// ============================================================================
// Module: Interval Store Configuration
// Description: Configuration loading and validation for the interval store.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: interval-store-core, serde, time, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults matching the demo table layout (`UserID`,
//! `FirstDay`, `LastDay`, `Data`), so an empty file is valid. Invalid values
//! fail closed; nothing is silently clamped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use interval_store_core::AttributeSchema;
use interval_store_core::Boundary;
use interval_store_core::ContainmentPolicy;
use interval_store_core::DEFAULT_SEPARATOR;
use interval_store_core::FileAuditSink;
use interval_store_core::IntervalAuditSink;
use interval_store_core::IntervalStoreConfig;
use interval_store_core::NoopAuditSink;
use interval_store_core::RetryPolicy;
use interval_store_core::SortKeyCodec;
use interval_store_core::StderrAuditSink;
use interval_store_core::TimeResolution;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Limits and Defaults
// ============================================================================

/// Default config file name.
const DEFAULT_CONFIG_NAME: &str = "interval-store.toml";
/// Environment variable overriding the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "INTERVAL_STORE_CONFIG";
/// Maximum config file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum table or attribute name length accepted by the store.
pub(crate) const MAX_NAME_LENGTH: usize = 255;

/// Default table name.
pub(crate) const DEFAULT_TABLE_NAME: &str = "TestTable";
/// Default partition key attribute.
pub(crate) const DEFAULT_PARTITION_KEY: &str = "UserID";
/// Default sort key attribute.
pub(crate) const DEFAULT_SORT_KEY: &str = "FirstDay";
/// Default end-instant attribute.
pub(crate) const DEFAULT_END_ATTRIBUTE: &str = "LastDay";
/// Default payload attribute.
pub(crate) const DEFAULT_PAYLOAD_ATTRIBUTE: &str = "Data";

/// Minimum per-call timeout.
pub(crate) const MIN_CALL_TIMEOUT_MS: u64 = 10;
/// Maximum per-call timeout.
pub(crate) const MAX_CALL_TIMEOUT_MS: u64 = 300_000;
/// Default per-call timeout.
pub(crate) const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
/// Maximum pages one containment query may fetch.
pub(crate) const MAX_QUERY_PAGES: usize = 100_000;
/// Default page ceiling per containment query.
pub(crate) const DEFAULT_MAX_PAGES: usize = 1_000;

/// Largest batch the store accepts in one call.
pub(crate) const MAX_BATCH_SIZE: usize = 25;
/// Maximum chunks in flight at once.
pub(crate) const MAX_IN_FLIGHT: usize = 64;
/// Default chunks in flight.
pub(crate) const DEFAULT_MAX_IN_FLIGHT: usize = 4;
/// Maximum submissions per chunk.
pub(crate) const MAX_ATTEMPTS: u32 = 100;
/// Default submissions per chunk.
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 8;
/// Default backoff base delay.
pub(crate) const DEFAULT_BASE_DELAY_MS: u64 = 50;
/// Default backoff cap.
pub(crate) const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
/// Maximum backoff cap.
pub(crate) const MAX_DELAY_MS: u64 = 60_000;
/// Default wall-clock budget for one batch.
pub(crate) const DEFAULT_BUDGET_MS: u64 = 60_000;
/// Maximum wall-clock budget for one batch.
pub(crate) const MAX_BUDGET_MS: u64 = 3_600_000;

/// Accepted `utc_offset` layout.
const OFFSET_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

// ============================================================================
// SECTION: Top-Level Config
// ============================================================================

/// Validated interval store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntervalStoreSettings {
    /// Table and attribute names.
    #[serde(default)]
    pub table: TableConfig,
    /// Sort-key codec settings.
    #[serde(default)]
    pub codec: CodecConfig,
    /// Containment query settings.
    #[serde(default)]
    pub query: QueryConfig,
    /// Bulk mutation retry settings.
    #[serde(default)]
    pub bulk: BulkConfig,
    /// DynamoDB connection settings; absent means SDK defaults.
    #[serde(default)]
    pub dynamodb: Option<DynamoDbConfig>,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl IntervalStoreSettings {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path comes from `path`, then `INTERVAL_STORE_CONFIG`, then
    /// `interval-store.toml` in the working directory. Only the implicit
    /// default file may be absent; that yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        if !explicit && !resolved.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::parse(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for values that fail validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.table.validate()?;
        self.codec.validate()?;
        self.query.validate()?;
        self.bulk.validate()?;
        if let Some(dynamodb) = &self.dynamodb {
            dynamodb.validate()?;
        }
        self.audit.validate()?;
        Ok(())
    }

    /// Builds the interval store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the codec cannot be built.
    pub fn interval_store_config(&self) -> Result<IntervalStoreConfig, ConfigError> {
        Ok(IntervalStoreConfig {
            codec: self.codec.build()?,
            policy: self.query.policy(),
            schema: self.table.attribute_schema(),
            call_timeout: Some(Duration::from_millis(self.query.call_timeout_ms)),
            max_pages: self.query.max_pages,
            page_limit: self.query.page_limit,
        })
    }

    /// Builds the bulk retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.bulk.retry_policy()
    }

    /// Opens the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn IntervalAuditSink>, ConfigError> {
        self.audit.build()
    }
}

// ============================================================================
// SECTION: Table
// ============================================================================

/// Table and attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Table name.
    #[serde(default = "default_table_name")]
    pub name: String,
    /// Partition key attribute holding the owner id.
    #[serde(default = "default_partition_key")]
    pub partition_key: String,
    /// Sort key attribute holding the encoded sort key.
    #[serde(default = "default_sort_key")]
    pub sort_key: String,
    /// Numeric end-instant attribute, also used as the TTL attribute.
    #[serde(default = "default_end_attribute")]
    pub end_attribute: String,
    /// Payload attribute.
    #[serde(default = "default_payload_attribute")]
    pub payload_attribute: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            name: default_table_name(),
            partition_key: default_partition_key(),
            sort_key: default_sort_key(),
            end_attribute: default_end_attribute(),
            payload_attribute: default_payload_attribute(),
        }
    }
}

impl TableConfig {
    /// Validates names and rejects attribute reuse.
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("table.name", &self.name),
            ("table.partition_key", &self.partition_key),
            ("table.sort_key", &self.sort_key),
            ("table.end_attribute", &self.end_attribute),
            ("table.payload_attribute", &self.payload_attribute),
        ];
        for (field, value) in fields {
            validate_name(field, value)?;
        }
        let attributes = &fields[1 ..];
        for (index, (field, value)) in attributes.iter().enumerate() {
            if let Some((other, _)) =
                attributes[index + 1 ..].iter().find(|(_, candidate)| candidate == value)
            {
                return Err(ConfigError::Invalid(format!(
                    "{field} and {other} must name different attributes"
                )));
            }
        }
        Ok(())
    }

    /// Returns the non-key attribute schema.
    #[must_use]
    pub fn attribute_schema(&self) -> AttributeSchema {
        AttributeSchema {
            end_attribute: self.end_attribute.clone(),
            payload_attribute: self.payload_attribute.clone(),
        }
    }
}

/// Default table name.
fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

/// Default partition key.
fn default_partition_key() -> String {
    DEFAULT_PARTITION_KEY.to_string()
}

/// Default sort key.
fn default_sort_key() -> String {
    DEFAULT_SORT_KEY.to_string()
}

/// Default end attribute.
fn default_end_attribute() -> String {
    DEFAULT_END_ATTRIBUTE.to_string()
}

/// Default payload attribute.
fn default_payload_attribute() -> String {
    DEFAULT_PAYLOAD_ATTRIBUTE.to_string()
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Sort-key codec settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CodecConfig {
    /// Prefix resolution.
    #[serde(default)]
    pub resolution: TimeResolution,
    /// Fixed offset used for encoding, as `+HH:MM` or `-HH:MM`.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// Separator between the prefix and the tag.
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            resolution: TimeResolution::default(),
            utc_offset: default_utc_offset(),
            separator: default_separator(),
        }
    }
}

impl CodecConfig {
    /// Validates offset syntax and the separator.
    fn validate(&self) -> Result<(), ConfigError> {
        self.build().map(|_| ())
    }

    /// Builds the codec.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed offset or separator.
    pub fn build(&self) -> Result<SortKeyCodec, ConfigError> {
        let offset = parse_utc_offset(&self.utc_offset)?;
        SortKeyCodec::new(self.resolution, offset, self.separator)
            .map_err(|err| ConfigError::Invalid(format!("codec.separator: {err}")))
    }
}

/// Default offset.
fn default_utc_offset() -> String {
    "+00:00".to_string()
}

/// Default separator.
const fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

/// Parses a `+HH:MM` offset.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the text is not a signed hour and
/// minute offset.
pub fn parse_utc_offset(value: &str) -> Result<UtcOffset, ConfigError> {
    UtcOffset::parse(value.trim(), OFFSET_FORMAT).map_err(|_| {
        ConfigError::Invalid(format!("codec.utc_offset must look like +HH:MM, got {value:?}"))
    })
}

// ============================================================================
// SECTION: Query
// ============================================================================

/// Containment query settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    /// Start-edge semantics.
    #[serde(default)]
    pub start_boundary: Boundary,
    /// End-edge semantics.
    #[serde(default)]
    pub end_boundary: Boundary,
    /// Timeout applied to each store call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Maximum pages fetched by one query.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Page size hint passed to the store.
    #[serde(default)]
    pub page_limit: Option<usize>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            start_boundary: Boundary::default(),
            end_boundary: Boundary::default(),
            call_timeout_ms: default_call_timeout_ms(),
            max_pages: default_max_pages(),
            page_limit: None,
        }
    }
}

impl QueryConfig {
    /// Validates timeouts and page bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "query.call_timeout_ms",
            self.call_timeout_ms,
            MIN_CALL_TIMEOUT_MS,
            MAX_CALL_TIMEOUT_MS,
        )?;
        validate_count_range("query.max_pages", self.max_pages, 1, MAX_QUERY_PAGES)?;
        if let Some(page_limit) = self.page_limit {
            validate_count_range("query.page_limit", page_limit, 1, usize::MAX)?;
        }
        Ok(())
    }

    /// Returns the containment policy.
    #[must_use]
    pub const fn policy(&self) -> ContainmentPolicy {
        ContainmentPolicy {
            start: self.start_boundary,
            end: self.end_boundary,
        }
    }
}

/// Default call timeout.
const fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

/// Default page ceiling.
const fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

// ============================================================================
// SECTION: Bulk
// ============================================================================

/// Bulk mutation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkConfig {
    /// Operations per batch call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Chunks in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Submissions per chunk, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff base delay.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff cap.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Wall-clock budget for one batch.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    /// Timeout applied to each batch write call.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            budget_ms: default_budget_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl BulkConfig {
    /// Validates batch, retry, and budget bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_count_range("bulk.batch_size", self.batch_size, 1, MAX_BATCH_SIZE)?;
        validate_count_range("bulk.max_in_flight", self.max_in_flight, 1, MAX_IN_FLIGHT)?;
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "bulk.max_attempts must be between 1 and {MAX_ATTEMPTS}"
            )));
        }
        validate_timeout_range("bulk.max_delay_ms", self.max_delay_ms, 1, MAX_DELAY_MS)?;
        validate_timeout_range("bulk.base_delay_ms", self.base_delay_ms, 1, self.max_delay_ms)?;
        validate_timeout_range("bulk.budget_ms", self.budget_ms, 1, MAX_BUDGET_MS)?;
        validate_timeout_range(
            "bulk.call_timeout_ms",
            self.call_timeout_ms,
            MIN_CALL_TIMEOUT_MS,
            MAX_CALL_TIMEOUT_MS,
        )?;
        Ok(())
    }

    /// Builds the retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            budget: Duration::from_millis(self.budget_ms),
            call_timeout: Some(Duration::from_millis(self.call_timeout_ms)),
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Default batch size.
const fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

/// Default in-flight chunks.
const fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

/// Default attempts.
const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Default base delay.
const fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

/// Default delay cap.
const fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

/// Default batch budget.
const fn default_budget_ms() -> u64 {
    DEFAULT_BUDGET_MS
}

// ============================================================================
// SECTION: DynamoDB
// ============================================================================

/// DynamoDB connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DynamoDbConfig {
    /// Region override; the SDK default chain applies when absent.
    #[serde(default)]
    pub region: Option<String>,
    /// Endpoint override, e.g. a local DynamoDB.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// SDK operation timeout including retries.
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
    /// Use strongly consistent reads.
    #[serde(default = "default_true")]
    pub consistent_reads: bool,
    /// Create the table when it does not exist.
    #[serde(default)]
    pub create_missing_table: bool,
    /// Enable TTL on the end attribute when creating the table.
    #[serde(default = "default_true")]
    pub enable_ttl: bool,
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            operation_timeout_ms: None,
            consistent_reads: true,
            create_missing_table: false,
            enable_ttl: true,
        }
    }
}

impl DynamoDbConfig {
    /// Validates overrides.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(region) = &self.region {
            validate_name("dynamodb.region", region)?;
        }
        if let Some(endpoint) = &self.endpoint {
            let trimmed = endpoint.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                return Err(ConfigError::Invalid(
                    "dynamodb.endpoint must be an http or https url".to_string(),
                ));
            }
            if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
                return Err(ConfigError::Invalid(
                    "dynamodb.endpoint exceeds max length".to_string(),
                ));
            }
        }
        if let Some(timeout_ms) = self.operation_timeout_ms {
            validate_timeout_range(
                "dynamodb.operation_timeout_ms",
                timeout_ms,
                MIN_CALL_TIMEOUT_MS,
                MAX_CALL_TIMEOUT_MS,
            )?;
        }
        Ok(())
    }

    /// Returns the operation timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

/// Serde default for flags that start enabled.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Events are discarded.
    #[default]
    None,
}

/// Audit sink settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path, required for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates that the file sink has a usable path.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkKind::Stderr | AuditSinkKind::None, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid for the file sink".to_string(),
            )),
            (AuditSinkKind::Stderr | AuditSinkKind::None, None) => Ok(()),
        }
    }

    /// Opens the sink.
    fn build(&self) -> Result<Arc<dyn IntervalAuditSink>, ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
            (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
            (AuditSinkKind::File, Some(path)) => FileAuditSink::new(path)
                .map(|sink| Arc::new(sink) as Arc<dyn IntervalAuditSink>)
                .map_err(|err| ConfigError::Io(err.to_string())),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path; the flag reports whether it was requested.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a table or attribute name.
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.trim() != value {
        return Err(ConfigError::Invalid(format!("{field} must not have surrounding whitespace")));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}

/// Validates a millisecond value against an inclusive range.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Validates a count against an inclusive range.
fn validate_count_range(
    field: &str,
    value: usize,
    min: usize,
    max: usize,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{field} must be between {min} and {max}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn validate_timeout_range_accepts_bounds() {
        assert!(validate_timeout_range("t", 10, 10, 20).is_ok(), "minimum should pass");
        assert!(validate_timeout_range("t", 20, 10, 20).is_ok(), "maximum should pass");
    }

    #[test]
    fn validate_timeout_range_rejects_outside_bounds() {
        let err = validate_timeout_range("query.call_timeout_ms", 9, 10, 20).unwrap_err();
        assert!(err.to_string().contains("query.call_timeout_ms must be between 10 and 20"));
        assert!(validate_timeout_range("t", 21, 10, 20).is_err(), "above maximum should fail");
    }

    #[test]
    fn parse_utc_offset_accepts_signed_offsets() {
        assert_eq!(parse_utc_offset("+00:00").unwrap(), UtcOffset::UTC);
        let offset = parse_utc_offset("-05:30").unwrap();
        assert_eq!(offset.whole_minutes(), -330);
    }

    #[test]
    fn parse_utc_offset_rejects_unsigned_or_named_offsets() {
        for value in ["05:00", "UTC", "+5", ""] {
            assert!(parse_utc_offset(value).is_err(), "{value} should be rejected");
        }
    }

    #[test]
    fn validate_name_rejects_padding_and_controls() {
        assert!(validate_name("f", "UserID").is_ok());
        assert!(validate_name("f", " UserID").is_err());
        assert!(validate_name("f", "User\tID").is_err());
        assert!(validate_name("f", &"a".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn resolve_path_prefers_explicit_path() {
        let (path, explicit) = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("custom.toml"));
        assert!(explicit);
    }
}
