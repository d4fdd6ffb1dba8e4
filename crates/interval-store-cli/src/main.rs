// crates/interval-store-cli/src/main.rs
// ============================================================================
// Module: Interval Store CLI Entry Point
// Description: Command dispatcher for interval store reads, writes, and demos.
// Purpose: Drive the interval store against DynamoDB or an in-memory backend.
// Dependencies: clap, interval-store-{config,core,dynamodb}, serde, tokio.
// ============================================================================

//! ## Overview
//! Every command loads the configuration first, opens the selected backend,
//! and prints one JSON document on stdout. Failures go to stderr with a
//! failure exit code; an incomplete bulk mutation additionally prints its
//! residual operations on stdout so they can be resubmitted. Ctrl-C cancels
//! the running command through the shared call context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use interval_store_cli::demo::DemoError;
use interval_store_cli::demo::run_demo;
use interval_store_cli::input::InstantArg;
use interval_store_cli::input::MAX_INPUT_BYTES;
use interval_store_cli::input::build_record;
use interval_store_cli::input::parse_keys;
use interval_store_cli::input::parse_records;
use interval_store_cli::input::read_bytes_with_limit;
use interval_store_config::IntervalStoreSettings;
use interval_store_core::BulkMutator;
use interval_store_core::CallContext;
use interval_store_core::CapacityUnits;
use interval_store_core::InMemoryKeyValueStore;
use interval_store_core::IntervalStore;
use interval_store_core::IntervalStoreError;
use interval_store_core::KeyValueStore;
use interval_store_core::OwnerId;
use interval_store_core::Payload;
use interval_store_core::SortKey;
use interval_store_core::WriteOperation;
use interval_store_core::cancel_pair;
use interval_store_dynamodb::DynamoDbStore;
use interval_store_dynamodb::DynamoDbStoreConfig;
use interval_store_dynamodb::KeySchema;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "interval-store", disable_help_subcommand = true)]
struct Cli {
    /// Optional config file path (defaults to interval-store.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Use a process-local in-memory store instead of DynamoDB.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    memory: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Write one interval record.
    Put(PutCommand),
    /// Read one record by key.
    Get(KeyCommand),
    /// Delete one record by key.
    Delete(KeyCommand),
    /// List an owner's records whose interval contains an instant.
    Query(QueryCommand),
    /// Write every record of a JSON input file.
    BulkPut(InputCommand),
    /// Delete every key of a JSON input file.
    BulkDelete(InputCommand),
    /// Replay the demo walkthrough.
    Demo,
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `put`.
#[derive(Args, Debug)]
struct PutCommand {
    /// Owner id.
    #[arg(long)]
    owner: String,
    /// Interval start (`YYYY-MM-DD` or RFC 3339).
    #[arg(long)]
    start: String,
    /// Interval end (`YYYY-MM-DD` covers that whole day, or RFC 3339).
    #[arg(long)]
    end: String,
    /// Optional tag appended to the sort key.
    #[arg(long)]
    tag: Option<String>,
    /// Text payload.
    #[arg(long)]
    payload: String,
}

/// Arguments addressing one record.
#[derive(Args, Debug)]
struct KeyCommand {
    /// Owner id.
    #[arg(long)]
    owner: String,
    /// Encoded sort key.
    #[arg(long)]
    sort_key: String,
}

/// Arguments for `query`.
#[derive(Args, Debug)]
struct QueryCommand {
    /// Owner id.
    #[arg(long)]
    owner: String,
    /// Query instant (`YYYY-MM-DD` means the start of that day, or RFC 3339).
    #[arg(long)]
    at: String,
}

/// Arguments for bulk commands.
#[derive(Args, Debug)]
struct InputCommand {
    /// JSON input file.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate,
}

// ============================================================================
// SECTION: Outputs
// ============================================================================

/// Output of `put`.
#[derive(Debug, Serialize)]
struct PutOutput {
    /// Owner id.
    owner: OwnerId,
    /// Encoded sort key.
    sort_key: SortKey,
    /// End instant in unix seconds.
    end_unix: i64,
    /// Consumed capacity.
    consumed: CapacityUnits,
}

/// Output of `delete`.
#[derive(Debug, Serialize)]
struct DeleteOutput {
    /// Consumed capacity.
    consumed: CapacityUnits,
}

/// Output of `config validate`.
#[derive(Debug, Serialize)]
struct ConfigOutput {
    /// Always true; invalid configuration exits with an error.
    valid: bool,
    /// Table name.
    table: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let settings = IntervalStoreSettings::load(cli.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;

    let memory = cli.memory;
    match cli.command {
        Commands::Put(command) => {
            command_put(&Session::open(&settings, memory).await?, command).await
        }
        Commands::Get(command) => {
            command_get(&Session::open(&settings, memory).await?, command).await
        }
        Commands::Delete(command) => {
            command_delete(&Session::open(&settings, memory).await?, command).await
        }
        Commands::Query(command) => {
            command_query(&Session::open(&settings, memory).await?, command).await
        }
        Commands::BulkPut(command) => {
            command_bulk_put(&Session::open(&settings, memory).await?, &command).await
        }
        Commands::BulkDelete(command) => {
            command_bulk_delete(&Session::open(&settings, memory).await?, &command).await
        }
        Commands::Demo => command_demo(&Session::open(&settings, memory).await?).await,
        Commands::Config {
            command: ConfigCommand::Validate,
        } => command_config_validate(&settings),
    }
}

/// Executes `config validate`; loading already validated the file.
fn command_config_validate(settings: &IntervalStoreSettings) -> CliResult<ExitCode> {
    write_json(&ConfigOutput {
        valid: true,
        table: settings.table.name.clone(),
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Store facades and call context shared by one command.
struct Session {
    /// Single-item and query facade.
    store: IntervalStore,
    /// Bulk mutation driver.
    bulk: BulkMutator,
    /// Cancellable call context.
    ctx: CallContext,
}

impl Session {
    /// Opens the backend and wires audit and cancellation.
    async fn open(settings: &IntervalStoreSettings, memory: bool) -> CliResult<Self> {
        let backend = open_backend(settings, memory).await?;
        let store_config = settings
            .interval_store_config()
            .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
        let audit = settings
            .audit_sink()
            .map_err(|err| CliError::new(format!("failed to open audit sink: {err}")))?;
        let store =
            IntervalStore::new(Arc::clone(&backend), store_config).with_audit(Arc::clone(&audit));
        let bulk = BulkMutator::new(backend, settings.retry_policy())
            .with_batch_size(settings.bulk.batch_size)
            .with_audit(audit);

        let (handle, signal) = cancel_pair();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });
        Ok(Self {
            store,
            bulk,
            ctx: CallContext::background().cancelled_by(signal),
        })
    }
}

/// Opens the configured backend.
async fn open_backend(
    settings: &IntervalStoreSettings,
    memory: bool,
) -> CliResult<Arc<dyn KeyValueStore>> {
    // The in-memory store stays TTL-free so historical demo intervals remain visible.
    if memory {
        return Ok(Arc::new(InMemoryKeyValueStore::new()));
    }
    let dynamodb = settings.dynamodb.clone().unwrap_or_default();
    let config = DynamoDbStoreConfig {
        table: settings.table.name.clone(),
        keys: KeySchema {
            partition_key: settings.table.partition_key.clone(),
            sort_key: settings.table.sort_key.clone(),
        },
        region: dynamodb.region.clone(),
        endpoint: dynamodb.endpoint.clone(),
        operation_timeout: dynamodb.operation_timeout(),
        consistent_reads: dynamodb.consistent_reads,
    };
    let store = DynamoDbStore::connect(config)
        .await
        .map_err(|err| CliError::new(format!("failed to connect to dynamodb: {err}")))?;
    if dynamodb.create_missing_table {
        let ttl_attribute = dynamodb.enable_ttl.then_some(settings.table.end_attribute.as_str());
        store
            .ensure_table(ttl_attribute)
            .await
            .map_err(|err| CliError::new(format!("failed to create table: {err}")))?;
    }
    Ok(Arc::new(store))
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `put`.
async fn command_put(session: &Session, command: PutCommand) -> CliResult<ExitCode> {
    let record = build_record(
        &command.owner,
        &command.start,
        &command.end,
        command.tag.as_deref(),
        Payload::Text(command.payload),
        session.store.codec(),
    )
    .map_err(|err| CliError::new(err.to_string()))?;
    match session.store.put(&session.ctx, &record).await {
        Ok(consumed) => {
            write_json(&PutOutput {
                owner: record.owner,
                sort_key: record.sort_key,
                end_unix: record.end_unix,
                consumed,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => store_failure(err),
    }
}

/// Executes `get`.
async fn command_get(session: &Session, command: KeyCommand) -> CliResult<ExitCode> {
    let owner = OwnerId::new(command.owner);
    let sort_key = SortKey::new(command.sort_key);
    match session.store.get(&session.ctx, &owner, &sort_key).await {
        Ok(outcome) => {
            write_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => store_failure(err),
    }
}

/// Executes `delete`.
async fn command_delete(session: &Session, command: KeyCommand) -> CliResult<ExitCode> {
    let owner = OwnerId::new(command.owner);
    let sort_key = SortKey::new(command.sort_key);
    match session.store.delete(&session.ctx, &owner, &sort_key).await {
        Ok(consumed) => {
            write_json(&DeleteOutput {
                consumed,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => store_failure(err),
    }
}

/// Executes `query`.
async fn command_query(session: &Session, command: QueryCommand) -> CliResult<ExitCode> {
    let at = InstantArg::parse(&command.at)
        .map_err(|err| CliError::new(err.to_string()))?
        .as_start(session.store.codec());
    let owner = OwnerId::new(command.owner);
    match session.store.query_containing(&session.ctx, &owner, at).await {
        Ok(outcome) => {
            write_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => store_failure(err),
    }
}

/// Executes `bulk-put`.
async fn command_bulk_put(session: &Session, command: &InputCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes_with_limit(&command.input, MAX_INPUT_BYTES)
        .map_err(|err| CliError::new(err.to_string()))?;
    let records = parse_records(&bytes, session.store.codec())
        .map_err(|err| CliError::new(err.to_string()))?;
    let schema = &session.store.config().schema;
    let operations = records
        .iter()
        .map(|record| WriteOperation::Put {
            item: schema.to_item(record),
        })
        .collect();
    apply_bulk(session, operations).await
}

/// Executes `bulk-delete`.
async fn command_bulk_delete(session: &Session, command: &InputCommand) -> CliResult<ExitCode> {
    let bytes = read_bytes_with_limit(&command.input, MAX_INPUT_BYTES)
        .map_err(|err| CliError::new(err.to_string()))?;
    let keys = parse_keys(&bytes).map_err(|err| CliError::new(err.to_string()))?;
    let operations = keys
        .into_iter()
        .map(|key| WriteOperation::Delete {
            key,
        })
        .collect();
    apply_bulk(session, operations).await
}

/// Applies a bulk mutation and reports the result.
async fn apply_bulk(session: &Session, operations: Vec<WriteOperation>) -> CliResult<ExitCode> {
    match session.bulk.apply_batch(&session.ctx, operations).await {
        Ok(report) => {
            write_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => store_failure(err),
    }
}

/// Executes `demo`.
async fn command_demo(session: &Session) -> CliResult<ExitCode> {
    match run_demo(&session.store, &session.bulk, &session.ctx).await {
        Ok(report) => {
            write_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(DemoError::Store(err)) => store_failure(err),
        Err(err @ DemoError::Fixture(_)) => Err(CliError::new(err.to_string())),
    }
}

/// Reports a store failure; incomplete batches also print their residual.
fn store_failure(err: IntervalStoreError) -> CliResult<ExitCode> {
    match err {
        IntervalStoreError::BatchIncomplete(incomplete) => {
            write_json(&incomplete)?;
            Ok(emit_error(&incomplete.to_string()))
        }
        other => Err(CliError::new(other.to_string())),
    }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a value as pretty JSON on stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
