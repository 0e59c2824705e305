pub mod config;
pub mod migrate;
pub mod rescore;
pub mod score;
pub mod seed;
pub mod start;

use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_core::LeadScoringEngine;
use leadflow_db::{
    connect, migrations, DbPool, InMemoryWorkloadStore, RepositoryError, SqlPromotionSource,
    SqlStaffDirectory, SqlWorkloadStore,
};
use serde::Serialize;
use serde_json::Value;

pub const EXIT_INVALID_INPUT: u8 = 2;
pub const EXIT_RUNTIME_INIT: u8 = 3;
pub const EXIT_DATABASE: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_SEED_VERIFICATION: u8 = 6;
pub const EXIT_NOT_FOUND: u8 = 7;
pub const EXIT_CONFLICT: u8 = 8;

pub(crate) type SqlEngine =
    LeadScoringEngine<SqlPromotionSource, SqlStaffDirectory, SqlWorkloadStore>;

/// Reads promotions and staff from the database but assigns against an in-memory copy of
/// the workload counters.
pub(crate) type DryRunEngine =
    LeadScoringEngine<SqlPromotionSource, SqlStaffDirectory, InMemoryWorkloadStore>;

/// Error tuple threaded through `block_on` closures: (error class, message, exit code).
pub(crate) type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_data(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_INVALID_INPUT,
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME_INIT,
        )
    })
}

pub(crate) async fn open_migrated_pool(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;

    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
    Ok(pool)
}

pub(crate) fn build_engine(config: &AppConfig, pool: &DbPool) -> Result<SqlEngine, Failure> {
    LeadScoringEngine::new(
        config.tables.clone(),
        SqlPromotionSource::new(pool.clone()),
        SqlStaffDirectory::new(pool.clone()),
        SqlWorkloadStore::new(pool.clone()),
        config.assignment_policy(),
    )
    .map_err(|error| ("config_validation", error.to_string(), EXIT_INVALID_INPUT))
}

/// Dry runs assign against a snapshot of the counters, so nothing reaches the database.
pub(crate) async fn build_dry_run_engine(
    config: &AppConfig,
    pool: &DbPool,
) -> Result<DryRunEngine, Failure> {
    let counters = SqlWorkloadStore::new(pool.clone())
        .snapshot()
        .await
        .map_err(|error| ("persistence", error.to_string(), EXIT_DATABASE))?;

    LeadScoringEngine::new(
        config.tables.clone(),
        SqlPromotionSource::new(pool.clone()),
        SqlStaffDirectory::new(pool.clone()),
        InMemoryWorkloadStore::with_counters(counters),
        config.assignment_policy(),
    )
    .map_err(|error| ("config_validation", error.to_string(), EXIT_INVALID_INPUT))
}

pub(crate) fn persistence_failure(error: RepositoryError) -> Failure {
    match error {
        RepositoryError::Conflict(message) => ("conflict", message, EXIT_CONFLICT),
        other => ("persistence", other.to_string(), EXIT_DATABASE),
    }
}
