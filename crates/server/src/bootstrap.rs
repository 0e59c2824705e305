use std::sync::Arc;

use leadflow_core::config::{AppConfig, ConfigError, LoadOptions};
use leadflow_core::{ConfigurationError, LeadScoringEngine};
use leadflow_db::{
    connect, migrations, DbPool, SqlPromotionSource, SqlScoredQuoteRepository,
    SqlStaffDirectory, SqlWorkloadStore,
};
use thiserror::Error;
use tracing::info;

use crate::quotes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("scoring engine rejected configuration: {0}")]
    Engine(#[from] ConfigurationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        "database migrations applied"
    );

    let engine = LeadScoringEngine::new(
        config.tables.clone(),
        SqlPromotionSource::new(db_pool.clone()),
        SqlStaffDirectory::new(db_pool.clone()),
        SqlWorkloadStore::new(db_pool.clone()),
        config.assignment_policy(),
    )?;
    info!(
        event_name = "system.bootstrap.engine_ready",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        services = engine.tables().service_rates.len(),
        default_staff = %engine.policy().default_staff,
        "lead scoring engine initialized"
    );

    let state = AppState {
        engine: Arc::new(engine),
        quotes: Arc::new(SqlScoredQuoteRepository::new(db_pool.clone())),
    };
    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use leadflow_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use leadflow_core::EngineTables;

    use crate::bootstrap::{bootstrap, bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_fallback_staff_member() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                default_staff: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("assignment.default_staff"));
    }

    #[tokio::test]
    async fn bootstrap_refuses_an_empty_rate_table() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:?cache=shared".to_string();
        config.tables =
            EngineTables { service_rates: Default::default(), ..EngineTables::default() };

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::Engine(_))));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_the_engine() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' \
             AND name IN ('quote_request', 'promotion', 'staff_member', 'staff_workload')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected lead tables to be available after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should expose the lead-scoring tables");
        assert_eq!(app.state.engine.policy().default_staff.0, "office");

        app.db_pool.close().await;
    }
}
