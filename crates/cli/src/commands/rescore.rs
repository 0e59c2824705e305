use leadflow_core::config::LoadOptions;
use leadflow_core::QuoteRequestId;
use leadflow_db::{ScoredQuoteRepository, SqlScoredQuoteRepository};
use uuid::Uuid;

use crate::commands::{
    build_engine, build_runtime, load_config, open_migrated_pool, persistence_failure,
    CommandResult, Failure, EXIT_INVALID_INPUT, EXIT_NOT_FOUND,
};

/// Re-runs the engine over a stored lead and writes back its derived fields. Status and
/// assignee stay as stored, and no workload slot is taken.
pub fn run(options: LoadOptions, id: &str) -> CommandResult {
    let id = match Uuid::parse_str(id.trim()) {
        Ok(id) => QuoteRequestId(id),
        Err(error) => {
            return CommandResult::failure(
                "rescore",
                "input",
                format!("`{id}` is not a quote request id: {error}"),
                EXIT_INVALID_INPUT,
            );
        }
    };
    let config = match load_config("rescore", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("rescore") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let engine = build_engine(&config, &pool)?;
        let repository = SqlScoredQuoteRepository::new(pool.clone());

        let not_found =
            || ("not_found", format!("quote request `{id}` was not found"), EXIT_NOT_FOUND);
        let previous =
            repository.find_by_id(&id).await.map_err(persistence_failure)?.ok_or_else(not_found)?;

        let rescored = engine.rescore(&previous).await;
        repository.update_scoring(&rescored).await.map_err(persistence_failure)?;
        let rescored =
            repository.find_by_id(&id).await.map_err(persistence_failure)?.ok_or_else(not_found)?;
        pool.close().await;
        Ok::<_, Failure>((previous, rescored))
    });

    match result {
        Ok((previous, rescored)) => CommandResult::success_with_data(
            "rescore",
            format!(
                "re-scored lead {}: {} -> {} ({})",
                rescored.request.id,
                previous.lead_score.value(),
                rescored.lead_score.value(),
                rescored.lead_priority.as_str()
            ),
            serde_json::to_value(&rescored).ok(),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("rescore", error_class, message, exit_code)
        }
    }
}
