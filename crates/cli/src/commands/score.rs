use std::fs;
use std::io::{self, Read};
use std::path::Path;

use chrono::Utc;
use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_core::{RawSubmission, ScoredQuote, ValidationError};
use leadflow_db::{DbPool, ScoredQuoteRepository, SqlScoredQuoteRepository};
use serde_json::Value;

use crate::commands::{
    build_dry_run_engine, build_engine, build_runtime, load_config, open_migrated_pool,
    persistence_failure, CommandResult, Failure, EXIT_CONFLICT, EXIT_INVALID_INPUT,
};

/// Scores one submission read from `input` (`-` for stdin) and stores the record
/// unless `dry_run` is set. A dry run leaves every table untouched, workload counters
/// included. A submission whose `id` is already stored is refused.
pub fn run(options: LoadOptions, input: &str, dry_run: bool) -> CommandResult {
    let raw = match read_submission(input) {
        Ok(raw) => raw,
        Err(result) => return result,
    };
    let config = match load_config("score", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("score") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let outcome = if dry_run {
            build_dry_run_engine(&config, &pool).await?.score_quote(&raw, Utc::now()).await
        } else {
            score_and_store(&config, &pool, &raw).await?
        };
        pool.close().await;
        Ok::<_, Failure>(outcome)
    });

    match result {
        Ok(Ok(scored)) => CommandResult::success_with_data(
            "score",
            format!(
                "scored lead {} as {} ({}), assigned to {}",
                scored.request.id,
                scored.lead_priority.as_str(),
                scored.lead_score.value(),
                scored.assigned_to
            ),
            serde_json::to_value(&scored).ok(),
        ),
        Ok(Err(validation)) => validation_failure("score", &validation),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("score", error_class, message, exit_code)
        }
    }
}

async fn score_and_store(
    config: &AppConfig,
    pool: &DbPool,
    raw: &RawSubmission,
) -> Result<Result<ScoredQuote, ValidationError>, Failure> {
    let engine = build_engine(config, pool)?;
    let repository = SqlScoredQuoteRepository::new(pool.clone());

    let request = match engine.normalize(raw, Utc::now()) {
        Ok(request) => request,
        Err(error) => return Ok(Err(error)),
    };
    // Refused before assignment so a duplicate never takes a workload slot.
    if repository.find_by_id(&request.id).await.map_err(persistence_failure)?.is_some() {
        return Err((
            "conflict",
            format!("quote request {} is already stored", request.id),
            EXIT_CONFLICT,
        ));
    }

    let scored = engine.score_request(request).await;
    repository.insert(&scored).await.map_err(persistence_failure)?;
    Ok(Ok(scored))
}

fn read_submission(input: &str) -> Result<RawSubmission, CommandResult> {
    let body = if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map(|_| buffer)
    } else {
        fs::read_to_string(Path::new(input))
    }
    .map_err(|error| {
        CommandResult::failure(
            "score",
            "input",
            format!("could not read submission from `{input}`: {error}"),
            EXIT_INVALID_INPUT,
        )
    })?;

    let value: Value = serde_json::from_str(&body).map_err(|error| {
        CommandResult::failure(
            "score",
            "input",
            format!("submission is not valid JSON: {error}"),
            EXIT_INVALID_INPUT,
        )
    })?;
    RawSubmission::from_value(value).map_err(|error| validation_failure("score", &error))
}

pub(crate) fn validation_failure(command: &str, error: &ValidationError) -> CommandResult {
    CommandResult::failure_with_data(
        command,
        "validation",
        error.to_string(),
        EXIT_INVALID_INPUT,
        serde_json::to_value(&error.issues).ok(),
    )
}
