use leadflow_core::config::LoadOptions;
use leadflow_db::{connect, ping};
use serde_json::json;

use crate::commands::{build_engine, build_runtime, load_config, CommandResult, EXIT_DATABASE};

/// Startup preflight: configuration, engine tables and database reachability.
pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config("start", options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("start") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        ping(&pool)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;

        let engine = build_engine(&config, &pool);
        pool.close().await;
        engine.map(|engine| engine.tables().service_rates.len())
    });

    match result {
        Ok(service_count) => CommandResult::success_with_data(
            "start",
            "preflight passed: configuration, engine tables and database are ready",
            Some(json!({
                "listen_address": config.listen_address(),
                "default_staff": config.assignment.default_staff,
                "service_count": service_count,
            })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}
