use std::env;
use std::fs;
use std::path::Path;

use leadflow_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

struct FieldSources<'a> {
    doc: Option<&'a Value>,
    path: Option<&'a Path>,
}

pub fn run(options: LoadOptions) -> String {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources =
        FieldSources { doc: config_file_doc.as_ref(), path: config_file_path.as_deref() };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut push = |key: &str, value: String, env_keys: &[&str]| {
        lines.push(render_line(key, &value, field_source(key, env_keys, &sources)));
    };

    push("database.url", config.database.url.clone(), &["LEADFLOW_DATABASE_URL"]);
    push(
        "database.max_connections",
        config.database.max_connections.to_string(),
        &["LEADFLOW_DATABASE_MAX_CONNECTIONS"],
    );
    push(
        "database.timeout_secs",
        config.database.timeout_secs.to_string(),
        &["LEADFLOW_DATABASE_TIMEOUT_SECS"],
    );

    push(
        "server.bind_address",
        config.server.bind_address.clone(),
        &["LEADFLOW_SERVER_BIND_ADDRESS"],
    );
    push("server.port", config.server.port.to_string(), &["LEADFLOW_SERVER_PORT"]);
    push(
        "server.graceful_shutdown_secs",
        config.server.graceful_shutdown_secs.to_string(),
        &["LEADFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
    );

    push(
        "assignment.default_staff",
        config.assignment.default_staff.clone(),
        &["LEADFLOW_ASSIGNMENT_DEFAULT_STAFF"],
    );
    push(
        "assignment.retry_attempts",
        config.assignment.retry_attempts.to_string(),
        &["LEADFLOW_ASSIGNMENT_RETRY_ATTEMPTS"],
    );

    push(
        "logging.level",
        config.logging.level.clone(),
        &["LEADFLOW_LOGGING_LEVEL", "LEADFLOW_LOG_LEVEL"],
    );
    push(
        "logging.format",
        format!("{:?}", config.logging.format),
        &["LEADFLOW_LOGGING_FORMAT", "LEADFLOW_LOG_FORMAT"],
    );

    let tables = &config.tables;
    push(
        "tables.service_rates",
        format!("{} services ({})", tables.service_rates.len(), join_keys(&tables.service_rates)),
        &[],
    );
    push("tables.seasonal_modifiers", format!("{} months", tables.seasonal_modifiers.len()), &[]);
    push(
        "tables.follow_up_sla",
        format!(
            "urgent {}m, high {}m, medium {}m, low {}m",
            tables.follow_up_sla.urgent_minutes,
            tables.follow_up_sla.high_minutes,
            tables.follow_up_sla.medium_minutes,
            tables.follow_up_sla.low_minutes
        ),
        &[],
    );
    push(
        "tables.competitor_keywords",
        format!("{} keywords", tables.competitor_keywords.len()),
        &[],
    );
    push(
        "tables.recommendation_rules",
        format!("{} rules", tables.recommendation_rules.len()),
        &[],
    );

    lines.join("\n")
}

fn join_keys<V>(map: &std::collections::BTreeMap<String, V>) -> String {
    map.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], sources: &FieldSources<'_>) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = sources.doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
