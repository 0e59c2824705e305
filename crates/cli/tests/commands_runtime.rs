use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use leadflow_cli::commands::{config, migrate, rescore, score, seed, start};
use leadflow_core::config::LoadOptions;
use serde_json::{json, Value};

#[test]
fn start_returns_success_with_valid_env() {
    with_env(&[("LEADFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = start::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["default_staff"], "office");
    });
}

#[test]
fn start_returns_config_failure_for_out_of_range_retries() {
    with_env(
        &[
            ("LEADFLOW_DATABASE_URL", "sqlite::memory:"),
            ("LEADFLOW_ASSIGNMENT_RETRY_ATTEMPTS", "9"),
        ],
        || {
            let result = start::run(LoadOptions::default());
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "start");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn start_refuses_config_file_with_empty_service_rates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("leadflow.toml");
    fs::write(&config_path, "[tables]\nservice_rates = {}\n").expect("write config");

    with_env(&[("LEADFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let options = LoadOptions { config_path: Some(config_path.clone()), ..Default::default() };
        let result = start::run(options);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
        assert!(payload["message"].as_str().unwrap_or("").contains("service_rates"));
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("LEADFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("LEADFLOW_DATABASE_URL", url.as_str())], || {
        let first = seed::run(LoadOptions::default());
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["data"]["staff"], json!(["avery", "blake", "casey"]));

        let second = seed::run(LoadOptions::default());
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        assert_eq!(parse_payload(&second.output)["message"], first_payload["message"]);
    });
}

#[test]
fn score_then_rescore_round_trips_through_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let submission = dir.path().join("lead.json");
    fs::write(
        &submission,
        json!({
            "name": "Dana Reyes",
            "email": "dana@example.com",
            "phone": "512-555-0100",
            "address": "12 Elm St",
            "propertySize": "large",
            "services": ["lawn-mowing", "tree-service"],
            "urgency": "emergency",
            "locationSlug": "austin",
            "customerType": "residential",
            "pageViewCount": 5,
            "isReturnVisit": true,
            "usedAIPlanner": true
        })
        .to_string(),
    )
    .expect("write submission");
    let input = submission.display().to_string();

    with_env(&[("LEADFLOW_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(LoadOptions::default()).exit_code, 0);

        let scored = score::run(LoadOptions::default(), &input, false);
        assert_eq!(scored.exit_code, 0, "expected score success: {}", scored.output);
        let payload = parse_payload(&scored.output);
        assert_eq!(payload["data"]["leadPriority"], "URGENT");
        assert_eq!(payload["data"]["assignedTo"], "avery");
        assert_eq!(payload["data"]["status"], "SCORED");

        let id = payload["data"]["request"]["id"].as_str().expect("id").to_string();
        let rescored = rescore::run(LoadOptions::default(), &id);
        assert_eq!(rescored.exit_code, 0, "expected rescore success: {}", rescored.output);
        let rescored_payload = parse_payload(&rescored.output);
        assert_eq!(rescored_payload["data"]["leadScore"], payload["data"]["leadScore"]);
        assert_eq!(rescored_payload["data"]["followUpDue"], payload["data"]["followUpDue"]);
    });
}

#[test]
fn score_reports_every_validation_issue() {
    let dir = tempfile::tempdir().expect("tempdir");
    let submission = dir.path().join("bad.json");
    fs::write(&submission, json!({ "name": "Jamie", "email": "not-an-email" }).to_string())
        .expect("write submission");
    let input = submission.display().to_string();

    with_env(&[("LEADFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = score::run(LoadOptions::default(), &input, true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "validation");
        let fields = payload["data"]
            .as_array()
            .expect("issue list")
            .iter()
            .filter_map(|issue| issue["field"].as_str())
            .collect::<Vec<_>>();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"phone"));
        assert!(fields.contains(&"services"));
    });
}

#[test]
fn score_rejects_non_json_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let submission = dir.path().join("lead.txt");
    fs::write(&submission, "name=Jamie").expect("write submission");
    let input = submission.display().to_string();

    with_env(&[("LEADFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = score::run(LoadOptions::default(), &input, true);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "input");
    });
}

fn write_round_rock_lead(dir: &Path, name: &str, extra: Value) -> String {
    let mut body = json!({
        "name": "Kai Moreno",
        "email": "kai@example.com",
        "phone": "512-555-0163",
        "address": "48 Brushy Creek Rd",
        "propertySize": "medium",
        "services": ["lawn-mowing"],
        "locationSlug": "round-rock",
        "customerType": "residential"
    });
    if let (Value::Object(fields), Value::Object(extra)) = (&mut body, extra) {
        fields.extend(extra);
    }
    let path = dir.join(name);
    fs::write(&path, body.to_string()).expect("write submission");
    path.display().to_string()
}

#[test]
fn dry_run_leaves_workload_counters_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let input = write_round_rock_lead(dir.path(), "lead.json", json!({}));

    with_env(&[("LEADFLOW_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(LoadOptions::default()).exit_code, 0);

        // avery and casey both cover round-rock; avery is first in rotation at equal load.
        for _ in 0..2 {
            let preview = score::run(LoadOptions::default(), &input, true);
            assert_eq!(preview.exit_code, 0, "expected dry run success: {}", preview.output);
            assert_eq!(parse_payload(&preview.output)["data"]["assignedTo"], "avery");
        }

        let first = score::run(LoadOptions::default(), &input, false);
        let second = score::run(LoadOptions::default(), &input, false);
        assert_eq!(parse_payload(&first.output)["data"]["assignedTo"], "avery");
        assert_eq!(parse_payload(&second.output)["data"]["assignedTo"], "casey");
    });
}

#[test]
fn score_refuses_an_id_that_is_already_stored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let id = "6f1c2a8e-3b4d-4e5f-8a9b-0c1d2e3f4a5b";
    let original = write_round_rock_lead(dir.path(), "original.json", json!({ "id": id }));
    let resubmitted = write_round_rock_lead(
        dir.path(),
        "resubmitted.json",
        json!({ "id": id, "name": "Someone Else", "urgency": "emergency" }),
    );

    with_env(&[("LEADFLOW_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run(LoadOptions::default()).exit_code, 0);
        let stored = score::run(LoadOptions::default(), &original, false);
        assert_eq!(stored.exit_code, 0, "expected score success: {}", stored.output);

        let duplicate = score::run(LoadOptions::default(), &resubmitted, false);
        assert_eq!(duplicate.exit_code, 8);
        assert_eq!(parse_payload(&duplicate.output)["error_class"], "conflict");

        let rescored = rescore::run(LoadOptions::default(), id);
        assert_eq!(rescored.exit_code, 0, "expected rescore success: {}", rescored.output);
        let payload = parse_payload(&rescored.output);
        assert_eq!(payload["data"]["request"]["name"], "Kai Moreno");
        assert_eq!(payload["data"]["assignedTo"], "avery");

        // The refused duplicate took no workload slot, so the next lead goes to casey.
        let next = write_round_rock_lead(dir.path(), "next.json", json!({}));
        let routed = score::run(LoadOptions::default(), &next, false);
        assert_eq!(parse_payload(&routed.output)["data"]["assignedTo"], "casey");
    });
}

#[test]
fn rescore_distinguishes_bad_ids_from_missing_leads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("LEADFLOW_DATABASE_URL", url.as_str())], || {
        let malformed = rescore::run(LoadOptions::default(), "lead-42");
        assert_eq!(malformed.exit_code, 2);
        assert_eq!(parse_payload(&malformed.output)["error_class"], "input");

        let missing =
            rescore::run(LoadOptions::default(), "00000000-0000-0000-0000-000000000000");
        assert_eq!(missing.exit_code, 7);
        assert_eq!(parse_payload(&missing.output)["error_class"], "not_found");
    });
}

#[test]
fn config_attributes_env_sources() {
    let vars = [("LEADFLOW_DATABASE_URL", "sqlite::memory:"), ("LEADFLOW_LOG_LEVEL", "debug")];
    with_env(&vars, || {
        let output = config::run(LoadOptions::default());

        assert!(output.starts_with("effective config"));
        assert!(output
            .contains("- database.url = sqlite::memory: (source: env (LEADFLOW_DATABASE_URL))"));
        assert!(output.contains("- logging.level = debug (source: env (LEADFLOW_LOG_LEVEL))"));
        assert!(output.contains("- server.port = 8080 (source: default)"));
    });
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("leadflow.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LEADFLOW_DATABASE_URL",
        "LEADFLOW_DATABASE_MAX_CONNECTIONS",
        "LEADFLOW_DATABASE_TIMEOUT_SECS",
        "LEADFLOW_SERVER_BIND_ADDRESS",
        "LEADFLOW_SERVER_PORT",
        "LEADFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "LEADFLOW_ASSIGNMENT_DEFAULT_STAFF",
        "LEADFLOW_ASSIGNMENT_RETRY_ATTEMPTS",
        "LEADFLOW_LOGGING_LEVEL",
        "LEADFLOW_LOGGING_FORMAT",
        "LEADFLOW_LOG_LEVEL",
        "LEADFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
