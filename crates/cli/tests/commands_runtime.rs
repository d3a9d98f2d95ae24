use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use shopkeep_cli::commands::{ask, config, doctor, migrate, seed};

const CREDENTIALS: [(&str, &str); 3] = [
    ("SHOPKEEP_LINE_CHANNEL_ACCESS_TOKEN", "line-token-test"),
    ("SHOPKEEP_LINE_CHANNEL_SECRET", "line-secret-test"),
    ("SHOPKEEP_LLM_API_KEY", "gemini-key-test"),
];

fn file_database_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("shopkeep.db").display())
}

#[test]
fn migrate_returns_success_with_valid_env() {
    let mut vars = CREDENTIALS.to_vec();
    vars.push(("SHOPKEEP_DATABASE_URL", "sqlite::memory:"));
    with_env(&vars, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_line_credentials() {
    with_env(&[("SHOPKEEP_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_inserts_sample_catalog_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = file_database_url(dir.path());
    let mut vars: Vec<(&str, &str)> = CREDENTIALS.to_vec();
    vars.push(("SHOPKEEP_DATABASE_URL", database_url.as_str()));

    with_env(&vars, || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(
            first_payload["message"],
            "sample catalog inserted (4 products): iPhone 15, MacBook Air M3, Dell XPS 15, Keyboard"
        );

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(
            second_payload["message"],
            "catalog already holds 4 product(s); sample catalog not inserted"
        );
    });
}

#[test]
fn doctor_json_reports_each_check() {
    let mut vars = CREDENTIALS.to_vec();
    vars.push(("SHOPKEEP_DATABASE_URL", "sqlite::memory:"));
    with_env(&vars, || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected all checks to pass: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().filter_map(|check| check["name"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(
            names,
            vec!["config_validation", "line_credentials", "llm_client", "database_connectivity"]
        );
    });
}

#[test]
fn doctor_exits_with_config_code_when_config_is_invalid() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("- [fail] config_validation"));
    });
}

#[test]
fn config_output_redacts_secrets() {
    let mut vars = CREDENTIALS.to_vec();
    vars.push(("SHOPKEEP_LINE_CHANNEL_SECRET", "super-secret-channel-value"));
    with_env(&vars, || {
        let output = config::run();

        assert!(!output.contains("super-secret-channel-value"));
        assert!(!output.contains("gemini-key-test"));
        assert!(output.contains(
            "- line.channel_secret = ***alue (source: env (SHOPKEEP_LINE_CHANNEL_SECRET))"
        ));
        assert!(output.contains("- llm.provider = gemini (source: default)"));
    });
}

#[test]
fn ask_fails_fast_without_configuration() {
    with_env(&[], || {
        let result = ask::run("How much is the iPhone 15?", true);

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["command"], "ask");
    });
}

#[test]
fn ask_with_unreachable_model_still_produces_a_reply() {
    let vars = [
        ("SHOPKEEP_LINE_CHANNEL_ACCESS_TOKEN", "line-token-test"),
        ("SHOPKEEP_LINE_CHANNEL_SECRET", "line-secret-test"),
        ("SHOPKEEP_LLM_PROVIDER", "ollama"),
        ("SHOPKEEP_LLM_BASE_URL", "http://127.0.0.1:9"),
        ("SHOPKEEP_LLM_TIMEOUT_SECS", "2"),
    ];
    with_env(&vars, || {
        let result = ask::run("How much is the iPhone 15?", true);

        assert_eq!(result.exit_code, 5);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "turn_failed");
        assert!(!payload["message"].as_str().unwrap_or("").is_empty());
        assert_eq!(payload["details"]["termination"], "failed");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SHOPKEEP_DATABASE_URL",
        "SHOPKEEP_DATABASE_MAX_CONNECTIONS",
        "SHOPKEEP_DATABASE_TIMEOUT_SECS",
        "SHOPKEEP_LINE_CHANNEL_ACCESS_TOKEN",
        "SHOPKEEP_LINE_CHANNEL_SECRET",
        "SHOPKEEP_LINE_API_BASE_URL",
        "SHOPKEEP_LLM_PROVIDER",
        "SHOPKEEP_LLM_API_KEY",
        "SHOPKEEP_LLM_BASE_URL",
        "SHOPKEEP_LLM_MODEL",
        "SHOPKEEP_LLM_TIMEOUT_SECS",
        "SHOPKEEP_LLM_TEMPERATURE",
        "SHOPKEEP_SERVER_BIND_ADDRESS",
        "SHOPKEEP_SERVER_PORT",
        "SHOPKEEP_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SHOPKEEP_LOGGING_LEVEL",
        "SHOPKEEP_LOGGING_FORMAT",
        "SHOPKEEP_LOG_LEVEL",
        "SHOPKEEP_LOG_FORMAT",
        "PORT",
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
