use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use shopkeep_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field<'a> {
    key: &'a str,
    value: String,
    env_keys: &'a [&'a str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field<'static>> {
    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["SHOPKEEP_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["SHOPKEEP_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["SHOPKEEP_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "line.channel_access_token",
            value: redact_secret(Some(&config.line.channel_access_token)),
            env_keys: &["SHOPKEEP_LINE_CHANNEL_ACCESS_TOKEN"],
        },
        Field {
            key: "line.channel_secret",
            value: redact_secret(Some(&config.line.channel_secret)),
            env_keys: &["SHOPKEEP_LINE_CHANNEL_SECRET"],
        },
        Field {
            key: "line.api_base_url",
            value: config.line.api_base_url.clone(),
            env_keys: &["SHOPKEEP_LINE_API_BASE_URL"],
        },
        Field {
            key: "llm.provider",
            value: config.llm.provider.to_string(),
            env_keys: &["SHOPKEEP_LLM_PROVIDER"],
        },
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["SHOPKEEP_LLM_MODEL"],
        },
        Field {
            key: "llm.base_url",
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["SHOPKEEP_LLM_BASE_URL"],
        },
        Field {
            key: "llm.api_key",
            value: redact_secret(config.llm.api_key.as_ref()),
            env_keys: &["SHOPKEEP_LLM_API_KEY"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["SHOPKEEP_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.temperature",
            value: config.llm.temperature.to_string(),
            env_keys: &["SHOPKEEP_LLM_TEMPERATURE"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["SHOPKEEP_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["SHOPKEEP_SERVER_PORT", "PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["SHOPKEEP_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["SHOPKEEP_LOGGING_LEVEL", "SHOPKEEP_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: config.logging.format.as_str().to_string(),
            env_keys: &["SHOPKEEP_LOGGING_FORMAT", "SHOPKEEP_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("shopkeep.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/shopkeep.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
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

/// Shows only the last four characters of long secrets.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 12 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
