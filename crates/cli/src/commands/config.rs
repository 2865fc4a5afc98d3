use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use linekeeper_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigField {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields: [(&'static str, String, &[&str]); 7] = [
        ("database.url", config.database.url.clone(), &["LINEKEEPER_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["LINEKEEPER_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["LINEKEEPER_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["LINEKEEPER_LOGGING_LEVEL", "LINEKEEPER_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["LINEKEEPER_LOGGING_FORMAT", "LINEKEEPER_LOG_FORMAT"],
        ),
        (
            "dashboard.warning_threshold_pct",
            config.dashboard.warning_threshold_pct.to_string(),
            &["LINEKEEPER_DASHBOARD_WARNING_THRESHOLD_PCT"],
        ),
        (
            "dashboard.critical_threshold_pct",
            config.dashboard.critical_threshold_pct.to_string(),
            &["LINEKEEPER_DASHBOARD_CRITICAL_THRESHOLD_PCT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    let mut attributed = Vec::with_capacity(fields.len());
    for (key, value, env_keys) in fields {
        let source =
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, &source));
        attributed.push(ConfigField { key, value, source });
    }

    CommandResult::success_with_data("config", lines.join("\n"), attributed)
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("linekeeper.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/linekeeper.toml");
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

fn render_line(key: &str, value: &str, source: &str) -> String {
    format!("- {key} = {value} (source: {source})")
}
