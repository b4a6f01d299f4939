use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use parkwise_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// Effective configuration, one line per key with its source. Secrets are
/// never printed.
pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
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

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let pipeline = &config.pipeline;
    let entries: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("PARKWISE_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("PARKWISE_DATABASE_MAX_CONNECTIONS"),
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            Some("PARKWISE_DATABASE_TIMEOUT_SECS"),
        ),
        ("llm.provider", format!("{:?}", config.llm.provider), Some("PARKWISE_LLM_PROVIDER")),
        ("llm.model", config.llm.model.clone(), Some("PARKWISE_LLM_MODEL")),
        (
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            Some("PARKWISE_LLM_BASE_URL"),
        ),
        (
            "llm.api_key",
            redact_key(config.llm.api_key.as_ref().map(|key| key.expose_secret())),
            Some("PARKWISE_LLM_API_KEY"),
        ),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), Some("PARKWISE_LLM_TIMEOUT_SECS")),
        ("llm.temperature", config.llm.temperature.to_string(), None),
        (
            "pipeline.interactive",
            pipeline.interactive.to_string(),
            Some("PARKWISE_PIPELINE_INTERACTIVE"),
        ),
        (
            "pipeline.rebalance_floor",
            pipeline.rebalance_floor.to_string(),
            Some("PARKWISE_PIPELINE_REBALANCE_FLOOR"),
        ),
        (
            "pipeline.rebalance_ceiling",
            pipeline.rebalance_ceiling.to_string(),
            Some("PARKWISE_PIPELINE_REBALANCE_CEILING"),
        ),
        (
            "pipeline.question_limit",
            pipeline.question_limit.to_string(),
            Some("PARKWISE_PIPELINE_QUESTION_LIMIT"),
        ),
        ("pipeline.retrieval_top_k", pipeline.retrieval_top_k.to_string(), None),
        ("pipeline.retrieval_context_limit", pipeline.retrieval_context_limit.to_string(), None),
        ("pipeline.interest_batch_size", pipeline.interest_batch_size.to_string(), None),
        ("pipeline.scenario_top_n", pipeline.scenario_top_n.to_string(), None),
        ("pipeline.max_distributed_accounts", pipeline.max_distributed_accounts.to_string(), None),
        ("logging.level", config.logging.level.clone(), Some("PARKWISE_LOGGING_LEVEL")),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            Some("PARKWISE_LOGGING_FORMAT"),
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("parkwise.toml"), PathBuf::from("config/parkwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var(env_key).map(|value| !value.trim().is_empty()).unwrap_or(false) {
            return format!("env ({env_key})");
        }
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

fn redact_key(key: Option<&str>) -> String {
    match key.map(str::trim) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(key) => match key.split_once('-') {
            Some((prefix, _)) => format!("{prefix}-***"),
            None => "<redacted>".to_string(),
        },
    }
}
