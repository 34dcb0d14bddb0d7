use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use clubbot_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let env_key = format!("CLUBBOT_{}", key_path.replace('.', "_").to_ascii_uppercase());
        lines.push(render_line(
            key_path,
            &value,
            field_source(
                key_path,
                Some(env_key.as_str()),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let signing_secret =
        if config.slack.signing_secret.is_some() { "<redacted>" } else { "<unset>" };

    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("slack.bot_token", redact_token(config.slack.bot_token.expose_secret())),
        ("slack.signing_secret", signing_secret.to_string()),
        ("slack.api_base_url", config.slack.api_base_url.clone()),
        ("dashboard.username", config.dashboard.username.clone()),
        ("dashboard.password", "<redacted>".to_string()),
        ("dashboard.verify_sessions", config.dashboard.verify_sessions.to_string()),
        ("dashboard.session_ttl_secs", config.dashboard.session_ttl_secs.to_string()),
        ("dashboard.secure_cookie", config.dashboard.secure_cookie.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("scheduler.enabled", config.scheduler.enabled.to_string()),
        (
            "scheduler.name_check_interval_secs",
            config.scheduler.name_check_interval_secs.to_string(),
        ),
        ("scheduler.warning_cooldown_secs", config.scheduler.warning_cooldown_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format).to_ascii_lowercase()),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("clubbot.toml"), PathBuf::from("config/clubbot.toml")]
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
        if env::var_os(env_key).is_some() {
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
