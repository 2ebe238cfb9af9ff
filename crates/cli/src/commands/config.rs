use medicert_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;

use crate::commands::CommandResult;

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

    let api_key = config
        .notify
        .api_key
        .as_ref()
        .map(|key| redact(key.expose_secret()))
        .unwrap_or_else(|| "(unset)".to_string());

    let lines = [
        "effective config (source precedence: override > env > file > default):".to_string(),
        format!("  database.url = {}", config.database.url),
        format!("  database.max_connections = {}", config.database.max_connections),
        format!("  database.timeout_secs = {}", config.database.timeout_secs),
        format!("  server.bind_address = {}", config.server.bind_address),
        format!("  server.port = {}", config.server.port),
        format!("  server.allowed_origins = {:?}", config.server.allowed_origins),
        format!("  server.graceful_shutdown_secs = {}", config.server.graceful_shutdown_secs),
        format!("  notify.enabled = {}", config.notify.enabled),
        format!("  notify.api_base_url = {}", config.notify.api_base_url),
        format!("  notify.api_key = {api_key}"),
        format!("  notify.sender_name = {}", config.notify.sender_name),
        format!("  notify.sender_email = {}", config.notify.sender_email),
        format!("  notify.staff_email = {}", config.notify.staff_email),
        format!("  notify.queue_capacity = {}", config.notify.queue_capacity),
        format!("  submit.base_url = {}", config.submit.base_url),
        format!("  submit.timeout_secs = {}", config.submit.timeout_secs),
        format!("  logging.level = {}", config.logging.level),
        format!("  logging.format = {:?}", config.logging.format),
    ];

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn redact(secret: &str) -> String {
    if secret.len() <= 4 {
        return "****".to_string();
    }
    format!("{}****", &secret[..4])
}
