use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub notify: NotifyConfig,
    pub submit: SubmitConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub graceful_shutdown_secs: u64,
}

/// Brevo transactional-email settings. Disabled by default so local runs
/// never need provider credentials.
#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub api_key: Option<SecretString>,
    pub sender_name: String,
    pub sender_email: String,
    pub staff_email: String,
    pub queue_capacity: usize,
}

/// Outbound submit-gateway settings used by the wizard client.
#[derive(Clone, Debug)]
pub struct SubmitConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub notify_enabled: Option<bool>,
    pub notify_api_key: Option<String>,
    pub submit_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://medicert.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                allowed_origins: Vec::new(),
                graceful_shutdown_secs: 15,
            },
            notify: NotifyConfig {
                enabled: false,
                api_base_url: "https://api.brevo.com".to_string(),
                api_key: None,
                sender_name: "Medicert".to_string(),
                sender_email: String::new(),
                staff_email: String::new(),
                queue_capacity: 64,
            },
            submit: SubmitConfig {
                base_url: "http://127.0.0.1:8080".to_string(),
                timeout_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("medicert.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(allowed_origins) = server.allowed_origins {
                self.server.allowed_origins = allowed_origins;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(notify) = patch.notify {
            if let Some(enabled) = notify.enabled {
                self.notify.enabled = enabled;
            }
            if let Some(api_base_url) = notify.api_base_url {
                self.notify.api_base_url = api_base_url;
            }
            if let Some(api_key_value) = notify.api_key {
                self.notify.api_key = Some(secret_value(api_key_value));
            }
            if let Some(sender_name) = notify.sender_name {
                self.notify.sender_name = sender_name;
            }
            if let Some(sender_email) = notify.sender_email {
                self.notify.sender_email = sender_email;
            }
            if let Some(staff_email) = notify.staff_email {
                self.notify.staff_email = staff_email;
            }
            if let Some(queue_capacity) = notify.queue_capacity {
                self.notify.queue_capacity = queue_capacity;
            }
        }

        if let Some(submit) = patch.submit {
            if let Some(base_url) = submit.base_url {
                self.submit.base_url = base_url;
            }
            if let Some(timeout_secs) = submit.timeout_secs {
                self.submit.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("MEDICERT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("MEDICERT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("MEDICERT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("MEDICERT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("MEDICERT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("MEDICERT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("MEDICERT_SERVER_PORT") {
            self.server.port = parse_u16("MEDICERT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("MEDICERT_SERVER_ALLOWED_ORIGINS") {
            self.server.allowed_origins = value
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }
        if let Some(value) = read_env("MEDICERT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("MEDICERT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("MEDICERT_NOTIFY_ENABLED") {
            self.notify.enabled = parse_bool("MEDICERT_NOTIFY_ENABLED", &value)?;
        }
        if let Some(value) = read_env("MEDICERT_NOTIFY_API_BASE_URL") {
            self.notify.api_base_url = value;
        }
        if let Some(value) = read_env("MEDICERT_NOTIFY_API_KEY") {
            self.notify.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("MEDICERT_NOTIFY_SENDER_NAME") {
            self.notify.sender_name = value;
        }
        if let Some(value) = read_env("MEDICERT_NOTIFY_SENDER_EMAIL") {
            self.notify.sender_email = value;
        }
        if let Some(value) = read_env("MEDICERT_NOTIFY_STAFF_EMAIL") {
            self.notify.staff_email = value;
        }
        if let Some(value) = read_env("MEDICERT_NOTIFY_QUEUE_CAPACITY") {
            self.notify.queue_capacity =
                parse_u32("MEDICERT_NOTIFY_QUEUE_CAPACITY", &value)? as usize;
        }

        if let Some(value) = read_env("MEDICERT_SUBMIT_BASE_URL") {
            self.submit.base_url = value;
        }
        if let Some(value) = read_env("MEDICERT_SUBMIT_TIMEOUT_SECS") {
            self.submit.timeout_secs = parse_u64("MEDICERT_SUBMIT_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("MEDICERT_LOGGING_LEVEL").or_else(|| read_env("MEDICERT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("MEDICERT_LOGGING_FORMAT").or_else(|| read_env("MEDICERT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.notify_enabled {
            self.notify.enabled = enabled;
        }
        if let Some(api_key) = overrides.notify_api_key {
            self.notify.api_key = Some(secret_value(api_key));
        }
        if let Some(base_url) = overrides.submit_base_url {
            self.submit.base_url = base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_notify(&self.notify)?;
        validate_submit(&self.submit)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("medicert.toml"), PathBuf::from("config/medicert.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    for origin in &server.allowed_origins {
        if !origin.starts_with("http://") && !origin.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "server.allowed_origins entry `{origin}` must start with http:// or https://"
            )));
        }
    }

    Ok(())
}

fn validate_notify(notify: &NotifyConfig) -> Result<(), ConfigError> {
    if !notify.api_base_url.starts_with("http://") && !notify.api_base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "notify.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if notify.queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "notify.queue_capacity must be greater than zero".to_string(),
        ));
    }

    if notify.enabled {
        let key_missing = notify
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if key_missing {
            return Err(ConfigError::Validation(
                "notify.api_key is required when notifications are enabled".to_string(),
            ));
        }
        if !notify.sender_email.contains('@') {
            return Err(ConfigError::Validation(
                "notify.sender_email must be a valid address when notifications are enabled"
                    .to_string(),
            ));
        }
        if !notify.staff_email.contains('@') {
            return Err(ConfigError::Validation(
                "notify.staff_email must be a valid address when notifications are enabled"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_submit(submit: &SubmitConfig) -> Result<(), ConfigError> {
    if !submit.base_url.starts_with("http://") && !submit.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "submit.base_url must start with http:// or https://".to_string(),
        ));
    }

    if submit.timeout_secs == 0 || submit.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "submit.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    notify: Option<NotifyPatch>,
    submit: Option<SubmitPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotifyPatch {
    enabled: Option<bool>,
    api_base_url: Option<String>,
    api_key: Option<String>,
    sender_name: Option<String>,
    sender_email: Option<String>,
    staff_email: Option<String>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SubmitPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
