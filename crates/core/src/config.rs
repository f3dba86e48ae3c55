use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::import::ImportLimits;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token_ttl_hours: u64,
    pub role_change_per_minute: u32,
    pub generation_per_minute: u32,
    pub api_writes_per_minute: u32,
}

#[derive(Clone, Debug)]
pub struct ImportConfig {
    pub max_rows: usize,
    pub max_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }
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
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
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
                url: "sqlite://citequotes.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                max_retries: 2,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            auth: AuthConfig {
                token_ttl_hours: 24 * 30,
                role_change_per_minute: 10,
                generation_per_minute: 3,
                api_writes_per_minute: 60,
            },
            import: ImportConfig { max_rows: 1_000, max_bytes: 2 * 1024 * 1024 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl From<&ImportConfig> for ImportLimits {
    fn from(config: &ImportConfig) -> Self {
        Self { max_rows: config.max_rows, max_bytes: config.max_bytes }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
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

/// Effective configuration with secrets replaced by a presence flag.
#[derive(Clone, Debug, Serialize)]
pub struct RedactedConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub llm_provider: &'static str,
    pub llm_model: String,
    pub llm_base_url: Option<String>,
    pub llm_api_key_set: bool,
    pub server_address: String,
    pub token_ttl_hours: u64,
    pub import_max_rows: usize,
    pub import_max_bytes: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("citequotes.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn import_limits(&self) -> ImportLimits {
        ImportLimits::from(&self.import)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    pub fn redacted(&self) -> RedactedConfig {
        RedactedConfig {
            database_url: self.database.url.clone(),
            database_max_connections: self.database.max_connections,
            llm_provider: self.llm.provider.as_str(),
            llm_model: self.llm.model.clone(),
            llm_base_url: self.llm.base_url.clone(),
            llm_api_key_set: self
                .llm
                .api_key
                .as_ref()
                .map(|key| !key.expose_secret().trim().is_empty())
                .unwrap_or(false),
            server_address: self.server_address(),
            token_ttl_hours: self.auth.token_ttl_hours,
            import_max_rows: self.import.max_rows,
            import_max_bytes: self.import.max_bytes,
            log_level: self.logging.level.clone(),
            log_format: self.logging.format,
        }
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

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(token_ttl_hours) = auth.token_ttl_hours {
                self.auth.token_ttl_hours = token_ttl_hours;
            }
            if let Some(role_change_per_minute) = auth.role_change_per_minute {
                self.auth.role_change_per_minute = role_change_per_minute;
            }
            if let Some(generation_per_minute) = auth.generation_per_minute {
                self.auth.generation_per_minute = generation_per_minute;
            }
            if let Some(api_writes_per_minute) = auth.api_writes_per_minute {
                self.auth.api_writes_per_minute = api_writes_per_minute;
            }
        }

        if let Some(import) = patch.import {
            if let Some(max_rows) = import.max_rows {
                self.import.max_rows = max_rows;
            }
            if let Some(max_bytes) = import.max_bytes {
                self.import.max_bytes = max_bytes;
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
        if let Some(value) = read_env("CITEQUOTES_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CITEQUOTES_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_num("CITEQUOTES_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_num("CITEQUOTES_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CITEQUOTES_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CITEQUOTES_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CITEQUOTES_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CITEQUOTES_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CITEQUOTES_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_num("CITEQUOTES_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_num("CITEQUOTES_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("CITEQUOTES_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("CITEQUOTES_SERVER_PORT") {
            self.server.port = parse_num("CITEQUOTES_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_num("CITEQUOTES_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("CITEQUOTES_AUTH_TOKEN_TTL_HOURS") {
            self.auth.token_ttl_hours = parse_num("CITEQUOTES_AUTH_TOKEN_TTL_HOURS", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_AUTH_ROLE_CHANGE_PER_MINUTE") {
            self.auth.role_change_per_minute =
                parse_num("CITEQUOTES_AUTH_ROLE_CHANGE_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_AUTH_GENERATION_PER_MINUTE") {
            self.auth.generation_per_minute =
                parse_num("CITEQUOTES_AUTH_GENERATION_PER_MINUTE", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_AUTH_API_WRITES_PER_MINUTE") {
            self.auth.api_writes_per_minute =
                parse_num("CITEQUOTES_AUTH_API_WRITES_PER_MINUTE", &value)?;
        }

        if let Some(value) = read_env("CITEQUOTES_IMPORT_MAX_ROWS") {
            self.import.max_rows = parse_num("CITEQUOTES_IMPORT_MAX_ROWS", &value)?;
        }
        if let Some(value) = read_env("CITEQUOTES_IMPORT_MAX_BYTES") {
            self.import.max_bytes = parse_num("CITEQUOTES_IMPORT_MAX_BYTES", &value)?;
        }

        let log_level =
            read_env("CITEQUOTES_LOGGING_LEVEL").or_else(|| read_env("CITEQUOTES_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CITEQUOTES_LOGGING_FORMAT").or_else(|| read_env("CITEQUOTES_LOG_FORMAT"));
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
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_auth(&self.auth)?;
        validate_import(&self.import)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("citequotes.toml"), PathBuf::from("config/citequotes.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.max_retries > 5 {
        return Err(ConfigError::Validation("llm.max_retries must be at most 5".to_string()));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/anthropic providers \
                     (set CITEQUOTES_LLM_API_KEY)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    if auth.token_ttl_hours == 0 {
        return Err(ConfigError::Validation(
            "auth.token_ttl_hours must be greater than zero".to_string(),
        ));
    }

    let limits = [
        ("auth.role_change_per_minute", auth.role_change_per_minute),
        ("auth.generation_per_minute", auth.generation_per_minute),
        ("auth.api_writes_per_minute", auth.api_writes_per_minute),
    ];
    if let Some((key, _)) = limits.iter().find(|(_, value)| *value == 0) {
        return Err(ConfigError::Validation(format!("{key} must be greater than zero")));
    }

    Ok(())
}

fn validate_import(import: &ImportConfig) -> Result<(), ConfigError> {
    if import.max_rows == 0 || import.max_rows > 100_000 {
        return Err(ConfigError::Validation(
            "import.max_rows must be in range 1..=100000".to_string(),
        ));
    }

    if import.max_bytes < 1024 {
        return Err(ConfigError::Validation(
            "import.max_bytes must be at least 1024".to_string(),
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

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    import: Option<ImportPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    token_ttl_hours: Option<u64>,
    role_change_per_minute: Option<u32>,
    generation_per_minute: Option<u32>,
    api_writes_per_minute: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ImportPatch {
    max_rows: Option<usize>,
    max_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    type TestResult = Result<(), String>;

    /// Runs `body` with `vars` set, holding the process-wide env lock, and
    /// removes the vars again whatever the outcome.
    fn with_env(vars: &[(&str, &str)], body: impl FnOnce() -> TestResult) -> TestResult {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for (key, value) in vars {
            env::set_var(key, value);
        }
        let outcome = body();
        for (key, _) in vars {
            env::remove_var(key);
        }
        outcome
    }

    fn check(condition: bool, message: &str) -> TestResult {
        condition.then_some(()).ok_or_else(|| message.to_string())
    }

    fn write_toml(dir: &TempDir, contents: &str) -> Result<PathBuf, String> {
        let path = dir.path().join("citequotes.toml");
        fs::write(&path, contents).map_err(|err| err.to_string())?;
        Ok(path)
    }

    fn load(options: LoadOptions) -> Result<AppConfig, String> {
        AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))
    }

    #[test]
    fn defaults_load_without_a_file() -> TestResult {
        with_env(&[], || {
            let config = load(LoadOptions::default())?;
            check(config.llm.provider == LlmProvider::Ollama, "default provider is ollama")?;
            check(config.server_address() == "127.0.0.1:8080", "default address")?;
            check(config.import_limits().max_rows == 1_000, "default import row limit")?;
            check(config.auth.role_change_per_minute == 10, "default role change budget")?;
            check(matches!(config.logging.format, LogFormat::Compact), "compact logging")
        })
    }

    #[test]
    fn toml_values_interpolate_environment_variables() -> TestResult {
        with_env(&[("TEST_CQ_LLM_KEY", "sk-from-env")], || {
            let dir = TempDir::new().map_err(|err| err.to_string())?;
            let path = write_toml(
                &dir,
                "[llm]\nprovider = \"openai\"\napi_key = \"${TEST_CQ_LLM_KEY}\"\n\
                 base_url = \"https://api.openai.com/v1\"\nmodel = \"gpt-4o-mini\"\n\n\
                 [import]\nmax_rows = 50\n",
            )?;

            let config = load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })?;
            check(config.llm.provider == LlmProvider::OpenAi, "provider from file")?;
            let key = config.llm.api_key.as_ref().map(|k| k.expose_secret().to_string());
            check(key.as_deref() == Some("sk-from-env"), "api key interpolated from env")?;
            check(config.import.max_rows == 50, "import section read from file")
        })
    }

    #[test]
    fn missing_interpolation_variable_is_an_error() -> TestResult {
        with_env(&[], || {
            let dir = TempDir::new().map_err(|err| err.to_string())?;
            let path = write_toml(&dir, "[llm]\nmodel = \"${CQ_TEST_UNSET_MODEL}\"\n")?;

            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Err(ConfigError::MissingEnvInterpolation { var }) => {
                    check(var == "CQ_TEST_UNSET_MODEL", "missing var is named")
                }
                other => Err(format!("unexpected outcome: {:?}", other.map(|_| ()))),
            }
        })
    }

    #[test]
    fn short_logging_aliases_are_read() -> TestResult {
        with_env(&[("CITEQUOTES_LOG_LEVEL", "warn"), ("CITEQUOTES_LOG_FORMAT", "json")], || {
            let config = load(LoadOptions::default())?;
            check(config.logging.level == "warn", "level from CITEQUOTES_LOG_LEVEL")?;
            check(matches!(config.logging.format, LogFormat::Json), "format from alias")
        })
    }

    #[test]
    fn overrides_beat_env_which_beats_file() -> TestResult {
        let env = [
            ("CITEQUOTES_DATABASE_URL", "sqlite://from-env.db"),
            ("CITEQUOTES_SERVER_PORT", "9090"),
        ];
        with_env(&env, || {
            let dir = TempDir::new().map_err(|err| err.to_string())?;
            let path = write_toml(
                &dir,
                "[database]\nurl = \"sqlite://from-file.db\"\n\n[server]\nport = 7070\n\n\
                 [auth]\nrole_change_per_minute = 4\n\n[logging]\nlevel = \"warn\"\n",
            )?;

            let config = load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })?;

            check(config.database.url == "sqlite://from-override.db", "override url wins")?;
            check(config.logging.level == "debug", "override log level wins")?;
            check(config.server.port == 9090, "env port beats file")?;
            check(config.auth.role_change_per_minute == 4, "file value applies")
        })
    }

    #[test]
    fn hosted_provider_without_key_names_the_setting() -> TestResult {
        with_env(&[("CITEQUOTES_LLM_PROVIDER", "anthropic")], || {
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::Validation(message)) => {
                    check(message.contains("llm.api_key"), "message names llm.api_key")
                }
                other => Err(format!("unexpected outcome: {:?}", other.map(|_| ()))),
            }
        })
    }

    #[test]
    fn invalid_numeric_env_is_reported_with_its_key() -> TestResult {
        with_env(&[("CITEQUOTES_IMPORT_MAX_ROWS", "lots")], || {
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                    check(key == "CITEQUOTES_IMPORT_MAX_ROWS", "key is named")
                }
                other => Err(format!("unexpected outcome: {:?}", other.map(|_| ()))),
            }
        })
    }

    #[test]
    fn zero_rate_limits_are_rejected() -> TestResult {
        with_env(&[("CITEQUOTES_AUTH_GENERATION_PER_MINUTE", "0")], || {
            match AppConfig::load(LoadOptions::default()) {
                Err(ConfigError::Validation(message)) => {
                    check(message.contains("auth.generation_per_minute"), "limit is named")
                }
                other => Err(format!("unexpected outcome: {:?}", other.map(|_| ()))),
            }
        })
    }

    #[test]
    fn api_key_never_appears_in_debug_or_redacted_output() -> TestResult {
        let env =
            [("CITEQUOTES_LLM_PROVIDER", "openai"), ("CITEQUOTES_LLM_API_KEY", "sk-secret-value")];
        with_env(&env, || {
            let config = load(LoadOptions::default())?;
            check(!format!("{config:?}").contains("sk-secret-value"), "debug leaks the key")?;

            let redacted = config.redacted();
            let json = serde_json::to_string(&redacted).map_err(|err| err.to_string())?;
            check(!json.contains("sk-secret-value"), "redacted config leaks the key")?;
            check(redacted.llm_api_key_set, "redaction reports key presence")
        })
    }
}
