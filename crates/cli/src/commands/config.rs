use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use citequotes_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

/// `(key path, environment variable)` for every reported setting.
const FIELDS: &[(&str, &str)] = &[
    ("database.url", "CITEQUOTES_DATABASE_URL"),
    ("database.max_connections", "CITEQUOTES_DATABASE_MAX_CONNECTIONS"),
    ("llm.provider", "CITEQUOTES_LLM_PROVIDER"),
    ("llm.model", "CITEQUOTES_LLM_MODEL"),
    ("llm.base_url", "CITEQUOTES_LLM_BASE_URL"),
    ("llm.api_key", "CITEQUOTES_LLM_API_KEY"),
    ("server.bind_address", "CITEQUOTES_SERVER_BIND_ADDRESS"),
    ("server.port", "CITEQUOTES_SERVER_PORT"),
    ("auth.token_ttl_hours", "CITEQUOTES_AUTH_TOKEN_TTL_HOURS"),
    ("import.max_rows", "CITEQUOTES_IMPORT_MAX_ROWS"),
    ("import.max_bytes", "CITEQUOTES_IMPORT_MAX_BYTES"),
    ("logging.level", "CITEQUOTES_LOGGING_LEVEL"),
    ("logging.format", "CITEQUOTES_LOGGING_FORMAT"),
];

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, env_key) in FIELDS {
        let source =
            field_source(key, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &display_value(&config, key), source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn display_value(config: &AppConfig, key: &str) -> String {
    let redacted = config.redacted();
    match key {
        "database.url" => redacted.database_url,
        "database.max_connections" => redacted.database_max_connections.to_string(),
        "llm.provider" => redacted.llm_provider.to_string(),
        "llm.model" => redacted.llm_model,
        "llm.base_url" => redacted.llm_base_url.unwrap_or_else(|| "<unset>".to_string()),
        "llm.api_key" => {
            if redacted.llm_api_key_set { "<redacted>" } else { "<unset>" }.to_string()
        }
        "server.bind_address" => config.server.bind_address.clone(),
        "server.port" => config.server.port.to_string(),
        "auth.token_ttl_hours" => redacted.token_ttl_hours.to_string(),
        "import.max_rows" => redacted.import_max_rows.to_string(),
        "import.max_bytes" => redacted.import_max_bytes.to_string(),
        "logging.level" => redacted.log_level,
        "logging.format" => format!("{:?}", redacted.log_format).to_ascii_lowercase(),
        _ => "<unknown>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("citequotes.toml"), PathBuf::from("config/citequotes.toml")]
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

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: toml::Value = "[llm]\nmodel = \"llama3.1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
