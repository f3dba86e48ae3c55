use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{info, warn};

use citequotes_core::config::{LlmConfig, LlmProvider};

const BACKOFF_BASE_MS: u64 = 250;
const MAX_OUTPUT_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Talks to one hosted or local model over HTTP.
pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build LLM HTTP client")?;

        Ok(Self {
            client,
            provider: config.provider,
            endpoint: endpoint_for(config.provider, config.base_url.as_deref()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, system: &str, prompt: &str) -> reqwest::RequestBuilder {
        let body = request_body(self.provider, &self.model, system, prompt);
        let mut request = self.client.post(&self.endpoint).json(&body);
        let key = self.api_key.as_ref().map(|key| key.expose_secret().to_string());

        match (self.provider, key) {
            (LlmProvider::OpenAi, Some(key)) => request = request.bearer_auth(key),
            (LlmProvider::Anthropic, Some(key)) => {
                request = request
                    .header("x-api-key", key)
                    .header("anthropic-version", ANTHROPIC_VERSION);
            }
            (LlmProvider::Ollama, Some(key)) => request = request.bearer_auth(key),
            (_, None) => {}
        }
        request
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.max_retries {
            match self.request(system, prompt).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let value: Value = response
                            .json()
                            .await
                            .context("LLM response body was not valid JSON")?;
                        info!(
                            event_name = "llm.completion.succeeded",
                            provider = self.provider.as_str(),
                            attempt = attempt + 1,
                            "LLM completion succeeded"
                        );
                        return extract_text(self.provider, &value).ok_or_else(|| {
                            anyhow!("{} response did not contain any text", self.provider.as_str())
                        });
                    }

                    let body = response.text().await.unwrap_or_default();
                    if !status.is_server_error() {
                        return Err(anyhow!(
                            "{} API error ({status}): {}",
                            self.provider.as_str(),
                            truncate(&body, 500)
                        ));
                    }
                    warn!(
                        event_name = "llm.completion.retryable",
                        provider = self.provider.as_str(),
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        "LLM server error"
                    );
                    last_error = Some(anyhow!(
                        "{} API error ({status}): {}",
                        self.provider.as_str(),
                        truncate(&body, 500)
                    ));
                }
                Err(error) => {
                    warn!(
                        event_name = "llm.completion.retryable",
                        provider = self.provider.as_str(),
                        attempt = attempt + 1,
                        error = %error,
                        "LLM transport error"
                    );
                    last_error = Some(anyhow!("failed to reach {}: {error}", self.provider.as_str()));
                }
            }

            attempt += 1;
            if attempt <= self.max_retries {
                let backoff = BACKOFF_BASE_MS * (1u64 << (attempt - 1).min(6));
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow!("LLM request failed after {} attempts", self.max_retries + 1)
        }))
    }
}

pub fn endpoint_for(provider: LlmProvider, base_url: Option<&str>) -> String {
    let default_base = match provider {
        LlmProvider::OpenAi => "https://api.openai.com",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
    };
    let base = base_url.map(str::trim).filter(|b| !b.is_empty()).unwrap_or(default_base);
    let base = base.trim_end_matches('/');

    let path = match provider {
        LlmProvider::OpenAi => "/v1/chat/completions",
        LlmProvider::Anthropic => "/v1/messages",
        LlmProvider::Ollama => "/api/chat",
    };
    if base.ends_with(path) {
        base.to_string()
    } else {
        format!("{base}{path}")
    }
}

pub fn request_body(provider: LlmProvider, model: &str, system: &str, prompt: &str) -> Value {
    match provider {
        LlmProvider::OpenAi => json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.4,
        }),
        LlmProvider::Anthropic => json!({
            "model": model,
            "system": system,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        LlmProvider::Ollama => json!({
            "model": model,
            "stream": false,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        }),
    }
}

pub fn extract_text(provider: LlmProvider, value: &Value) -> Option<String> {
    let text = match provider {
        LlmProvider::OpenAi => value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
        LlmProvider::Anthropic => {
            let blocks = value.get("content")?.as_array()?;
            let joined = blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("");
            Some(joined)
        }
        LlmProvider::Ollama => {
            value.pointer("/message/content").and_then(Value::as_str).map(str::to_string)
        }
    };
    text.filter(|t| !t.trim().is_empty())
}

fn truncate(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}
