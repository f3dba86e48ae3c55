//! Suggests bibliographic details for a half-filled submission form.
//!
//! Suggestions are returned to the caller as-is; nothing here writes to the
//! archive. Submitters accept or discard them in the form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use citequotes_core::domain::quote::normalize_tags;
use citequotes_core::validation::url_like;

use crate::generation::{extract_json, AssistError};
use crate::guardrails::{GuardrailIntent, GuardrailPolicy};
use crate::llm::LlmClient;

pub const PREFILL_SYSTEM_PROMPT: &str = "You help archivists cite quotes correctly. Given a \
quote and/or its author, reply with a single JSON object and nothing else, using the keys \
quote_text, author, quote_date, context, citation, source_title, source_author, \
source_publisher, source_date, source_url and tags (array of strings). Use null for anything \
you are not confident about. Never invent URLs.";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrefillRequest {
    pub quote_text: Option<String>,
    pub author: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefillSuggestion {
    pub quote_text: Option<String>,
    pub author: Option<String>,
    pub quote_date: Option<String>,
    pub context: Option<String>,
    pub citation: Option<String>,
    pub source_title: Option<String>,
    pub source_author: Option<String>,
    pub source_publisher: Option<String>,
    pub source_date: Option<String>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
}

impl PrefillSuggestion {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

pub fn build_prompt(request: &PrefillRequest) -> String {
    let mut prompt = String::from("Complete the citation details for this quote.");
    if let Some(text) = non_blank(request.quote_text.as_deref()) {
        prompt.push_str(&format!("\nQuote: \"{text}\""));
    }
    if let Some(author) = non_blank(request.author.as_deref()) {
        prompt.push_str(&format!("\nAuthor: {author}"));
    }
    prompt
}

pub async fn suggest(
    client: &dyn LlmClient,
    policy: &GuardrailPolicy,
    request: &PrefillRequest,
) -> Result<PrefillSuggestion, AssistError> {
    AssistError::from_decision(policy.evaluate(&GuardrailIntent::Prefill {
        quote_text: request.quote_text.as_deref(),
        author: request.author.as_deref(),
    }))?;

    let raw = client
        .complete(PREFILL_SYSTEM_PROMPT, &build_prompt(request))
        .await
        .map_err(AssistError::Llm)?;
    let suggestion = parse_suggestion(&raw)?;

    info!(
        event_name = "cq.prefill.suggested",
        has_source = suggestion.source_title.is_some(),
        tag_count = suggestion.tags.len(),
        "prefill suggestion ready"
    );
    Ok(suggestion)
}

pub fn parse_suggestion(raw: &str) -> Result<PrefillSuggestion, AssistError> {
    let json = extract_json(raw)
        .ok_or_else(|| AssistError::Malformed("no JSON found in response".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| AssistError::Malformed(e.to_string()))?;
    let object = match value {
        Value::Object(object) => object,
        Value::Array(mut items) if !items.is_empty() => match items.swap_remove(0) {
            Value::Object(object) => object,
            _ => return Err(AssistError::Malformed("expected a JSON object".to_string())),
        },
        _ => return Err(AssistError::Malformed("expected a JSON object".to_string())),
    };

    let text = |key: &str| object.get(key).and_then(scalar).filter(|v| !v.is_empty());
    let tags = match object.get("tags") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
        Some(Value::String(joined)) => joined.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };

    Ok(PrefillSuggestion {
        quote_text: text("quote_text"),
        author: text("author"),
        quote_date: text("quote_date"),
        context: text("context"),
        citation: text("citation"),
        source_title: text("source_title"),
        source_author: text("source_author"),
        source_publisher: text("source_publisher"),
        source_date: text("source_date"),
        source_url: text("source_url").filter(|url| url_like("source_url", url).is_ok()),
        tags: normalize_tags(tags),
    })
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
