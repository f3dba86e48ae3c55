use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use citequotes_core::domain::submission::{SubmissionForm, TranslationForm};
use citequotes_core::validation::url_like;

use crate::guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
use crate::llm::LlmClient;

pub const GENERATION_SYSTEM_PROMPT: &str = "You are a careful research assistant for a quote \
citation archive. Only return quotes you can attribute to a real, verifiable source. Reply with \
a JSON array and nothing else. Each element is an object with the keys quote_text, author, \
quote_date, context, citation, source_title, source_author, source_publisher, source_date, \
source_url, tags (array of strings) and translations (array of {language, translated_text}). \
Use null for anything you do not know.";

fn default_count() -> u32 {
    5
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub forms: Vec<SubmissionForm>,
    pub dropped: usize,
}

#[derive(Debug, Error)]
pub enum AssistError {
    #[error("{message}")]
    Rejected { reason_code: &'static str, message: String },
    #[error("language model request failed: {0}")]
    Llm(#[source] anyhow::Error),
    #[error("language model returned malformed output: {0}")]
    Malformed(String),
}

impl AssistError {
    pub(crate) fn from_decision(decision: GuardrailDecision) -> Result<(), Self> {
        match decision {
            GuardrailDecision::Allow => Ok(()),
            GuardrailDecision::Deny { reason_code, user_message } => {
                Err(Self::Rejected { reason_code, message: user_message })
            }
        }
    }
}

pub fn build_prompt(request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Find {} notable, accurately attributed quotes about: {}.",
        request.count,
        request.topic.trim()
    );
    if let Some(author) = request.author.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        prompt.push_str(&format!(" Only include quotes by {author}."));
    }
    if let Some(language) = request.language.as_deref().map(str::trim).filter(|l| !l.is_empty())
    {
        prompt.push_str(&format!(" Include a translation into {language} for each quote."));
    }
    prompt.push_str(" Return at most that many entries.");
    prompt
}

pub async fn generate(
    client: &dyn LlmClient,
    policy: &GuardrailPolicy,
    request: &GenerationRequest,
) -> Result<GenerationOutcome, AssistError> {
    AssistError::from_decision(policy.evaluate(&GuardrailIntent::Generate {
        topic: &request.topic,
        count: request.count,
        author: request.author.as_deref(),
    }))?;

    let raw = client
        .complete(GENERATION_SYSTEM_PROMPT, &build_prompt(request))
        .await
        .map_err(AssistError::Llm)?;
    let outcome = parse_response(&raw, request.count as usize)?;

    info!(
        event_name = "cq.generation.parsed",
        accepted = outcome.forms.len(),
        dropped = outcome.dropped,
        "parsed generated quotes"
    );
    Ok(outcome)
}

/// Parses model output into validated forms, keeping at most `limit`.
pub fn parse_response(raw: &str, limit: usize) -> Result<GenerationOutcome, AssistError> {
    let json = extract_json(raw)
        .ok_or_else(|| AssistError::Malformed("no JSON found in response".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| AssistError::Malformed(e.to_string()))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("quotes") {
            Some(Value::Array(items)) => items,
            _ => vec![Value::Object(object)],
        },
        _ => return Err(AssistError::Malformed("expected a JSON array".to_string())),
    };

    let mut forms = Vec::new();
    let mut dropped = 0;
    for entry in entries {
        let form = serde_json::from_value::<GeneratedQuote>(entry)
            .ok()
            .and_then(|generated| generated.into_form().validate().ok());
        match form {
            Some(form) if forms.len() < limit => forms.push(form),
            _ => dropped += 1,
        }
    }

    Ok(GenerationOutcome { forms, dropped })
}

/// Finds the JSON payload inside a model reply, skipping prose and code fences.
pub fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let body = match trimmed.find("```") {
        Some(start) => {
            let after = &trimmed[start + 3..];
            let after = after.find('\n').map_or(after, |newline| &after[newline + 1..]);
            after.find("```").map_or(after, |end| &after[..end])
        }
        None => trimmed,
    };

    let start = body.find(['[', '{'])?;
    let closing = if body[start..].starts_with('[') { ']' } else { '}' };
    let end = body.rfind(closing)?;
    (end > start).then(|| &body[start..=end])
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratedQuote {
    #[serde(alias = "quote", alias = "text")]
    quote_text: Option<String>,
    author: Option<String>,
    #[serde(alias = "date")]
    quote_date: Option<Value>,
    context: Option<String>,
    citation: Option<String>,
    #[serde(alias = "source")]
    source_title: Option<String>,
    source_author: Option<String>,
    #[serde(alias = "publisher")]
    source_publisher: Option<String>,
    source_date: Option<Value>,
    source_url: Option<String>,
    tags: Option<Value>,
    translations: Option<Vec<GeneratedTranslation>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratedTranslation {
    #[serde(alias = "lang")]
    language: String,
    #[serde(alias = "text")]
    translated_text: String,
    translator: Option<String>,
}

impl GeneratedQuote {
    fn into_form(self) -> SubmissionForm {
        SubmissionForm {
            quote_text: self.quote_text.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            quote_date: self.quote_date.as_ref().and_then(scalar_text),
            context: self.context,
            citation: self.citation,
            source_title: self.source_title,
            source_author: self.source_author,
            source_publisher: self.source_publisher,
            source_date: self.source_date.as_ref().and_then(scalar_text),
            source_url: self.source_url.filter(|url| url_like("source_url", url.trim()).is_ok()),
            translations: self
                .translations
                .unwrap_or_default()
                .into_iter()
                .map(|t| TranslationForm {
                    language: t.language,
                    translated_text: t.translated_text,
                    translator: t.translator,
                })
                .collect(),
            tags: self.tags.as_ref().map(tag_list).unwrap_or_default(),
            evidence_image_urls: Vec::new(),
        }
    }
}

/// Models answer years as numbers about as often as strings.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn tag_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(joined) => joined.split([',', ';']).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        build_prompt, extract_json, generate, parse_response, AssistError, GenerationRequest,
    };
    use crate::guardrails::GuardrailPolicy;
    use crate::testing::ScriptedLlmClient;

    fn request(count: u32) -> GenerationRequest {
        GenerationRequest {
            topic: "courage".to_string(),
            count,
            author: Some("Seneca".to_string()),
            language: Some("Latin".to_string()),
        }
    }

    #[test]
    fn prompt_mentions_topic_count_author_and_language() {
        let prompt = build_prompt(&request(3));
        assert!(prompt.contains("Find 3"));
        assert!(prompt.contains("courage"));
        assert!(prompt.contains("by Seneca"));
        assert!(prompt.contains("into Latin"));
    }

    #[test]
    fn json_is_found_inside_fences_and_prose() {
        assert_eq!(extract_json("```json\n[1, 2]\n```"), Some("[1, 2]"));
        assert_eq!(extract_json("Here you go: [{\"a\": 1}] enjoy"), Some("[{\"a\": 1}]"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn invalid_entries_are_dropped_and_aliases_accepted() {
        let raw = r#"```json
        [
          {"quote": "Luck is what happens when preparation meets opportunity.",
           "author": "Seneca", "date": 65, "tags": "luck, stoicism",
           "source_url": "not a url"},
          {"quote_text": "", "author": "Nobody"},
          {"quote_text": "Orphan quote"},
          "garbage"
        ]
        ```"#;

        let outcome = parse_response(raw, 10).expect("parse");
        assert_eq!(outcome.forms.len(), 1);
        assert_eq!(outcome.dropped, 3);
        let form = &outcome.forms[0];
        assert_eq!(form.author, "Seneca");
        assert_eq!(form.quote_date.as_deref(), Some("65"));
        assert_eq!(form.tags, vec!["luck".to_string(), "stoicism".to_string()]);
        assert_eq!(form.source_url, None);
    }

    #[test]
    fn wrapped_object_and_limit_are_honoured() {
        let raw = r#"{"quotes": [
            {"quote_text": "One", "author": "A"},
            {"quote_text": "Two", "author": "B"}
        ]}"#;
        let outcome = parse_response(raw, 1).expect("parse");
        assert_eq!(outcome.forms.len(), 1);
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn non_json_output_is_malformed() {
        assert!(matches!(parse_response("sorry, I can't", 5), Err(AssistError::Malformed(_))));
    }

    #[tokio::test]
    async fn generate_sends_prompt_and_parses_reply() {
        let client = Arc::new(ScriptedLlmClient::new([Ok(
            r#"[{"quote_text": "We suffer more in imagination than in reality.", "author": "Seneca",
                 "translations": [{"language": "la", "translated_text": "Plura sunt quae nos terrent"}]}]"#
                .to_string(),
        )]));

        let outcome = generate(client.as_ref(), &GuardrailPolicy::default(), &request(2))
            .await
            .expect("generate");
        assert_eq!(outcome.forms.len(), 1);
        assert_eq!(outcome.forms[0].translations.len(), 1);

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("courage"));
    }

    #[tokio::test]
    async fn guardrails_reject_before_calling_the_model() {
        let client = ScriptedLlmClient::new([]);
        let result = generate(&client, &GuardrailPolicy::default(), &request(50)).await;
        assert!(matches!(
            result,
            Err(AssistError::Rejected { reason_code: "count_out_of_range", .. })
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn model_failures_surface_as_llm_errors() {
        let client = ScriptedLlmClient::new([Err("upstream timeout".to_string())]);
        let result = generate(&client, &GuardrailPolicy::default(), &request(1)).await;
        assert!(matches!(result, Err(AssistError::Llm(_))));
    }
}
