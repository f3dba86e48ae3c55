//! Input bounds applied before anything is sent to the model.

pub const MIN_GENERATION_COUNT: u32 = 1;
pub const MAX_GENERATION_COUNT: u32 = 20;
pub const MAX_TOPIC_CHARS: usize = 500;
pub const MAX_PREFILL_TEXT_CHARS: usize = 2_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent<'a> {
    Generate { topic: &'a str, count: u32, author: Option<&'a str> },
    Prefill { quote_text: Option<&'a str>, author: Option<&'a str> },
}

impl GuardrailIntent<'_> {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "cq.generate",
            Self::Prefill { .. } => "cq.prefill",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

impl GuardrailDecision {
    fn deny(reason_code: &'static str, user_message: impl Into<String>) -> Self {
        Self::Deny { reason_code, user_message: user_message.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub max_generation_count: u32,
    pub max_topic_chars: usize,
    pub max_prefill_text_chars: usize,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            max_generation_count: MAX_GENERATION_COUNT,
            max_topic_chars: MAX_TOPIC_CHARS,
            max_prefill_text_chars: MAX_PREFILL_TEXT_CHARS,
        }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, intent: &GuardrailIntent<'_>) -> GuardrailDecision {
        match intent {
            GuardrailIntent::Generate { topic, count, author } => {
                let topic = topic.trim();
                if topic.is_empty() {
                    return GuardrailDecision::deny("topic_missing", "topic is required");
                }
                if topic.chars().count() > self.max_topic_chars {
                    return GuardrailDecision::deny(
                        "topic_too_long",
                        format!("topic must be at most {} characters", self.max_topic_chars),
                    );
                }
                if *count < MIN_GENERATION_COUNT || *count > self.max_generation_count {
                    return GuardrailDecision::deny(
                        "count_out_of_range",
                        format!(
                            "count must be between {MIN_GENERATION_COUNT} and {}",
                            self.max_generation_count
                        ),
                    );
                }
                if author.is_some_and(|a| a.chars().count() > self.max_topic_chars) {
                    return GuardrailDecision::deny("author_too_long", "author is too long");
                }
                GuardrailDecision::Allow
            }
            GuardrailIntent::Prefill { quote_text, author } => {
                let text = quote_text.map(str::trim).filter(|t| !t.is_empty());
                let author = author.map(str::trim).filter(|a| !a.is_empty());
                if text.is_none() && author.is_none() {
                    return GuardrailDecision::deny(
                        "prefill_input_missing",
                        "provide quote_text or author to prefill from",
                    );
                }
                if text.is_some_and(|t| t.chars().count() > self.max_prefill_text_chars) {
                    return GuardrailDecision::deny(
                        "prefill_text_too_long",
                        format!(
                            "quote_text must be at most {} characters",
                            self.max_prefill_text_chars
                        ),
                    );
                }
                GuardrailDecision::Allow
            }
        }
    }
}
