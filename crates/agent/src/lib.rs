//! CQ assistant: LLM-backed quote generation and form prefill.
//!
//! - `llm` - `LlmClient` trait and the HTTP client for OpenAI, Anthropic and Ollama
//! - `guardrails` - input bounds checked before any model call
//! - `generation` - topic prompt in, validated `SubmissionForm`s out
//! - `prefill` - bibliographic suggestions for a partially filled form
//! - `runtime` - `CqAssistant`, the facade the server holds
//!
//! The model only proposes. Generated quotes still go through the submission
//! review flow and prefill suggestions are never persisted here.

pub mod generation;
pub mod guardrails;
pub mod llm;
pub mod prefill;
pub mod runtime;
pub mod testing;

pub use generation::{AssistError, GenerationOutcome, GenerationRequest};
pub use guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
pub use llm::{HttpLlmClient, LlmClient};
pub use prefill::{PrefillRequest, PrefillSuggestion};
pub use runtime::CqAssistant;
