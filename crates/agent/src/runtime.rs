use std::sync::Arc;

use anyhow::Result;

use citequotes_core::config::LlmConfig;

use crate::generation::{self, AssistError, GenerationOutcome, GenerationRequest};
use crate::guardrails::GuardrailPolicy;
use crate::llm::{HttpLlmClient, LlmClient};
use crate::prefill::{self, PrefillRequest, PrefillSuggestion};

/// Entry point the server holds for CQ-assisted generation and prefill.
#[derive(Clone)]
pub struct CqAssistant {
    client: Arc<dyn LlmClient>,
    guardrails: GuardrailPolicy,
}

impl CqAssistant {
    pub fn new(client: Arc<dyn LlmClient>, guardrails: GuardrailPolicy) -> Self {
        Self { client, guardrails }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = HttpLlmClient::from_config(config)?;
        Ok(Self::new(Arc::new(client), GuardrailPolicy::default()))
    }

    pub fn guardrails(&self) -> &GuardrailPolicy {
        &self.guardrails
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, AssistError> {
        generation::generate(self.client.as_ref(), &self.guardrails, request).await
    }

    pub async fn prefill(&self, request: &PrefillRequest) -> Result<PrefillSuggestion, AssistError> {
        prefill::suggest(self.client.as_ref(), &self.guardrails, request).await
    }
}
