use anyhow::Result;
use std::time::Instant;

use crate::config::LLMConfig;
use crate::llm_providers::{LLMProvider, LLMProviderFactory, LLMProviderType};

// Import logging macros
use crate::{log_service_error, log_service_start, log_service_success};

/// Asks a language model why an answer is correct
#[derive(Debug, Clone)]
pub struct ExplanationService {
    provider: LLMProvider,
}

impl ExplanationService {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::new_with_provider(api_key, base_url, LLMProviderType::OpenAI, None)
    }

    pub fn new_with_provider(
        api_key: String,
        base_url: Option<String>,
        provider_type: LLMProviderType,
        model: Option<String>,
    ) -> Self {
        let provider = LLMProviderFactory::create_provider(provider_type, api_key, base_url, model);
        Self { provider }
    }

    pub fn from_config(config: &LLMConfig) -> Self {
        Self::new_with_provider(
            config.api_key.clone(),
            config.base_url.clone(),
            config.provider,
            config.model.clone(),
        )
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Request a plain-language justification of `correct_answer`.
    ///
    /// The first generated text is returned verbatim. Every call goes to the
    /// provider; nothing is cached or retried.
    pub async fn explain(&self, question_text: &str, correct_answer: &str) -> Result<String> {
        log_service_start!("explanation_service", "explain");
        let started = Instant::now();

        let prompt = build_prompt(question_text, correct_answer);

        match self.provider.make_request(&prompt).await {
            Ok(explanation) => {
                log_service_success!(
                    "explanation_service",
                    "explain",
                    count = explanation.len(),
                    duration_ms = started.elapsed().as_millis() as u64
                );
                Ok(explanation)
            }
            Err(e) => {
                log_service_error!("explanation_service", "explain", error = e);
                Err(e)
            }
        }
    }
}

pub fn build_prompt(question_text: &str, correct_answer: &str) -> String {
    format!(
        "Explain in simple terms why '{}' is the correct answer for: '{}'.",
        correct_answer, question_text
    )
}
