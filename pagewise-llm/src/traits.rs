use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::prompt::{build_answer_prompt, ANSWER_SYSTEM_PROMPT};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// Failure of a single completion call. Never fatal to a session.
#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("empty response from model {model}")]
    EmptyResponse { model: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CompletionError {
    /// 401/403 mean the key is wrong; retrying the same question won't help.
    pub fn is_auth(&self) -> bool {
        matches!(self, CompletionError::Api { status: 401 | 403, .. })
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse, CompletionError>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool, CompletionError> {
        match self
            .generate("Respond with just 'OK'", None, Some(5), Some(0.0))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!(model = %self.model_name(), error = %e, "llm.health_check.failed");
                Ok(false)
            }
        }
    }

    /// Answer `question` using only the rendered page `context`.
    async fn answer_from_content(
        &self,
        context: &str,
        question: &str,
    ) -> Result<LlmResponse, CompletionError> {
        let prompt = build_answer_prompt(context, question);
        tracing::trace!(%prompt, "llm.answer.prompt");
        tracing::debug!(
            model = %self.model_name(),
            context_chars = context.chars().count(),
            question_chars = question.chars().count(),
            "llm.answer.request"
        );
        let response = self
            .generate(&prompt, Some(ANSWER_SYSTEM_PROMPT), None, None)
            .await?;
        tracing::debug!(
            answer_chars = response.text.chars().count(),
            tokens_used = ?response.tokens_used,
            "llm.answer.response"
        );
        Ok(response)
    }
}
