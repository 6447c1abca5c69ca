use crate::config::LlmSettings;
use crate::traits::{CompletionError, LlmClient, LlmResponse};
use async_trait::async_trait;
use pagewise_common::{PagewiseError, Result};
use pagewise_http::{HttpClient, HttpError};
use serde::{Deserialize, Serialize};

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl OpenAiClient {
    /// Create a client from resolved settings. The endpoint is the API root,
    /// e.g. `https://api.openai.com/v1`.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(PagewiseError::Config("OpenAI API key is empty".to_string()));
        }
        // A trailing slash makes `join("chat/completions")` keep the `/v1` segment.
        let base = format!("{}/", settings.endpoint.trim_end_matches('/'));
        let client = HttpClient::new(&base)
            .map_err(|e| PagewiseError::Client(format!("HttpClient init failed: {e}")))?
            .with_timeout(std::time::Duration::from_secs(60));

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> std::result::Result<LlmResponse, CompletionError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let req = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: max_tokens.or(self.max_tokens),
            temperature: temperature.or(self.temperature),
        };

        let resp: ChatResponse = self
            .client
            .post_json("chat/completions", Some(&self.api_key), &req)
            .await
            .map_err(http_to_completion)?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::EmptyResponse {
                model: self.model.clone(),
            })?;

        Ok(LlmResponse {
            text,
            model: resp.model,
            tokens_used: resp.usage.map(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn http_to_completion(e: HttpError) -> CompletionError {
    match e {
        HttpError::Api {
            status, message, ..
        } => CompletionError::Api {
            status: status.as_u16(),
            message,
        },
        HttpError::Build(msg) | HttpError::Url(msg) => CompletionError::Config(msg),
        other => CompletionError::Http(other.to_string()),
    }
}
