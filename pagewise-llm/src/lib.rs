//! LLM integration for Pagewise.
//!
//! This crate exposes a common [`traits::LlmClient`] interface, an
//! OpenAI-compatible chat-completions implementation, and the fixed prompts
//! used to answer questions about a page. [`ensure_llm_ready`] builds a shared
//! client from resolved [`LlmSettings`].
//!
//! # Examples
//! ```no_run
//! use pagewise_llm::{ensure_llm_ready, LlmSettings};
//!
//! # #[tokio::main]
//! # async fn main() -> pagewise_common::Result<()> {
//! let client = ensure_llm_ready(&LlmSettings::openai("sk-..."))?;
//! let answer = client
//!     .answer_from_content("Title: Example\n\nAdditional Content:\n", "What is this page?")
//!     .await;
//! assert_eq!(client.model_name(), "gpt-4o-mini");
//! # let _ = answer;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod openai;
pub mod prompt;
pub mod traits;

pub use config::LlmSettings;
pub use traits::{CompletionError, LlmClient, LlmResponse};

use openai::OpenAiClient;
use std::sync::Arc;

/// Default model used for answering.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Build the completion client. No network call is made here.
pub fn ensure_llm_ready(
    settings: &LlmSettings,
) -> pagewise_common::Result<Arc<dyn LlmClient + Send + Sync + 'static>> {
    let client = OpenAiClient::new(settings)?;
    tracing::info!(model = %settings.model, endpoint = %settings.endpoint, "llm.client.ready");
    Ok(Arc::new(client))
}
