use pagewise_llm::LlmClient;
use pagewise_web::{parse_url, render, FetchError, PageFetcher, ParseError, StructuredDocument};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub const NO_DOCUMENT_NOTICE: &str =
    "No page is loaded yet. Use /load <url> to load one before asking questions.";

/// Anything that prevents a page from becoming the session's document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("could not parse page: {0}")]
    Parse(#[from] ParseError),
}

struct Loaded {
    url: Url,
    document: StructuredDocument,
}

/// One interactive session: the collaborators plus at most one loaded page.
pub struct Session {
    fetcher: Arc<dyn PageFetcher>,
    llm: Arc<dyn LlmClient>,
    loaded: Option<Loaded>,
}

impl Session {
    pub fn new(fetcher: Arc<dyn PageFetcher>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            fetcher,
            llm,
            loaded: None,
        }
    }

    /// Fetch and structure `raw_url`. The current document is replaced only
    /// when every step succeeds.
    pub async fn load(&mut self, raw_url: &str) -> Result<&StructuredDocument, LoadError> {
        let url = parse_url(raw_url)?;
        tracing::info!(%url, "session.load.start");

        let page = self.fetcher.fetch(&url).await?;
        let document = page.parse()?;
        tracing::info!(
            url = %page.url,
            sections = document.sections().len(),
            paragraphs = document.paragraph_count(),
            "session.load.done"
        );

        let loaded = self.loaded.insert(Loaded {
            url: page.url,
            document,
        });
        Ok(&loaded.document)
    }

    /// Answer `question` from the loaded page. Provider failures come back as
    /// text so the caller can keep asking.
    pub async fn ask(&self, question: &str) -> String {
        let Some(loaded) = &self.loaded else {
            return NO_DOCUMENT_NOTICE.to_string();
        };

        let context = render(&loaded.document);
        match self.llm.answer_from_content(&context, question).await {
            Ok(resp) => resp.text,
            Err(e) => {
                if e.is_auth() {
                    tracing::error!(model = %self.llm.model_name(), error = %e, "session.ask.auth_failed");
                } else {
                    tracing::warn!(model = %self.llm.model_name(), error = %e, "session.ask.failed");
                }
                format!("Error generating response: {e}")
            }
        }
    }

    pub fn document(&self) -> Option<&StructuredDocument> {
        self.loaded.as_ref().map(|l| &l.document)
    }

    pub fn url(&self) -> Option<&Url> {
        self.loaded.as_ref().map(|l| &l.url)
    }

    /// Exactly the text handed to the provider as page content.
    pub fn rendered_context(&self) -> Option<String> {
        self.document().map(render)
    }
}
