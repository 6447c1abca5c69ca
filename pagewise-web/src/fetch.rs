use async_trait::async_trait;
use pagewise_common::PagewiseError;
use pagewise_http::{HttpClient, HttpError};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::extract::{parse_bytes, ParseError, StructuredDocument};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {input:?}: {reason}")]
    InvalidUrl { input: String, reason: String },
    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },
    #[error("could not reach {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    fn from_http(url: &Url, err: HttpError) -> Self {
        match err {
            HttpError::Api { status, .. } => FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            },
            HttpError::Url(reason) => FetchError::InvalidUrl {
                input: url.to_string(),
                reason,
            },
            other => FetchError::Transport {
                url: url.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Raw page as returned by a [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Structure the body. Bodies declared as something other than text or
    /// markup are refused before decoding.
    pub fn parse(&self) -> Result<StructuredDocument, ParseError> {
        if let Some(ct) = &self.content_type {
            if !is_textual(ct) {
                return Err(ParseError::UnsupportedContentType(ct.clone()));
            }
        }
        parse_bytes(&self.body)
    }

    /// blake3 hex digest of the body, used to correlate log lines.
    pub fn checksum(&self) -> String {
        blake3::hash(&self.body).to_hex().to_string()
    }
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime.starts_with("text/") || mime.contains("html") || mime.contains("xml")
}

/// Source of raw page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Fetcher backed by [`pagewise_http::HttpClient`].
pub struct HttpPageFetcher {
    http: HttpClient,
}

impl HttpPageFetcher {
    pub fn new(
        timeout: Duration,
        retries: usize,
        user_agent: &str,
    ) -> pagewise_common::Result<Self> {
        let http = HttpClient::unanchored()
            .and_then(|c| c.with_user_agent(user_agent))
            .map_err(|e| PagewiseError::Client(format!("page fetcher init failed: {e}")))?
            .with_timeout(timeout)
            .with_retries(retries);
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let resp = self
            .http
            .get_bytes(url.as_str())
            .await
            .map_err(|e| FetchError::from_http(url, e))?;

        let page = FetchedPage {
            url: resp.url,
            status: resp.status.as_u16(),
            content_type: resp.content_type,
            body: resp.body,
        };
        tracing::info!(
            url = %page.url,
            status = page.status,
            bytes = page.body.len(),
            "page.fetched"
        );
        tracing::debug!(url = %page.url, checksum = %page.checksum(), "page.checksum");
        Ok(page)
    }
}

/// Normalise user input into a fetchable URL. Input without a scheme is
/// assumed to be `https://`.
///
/// ```
/// let url = pagewise_web::parse_url("  example.com/docs ").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
/// assert!(pagewise_web::parse_url("ftp://example.com").is_err());
/// ```
pub fn parse_url(raw: &str) -> Result<Url, FetchError> {
    let input = raw.trim();
    let invalid = |reason: &str| FetchError::InvalidUrl {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    if input.is_empty() {
        return Err(invalid("empty input"));
    }

    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(&e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(&format!("unsupported scheme {other}"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}
