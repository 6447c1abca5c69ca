//! HTTP plumbing shared by the page fetcher and the completion client.
//!
//! - [`HttpClient::get_bytes`] for raw page bodies, [`HttpClient::post_json`]
//!   for bearer-authenticated JSON APIs
//! - Retries network failures, 429 and 5xx with exponential backoff; a server's
//!   `Retry-After` is honoured up to [`HttpClient::max_retry_after`]
//! - Logs never contain the bearer token or secret-looking query values
//! - Optional *raw* request/response logging (target `http.raw`) via `PAGEWISE_HTTP_RAW=1`
//!
//! ```no_run
//! # async fn demo() -> Result<(), pagewise_http::HttpError> {
//! let client = pagewise_http::HttpClient::unanchored()?;
//! let page = client.get_bytes("https://example.com/").await?;
//! println!("{} bytes of {:?}", page.body.len(), page.content_type);
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

pub use reqwest::StatusCode;

const RAW_ENV: &str = "PAGEWISE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "api_key",
    "apikey",
    "auth",
    "key",
    "secret",
    "token",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// `url` as it may appear in logs: secret-looking query values are replaced.
fn redacted_url(url: &Url) -> String {
    if url.query().is_none() {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let secret = SECRET_QUERY_KEYS.contains(&k.to_ascii_lowercase().as_str());
            let shown = if secret { "<redacted>".into() } else { v.into_owned() };
            (k.into_owned(), shown)
        })
        .collect();
    let mut shown = url.clone();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

/// Curl line for reproducing a request. Bodies are capped and the token is
/// never included.
fn make_curl(method: &Method, url: &Url, has_bearer: bool, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{method}")];
    if has_bearer {
        parts.push("-H 'authorization: Bearer <redacted>'".into());
    }
    if let Some(bytes) = body {
        let mut s = String::from_utf8_lossy(bytes).into_owned();
        if s.len() > RAW_MAX_BODY {
            truncate_at_char_boundary(&mut s, RAW_MAX_BODY);
            s.push('…');
        }
        parts.push("-H 'content-type: application/json'".into());
        parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", redacted_url(url)));
    parts.join(" ")
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

/// Undecoded successful response, as returned by [`HttpClient::get_bytes`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
    /// Longest `Retry-After` the client will sleep for.
    pub max_retry_after: Duration,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use pagewise_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        Self::build(Some(base), None)
    }

    /// Construct a client without a base; every request path must be an
    /// absolute URL. Used for fetching arbitrary pages.
    pub fn unanchored() -> Result<Self, HttpError> {
        Self::build(None, None)
    }

    fn build(base: Option<Url>, user_agent: Option<&str>) -> Result<Self, HttpError> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(ua) = user_agent {
            builder = builder.user_agent(ua.to_string());
        }
        let inner = builder
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// ```no_run
    /// use pagewise_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?.with_retries(5);
    /// assert_eq!(client.max_retries, 5);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn with_max_retry_after(mut self, cap: Duration) -> Self {
        self.max_retry_after = cap;
        self
    }

    /// Rebuild the underlying connection pool with a custom `User-Agent`.
    pub fn with_user_agent(self, user_agent: &str) -> Result<Self, HttpError> {
        let rebuilt = Self::build(self.base, Some(user_agent))?;
        Ok(Self {
            default_timeout: self.default_timeout,
            max_retries: self.max_retries,
            max_retry_after: self.max_retry_after,
            ..rebuilt
        })
    }

    /// POST `body` as JSON and decode a JSON response, with optional bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let resp = self.execute(Method::POST, path, Some(bytes), bearer).await?;
        decode_json(&resp)
    }

    /// GET the raw body of a resource. Non-2xx statuses are errors; 429/5xx
    /// are retried like every other call.
    pub async fn get_bytes(&self, path: &str) -> Result<RawResponse, HttpError> {
        self.execute(Method::GET, path, None, None).await
    }

    fn resolve_url(&self, path: &str) -> Result<Url, HttpError> {
        let parsed = match &self.base {
            Some(base) => base.join(path),
            None => Url::parse(path),
        };
        parsed.map_err(|e| HttpError::Url(e.to_string()))
    }

    /// Sleep before retry `attempt`: the server's `Retry-After` when present
    /// (capped), otherwise exponential backoff with a floor for 429.
    fn retry_delay(&self, headers: &HeaderMap, status: StatusCode, attempt: usize) -> Duration {
        match retry_after_secs(headers) {
            Some(secs) => Duration::from_secs(secs).min(self.max_retry_after),
            None if status == StatusCode::TOO_MANY_REQUESTS => {
                backoff(attempt).max(Duration::from_millis(1100))
            }
            None => backoff(attempt),
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        bearer: Option<&str>,
    ) -> Result<RawResponse, HttpError> {
        let url = self.resolve_url(path)?;
        let bearer = bearer.map(sanitize_api_key).transpose()?;
        let shown_url = redacted_url(&url);
        let req_id = format!("r{}", Uuid::new_v4().simple());
        let timeout = self.default_timeout;
        let mut attempt = 0usize;

        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if let Some(bytes) = &body {
                rb = rb
                    .header(CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }

            tracing::debug!(
                req_id = %req_id,
                attempt = attempt + 1,
                max_retries = self.max_retries,
                method = %method,
                url = %shown_url,
                timeout_ms = timeout.as_millis() as u64,
                bearer = bearer.is_some(),
                has_body = body.is_some(),
                "http.request.start"
            );
            if raw_enabled() {
                let curl = make_curl(&method, &url, bearer.is_some(), body.as_deref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let t0 = std::time::Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().clone();
                    let headers = resp.headers().clone();
                    resp.bytes()
                        .await
                        .map(|bytes| (status, final_url, headers, bytes))
                }
                Err(err) => Err(err),
            };
            let (status, final_url, headers, bytes) = match sent {
                Ok(parts) => parts,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < self.max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id = %req_id,
                            attempt,
                            backoff_ms = delay.as_millis() as u64,
                            %message,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id = %req_id, attempt, %message, "http.network_error");
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let upstream_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            let content_type = headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            tracing::debug!(
                req_id = %req_id,
                %status,
                duration_ms = dur_ms,
                body_len = bytes.len(),
                content_type = ?content_type,
                x_request_id = %upstream_id,
                "http.response"
            );
            if raw_enabled() {
                let truncated = bytes.len() > RAW_MAX_BODY;
                let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
                tracing::info!(target: "http.raw", %req_id, %status, body = %text, truncated);
            }

            if status.is_success() {
                return Ok(RawResponse {
                    url: final_url,
                    status,
                    content_type,
                    body: bytes.to_vec(),
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                attempt += 1;
                let delay = self.retry_delay(&headers, status, attempt);
                tracing::warn!(
                    req_id = %req_id,
                    %status,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id = %req_id,
                %status,
                %message,
                x_request_id = %upstream_id,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id: upstream_id.to_string(),
            });
        }
    }
}

fn decode_json<T: DeserializeOwned>(resp: &RawResponse) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(&resp.body).map_err(|e| {
        let snippet = snip_body(&resp.body);
        tracing::warn!(
            serde_line = %e.line(),
            serde_col = %e.column(),
            serde_err = %e,
            body_snippet = %snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

fn extract_error_message(body: &[u8]) -> String {
    // OpenAI style: {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
    }

    if let Ok(env) = serde_json::from_slice::<Envelope>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Flat>(body) {
        if let Some(found) = [m.message, m.detail].into_iter().find(|s| !s.is_empty()) {
            return found;
        }
    }
    snip_body(body)
}

/// Delay-seconds form only; HTTP-date values fall back to backoff.
fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    let mut cut = max.min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).into_owned();
    if snip.len() > SNIPPET_MAX {
        truncate_at_char_boundary(&mut snip, SNIPPET_MAX);
        snip.push_str("...");
    }
    snip
}

/// Trim quotes and whitespace a pasted key tends to carry, and reject keys
/// that cannot form a valid `Authorization` header.
fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
