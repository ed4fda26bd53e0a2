//! Shared HTTP client infrastructure.
//!
//! One `reqwest::Client` is configured per process and reused by the
//! document fetcher and every verification strategy. Callers pass an
//! explicit per-call timeout; 429 responses are surfaced with their
//! rate-limit headers intact so the verifier can short-circuit without
//! retrying.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Connect timeout for the shared client.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate-limit headers recorded for diagnostics on a 429. The core never
/// retries within a request, so these are informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub reset: Option<String>,
    pub retry_after: Option<String>,
    pub remaining: Option<String>,
}

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub rate_limit: RateLimitInfo,
}

/// Transport-level failure; HTTP error statuses are NOT failures here, the
/// caller inspects `FetchResponse::status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The per-call timeout elapsed
    Timeout,
    /// Connection, TLS, or protocol error
    Transport(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

/// Downloaded document bytes with the server's declared content type.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// HTTP operations the pipeline needs. Implemented by the shared reqwest
/// client in production and by an in-process fake in tests.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET a text resource (HTML fallback pages).
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchFailure>;

    /// POST a JSON body (the structured citation API).
    async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
        auth: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchFailure>;

    /// Download a document, bounded by `max_bytes`.
    async fn get_bytes(
        &self,
        url: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<FetchedDocument, FetchFailure>;
}

fn rate_limit_info(headers: &reqwest::header::HeaderMap) -> RateLimitInfo {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RateLimitInfo {
        reset: header("x-ratelimit-reset"),
        retry_after: header("retry-after"),
        remaining: header("x-ratelimit-remaining"),
    }
}

fn map_error(e: &reqwest::Error) -> FetchFailure {
    if e.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Transport(e.to_string())
    }
}

/// Shared client wrapper used by production wiring.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Arc<Client>,
}

impl ReqwestFetcher {
    /// Build the shared client.
    ///
    /// # Errors
    ///
    /// Returns the underlying builder error when TLS initialisation fails.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchFailure> {
        debug!(url, timeout_ms = timeout.as_millis() as u64, "GET");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_error(&e))?;
        let status = response.status().as_u16();
        let rate_limit = rate_limit_info(response.headers());
        let body = response.text().await.map_err(|e| map_error(&e))?;
        Ok(FetchResponse {
            status,
            body,
            rate_limit,
        })
    }

    async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
        auth: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResponse, FetchFailure> {
        debug!(url, timeout_ms = timeout.as_millis() as u64, "POST");
        let mut request = self.client.post(url).json(&body).timeout(timeout);
        if let Some(token) = auth {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }
        let response = request.send().await.map_err(|e| map_error(&e))?;
        let status = response.status().as_u16();
        let rate_limit = rate_limit_info(response.headers());
        let text = response.text().await.map_err(|e| map_error(&e))?;
        Ok(FetchResponse {
            status,
            body: text,
            rate_limit,
        })
    }

    async fn get_bytes(
        &self,
        url: &str,
        max_bytes: usize,
        timeout: Duration,
    ) -> Result<FetchedDocument, FetchFailure> {
        debug!(url, max_bytes, "GET bytes");
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_error(&e))?;
        if !response.status().is_success() {
            return Err(FetchFailure::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await.map_err(|e| map_error(&e))?;
        if bytes.len() > max_bytes {
            return Err(FetchFailure::Transport(format!(
                "document of {} bytes exceeds the {max_bytes}-byte limit",
                bytes.len()
            )));
        }
        Ok(FetchedDocument {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
