//! HTTP client collaborator
//!
//! Builds the reqwest client used against tender portals and defines the
//! error taxonomy shared by the whole network layer.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Scraping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries per request on transient failures
    pub max_retries: u32,
    /// Minimum delay between two requests to the same host
    pub delay_between_requests_secs: f64,
    /// Requests-per-minute cap per host (0 = no cap beyond the delay)
    pub requests_per_minute: u32,
    /// Upper bound of the random jitter added to a throttled request
    pub jitter_secs: f64,
    /// First retry delay; doubles on every further retry
    pub retry_base_delay_ms: u64,
    /// Ceiling for a single retry delay
    pub retry_max_delay_ms: u64,
    /// Time a headless render may take before it counts as unstable
    pub render_timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            delay_between_requests_secs: 2.0,
            requests_per_minute: 60,
            jitter_secs: 1.0,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
            render_timeout_secs: 30,
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<(), NetError> {
        if self.timeout_secs == 0 {
            return Err(NetError::Config("timeout_secs must be positive".to_string()));
        }
        if self.render_timeout_secs == 0 {
            return Err(NetError::Config("render_timeout_secs must be positive".to_string()));
        }
        for (name, value) in [
            ("delay_between_requests_secs", self.delay_between_requests_secs),
            ("jitter_secs", self.jitter_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(NetError::Config(format!("{name} must be a non-negative number")));
            }
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(NetError::Config(
                "retry_base_delay_ms must not exceed retry_max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Spacing between two permits for the same host: the larger of the
    /// configured delay and the interval implied by the per-minute cap
    pub fn min_interval(&self) -> Duration {
        let delay = Duration::try_from_secs_f64(self.delay_between_requests_secs)
            .unwrap_or(Duration::ZERO);
        let cap = if self.requests_per_minute > 0 {
            Duration::from_secs(60) / self.requests_per_minute
        } else {
            Duration::ZERO
        };
        delay.max(cap)
    }

    pub fn jitter(&self) -> Duration {
        Duration::try_from_secs_f64(self.jitter_secs).unwrap_or(Duration::ZERO)
    }
}

/// Errors from the network layer
#[derive(Debug, Error)]
pub enum NetError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("render did not stabilize within {0:?}")]
    RenderTimeout(Duration),

    #[error("renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("invalid scrape configuration: {0}")]
    Config(String),

    #[error("gave up after {attempts} attempts: {last}")]
    TransientFailure { attempts: u32, last: Box<NetError> },
}

impl NetError {
    /// Whether a retry can reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            NetError::Network(_) | NetError::Timeout(_) => true,
            NetError::Status { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for NetError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetError::Timeout(e.to_string())
        } else if e.is_builder() {
            NetError::InvalidUrl(e.to_string())
        } else {
            NetError::Network(e.to_string())
        }
    }
}

/// 5xx, request timeout, rate limiting and auth challenges are worth a retry.
/// Every other 4xx is final.
pub fn is_transient_status(status: u16) -> bool {
    status >= 500 || matches!(status, 401 | 403 | 408 | 429)
}

/// Lowercased host of an absolute url
pub fn host_of(url: &str) -> Result<String, NetError> {
    let parsed = Url::parse(url).map_err(|e| NetError::InvalidUrl(format!("{url}: {e}")))?;
    parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| NetError::InvalidUrl(format!("{url}: no host")))
}

/// Response from an HTTP GET
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested url
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// JSON by content type, or a body that opens like a JSON document
    pub fn looks_like_json(&self) -> bool {
        let by_type = self
            .content_type
            .as_deref()
            .is_some_and(|t| t.contains("json"));
        let trimmed = self.body.trim_start();
        by_type || trimmed.starts_with('{') || trimmed.starts_with('[')
    }
}

/// HTTP client collaborator
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Single GET, no retry. Non-2xx statuses are returned, not raised.
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, NetError>;
}

/// Thread-safe reference to an HTTP fetcher
pub type SharedFetcher = Arc<dyn HttpFetcher>;

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Get a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// reqwest-backed [`HttpFetcher`]
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self, NetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(random_user_agent())
            .default_headers(headers)
            .build()
            .map_err(|e| NetError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }

    /// Shared handle for use behind [`ThrottledClient`](crate::ThrottledClient)
    pub fn shared(config: &ScrapeConfig) -> Result<SharedFetcher, NetError> {
        Ok(Arc::new(Self::new(config)?))
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, NetError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        Ok(HttpResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}
