//! Rate-limited, retrying access to tender portals
//!
//! Every outbound request made by an acquisition strategy goes through
//! [`ThrottledClient`]: one limiter permit per attempt, retries per the
//! policy, and non-2xx statuses turned into classified [`NetError`]s.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::{
    host_of, HttpResponse, NetError, RateLimiter, ReqwestFetcher, RetryPolicy, ScrapeConfig,
    SharedFetcher, SharedRenderer,
};

#[derive(Clone)]
pub struct ThrottledClient {
    fetcher: SharedFetcher,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl ThrottledClient {
    pub fn new(fetcher: SharedFetcher, limiter: Arc<RateLimiter>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            limiter,
            retry,
        }
    }

    /// reqwest fetcher plus limiter and retry policy built from `config`
    pub fn from_config(config: &ScrapeConfig) -> Result<Self, NetError> {
        config.validate()?;
        Ok(Self::new(
            ReqwestFetcher::shared(config)?,
            Arc::new(RateLimiter::from_config(config)),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Same fetcher and limiter under a different retry policy
    pub fn with_retry_policy(&self, retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..self.clone()
        }
    }

    /// GET `url`, succeeding only on a 2xx status
    pub async fn get(&self, url: &str) -> Result<HttpResponse, NetError> {
        self.get_with_headers(url, &[]).await
    }

    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<HttpResponse, NetError> {
        let host = host_of(url)?;
        let limiter = &self.limiter;
        let fetcher = &self.fetcher;
        let host = host.as_str();

        self.retry
            .attempt(move || async move {
                limiter.acquire(host).await;
                debug!("GET {}", url);
                let response = fetcher.get(url, headers).await?;
                if response.is_success() {
                    Ok(response)
                } else {
                    Err(NetError::Status {
                        status: response.status,
                        url: url.to_string(),
                    })
                }
            })
            .await
    }

    /// Render `url` in a headless browser under the same throttling
    pub async fn render(
        &self,
        renderer: &SharedRenderer,
        url: &str,
        timeout: Duration,
    ) -> Result<String, NetError> {
        let host = host_of(url)?;
        let limiter = &self.limiter;
        let host = host.as_str();

        self.retry
            .attempt(move || async move {
                limiter.acquire(host).await;
                debug!("Render {} with {}", url, renderer.name());
                renderer.render(url, timeout).await
            })
            .await
    }
}
