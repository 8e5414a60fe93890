//! In-memory collaborators for strategy tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tendazilla_net::{
    HttpFetcher, HttpResponse, NetError, PageRenderer, RateLimiter, RetryPolicy, SharedFetcher,
    ThrottledClient,
};

/// Serves canned pages; anything else is a 404 unless [`StaticFetcher::otherwise`] says so
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, (u16, Option<String>, String)>,
    otherwise: Option<u16>,
    pub requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            (status, Some("text/html".to_string()), body.to_string()),
        );
        self
    }

    pub fn otherwise(mut self, status: u16) -> Self {
        self.otherwise = Some(status);
        self
    }

    pub fn json(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            (200, Some("application/json".to_string()), body.to_string()),
        );
        self
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<HttpResponse, NetError> {
        self.requested.lock().push(url.to_string());
        let (status, content_type, body) = self
            .pages
            .get(url)
            .cloned()
            .unwrap_or((self.otherwise.unwrap_or(404), None, String::new()));
        Ok(HttpResponse {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}

/// Unthrottled, no-retry client over `fetcher`
pub fn fixed_client<F: HttpFetcher + 'static>(fetcher: F) -> ThrottledClient {
    shared_client(Arc::new(fetcher))
}

/// Like [`fixed_client`], keeping a handle on the fetcher for inspection
pub fn shared_client(fetcher: SharedFetcher) -> ThrottledClient {
    retrying_client(fetcher, 0)
}

/// Unthrottled client retrying transient failures without delay
pub fn retrying_client(fetcher: SharedFetcher, max_retries: u32) -> ThrottledClient {
    ThrottledClient::new(
        fetcher,
        Arc::new(RateLimiter::new(Duration::ZERO)),
        RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO),
    )
}

pub enum FakeRenderer {
    Html(String),
    Hang,
}

impl FakeRenderer {
    pub fn html(html: &str) -> Self {
        FakeRenderer::Html(html.to_string())
    }

    pub fn hangs() -> Self {
        FakeRenderer::Hang
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, _url: &str, timeout: Duration) -> Result<String, NetError> {
        match self {
            FakeRenderer::Html(html) => Ok(html.clone()),
            FakeRenderer::Hang => {
                tokio::time::sleep(timeout).await;
                Err(NetError::RenderTimeout(timeout))
            }
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
