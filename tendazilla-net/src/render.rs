//! Headless-browser collaborator
//!
//! Renders pages whose listings are filled in by scripts. [`NoopRenderer`] is
//! the default; a Chromium renderer is compiled in with the `chromium` feature.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::NetError;

/// Renders a url to its post-script HTML
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load `url`, wait for it to settle, and return the document HTML.
    /// Must fail with [`NetError::RenderTimeout`] if that takes longer than `timeout`.
    async fn render(&self, url: &str, timeout: Duration) -> Result<String, NetError>;

    fn name(&self) -> &str;
}

/// Thread-safe reference to a renderer
pub type SharedRenderer = Arc<dyn PageRenderer>;

/// Renderer for environments without a browser
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRenderer;

#[async_trait]
impl PageRenderer for NoopRenderer {
    async fn render(&self, _url: &str, _timeout: Duration) -> Result<String, NetError> {
        Err(NetError::RendererUnavailable(
            "no headless browser configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(feature = "chromium")]
pub use chromium::ChromiumRenderer;

#[cfg(feature = "chromium")]
mod chromium {
    use super::*;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use std::path::PathBuf;
    use tracing::{debug, warn};

    /// Extra wait after navigation so late XHR-filled listings land
    const SETTLE_DELAY: Duration = Duration::from_millis(1500);

    /// Headless Chromium via chromiumoxide
    pub struct ChromiumRenderer {
        browser: Browser,
    }

    impl ChromiumRenderer {
        /// Launch a headless browser, optionally from an explicit executable
        pub async fn launch(executable: Option<PathBuf>) -> Result<Self, NetError> {
            let mut builder = BrowserConfig::builder()
                .arg("--headless=new")
                .arg("--disable-gpu")
                .arg("--no-sandbox")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-extensions")
                .arg(format!("--user-agent={}", crate::random_user_agent()));
            if let Some(path) = executable {
                builder = builder.chrome_executable(path);
            }
            let config = builder
                .build()
                .map_err(|e| NetError::RendererUnavailable(format!("browser config: {e}")))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| NetError::RendererUnavailable(format!("launch failed: {e}")))?;

            tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!("Browser handler event error: {}", e);
                    }
                }
            });

            Ok(Self { browser })
        }

        async fn load(&self, url: &str) -> Result<String, NetError> {
            let page = self
                .browser
                .new_page(url)
                .await
                .map_err(|e| NetError::Network(format!("open {url}: {e}")))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| NetError::Network(format!("navigate {url}: {e}")))?;
            tokio::time::sleep(SETTLE_DELAY).await;

            let html = page
                .content()
                .await
                .map_err(|e| NetError::Network(format!("read {url}: {e}")))?;
            if let Err(e) = page.close().await {
                warn!("Failed to close page for {}: {}", url, e);
            }
            Ok(html)
        }
    }

    #[async_trait]
    impl PageRenderer for ChromiumRenderer {
        async fn render(&self, url: &str, timeout: Duration) -> Result<String, NetError> {
            match tokio::time::timeout(timeout, self.load(url)).await {
                Ok(result) => result,
                Err(_) => Err(NetError::RenderTimeout(timeout)),
            }
        }

        fn name(&self) -> &str {
            "chromium"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        #[ignore] // Requires a local Chromium
        async fn test_render_data_url() {
            let renderer = ChromiumRenderer::launch(None).await.unwrap();
            let html = renderer
                .render(
                    "data:text/html,<div class='tender'>Road works</div>",
                    Duration::from_secs(20),
                )
                .await
                .unwrap();
            assert!(html.contains("Road works"));
        }
    }
}
