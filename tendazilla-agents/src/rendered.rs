//! Rendered page strategy: headless browser, then listing extraction

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use tendazilla_core::{Site, TenderRecord};
use tendazilla_net::{NetError, SharedRenderer, ThrottledClient};

use crate::{extract_listings, AcquisitionError, AcquisitionStrategy, StrategyKind};

pub struct RenderedPageStrategy {
    client: ThrottledClient,
    renderer: SharedRenderer,
    timeout: Duration,
}

impl RenderedPageStrategy {
    pub fn new(client: ThrottledClient, renderer: SharedRenderer, timeout: Duration) -> Self {
        Self {
            client,
            renderer,
            timeout,
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for RenderedPageStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RenderedPage
    }

    async fn fetch(&self, site: &Site) -> Result<Vec<TenderRecord>, AcquisitionError> {
        let html = self
            .client
            .render(&self.renderer, &site.url, self.timeout)
            .await
            .map_err(|e| match e {
                NetError::RenderTimeout(after) => AcquisitionError::RenderTimeout(after),
                other => AcquisitionError::Net(other),
            })?;
        debug!("Rendered {} ({} bytes)", site.url, html.len());

        let records = extract_listings(&html, &site.url, &site.name, self.kind().provenance());
        if records.is_empty() {
            return Err(AcquisitionError::Parse(site.url.clone()));
        }
        Ok(records)
    }
}
