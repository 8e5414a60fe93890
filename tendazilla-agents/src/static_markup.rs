//! Static markup strategy: plain GET of the listing page

use async_trait::async_trait;
use tracing::debug;

use tendazilla_core::{Site, TenderRecord};
use tendazilla_net::ThrottledClient;

use crate::{extract_listings, AcquisitionError, AcquisitionStrategy, StrategyKind};

pub struct StaticMarkupStrategy {
    client: ThrottledClient,
}

impl StaticMarkupStrategy {
    pub fn new(client: ThrottledClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AcquisitionStrategy for StaticMarkupStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StaticMarkup
    }

    async fn fetch(&self, site: &Site) -> Result<Vec<TenderRecord>, AcquisitionError> {
        let response = self.client.get(&site.url).await?;
        debug!("Fetched {} bytes from {}", response.body.len(), site.url);

        let records = extract_listings(&response.body, &site.url, &site.name, self.kind().provenance());
        if records.is_empty() {
            return Err(AcquisitionError::Parse(site.url.clone()));
        }
        Ok(records)
    }
}
