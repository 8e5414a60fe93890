//! Acquisition strategy capability

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use tendazilla_core::{Provenance, Site, TenderRecord};
use tendazilla_net::NetError;

/// Strategy-local failures. They trigger the next strategy and are reported
/// per site, never surfaced raw.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("no recognizable listing pattern: {0}")]
    Parse(String),

    #[error("unreadable feed: {0}")]
    Feed(String),

    #[error("no API endpoint answered with parseable JSON ({tried} probed)")]
    NoEndpointFound { tried: usize },

    #[error("page did not stabilize within {0:?}")]
    RenderTimeout(Duration),

    #[error(transparent)]
    Net(#[from] NetError),
}

/// Which way a strategy acquires records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Rss,
    Api,
    StaticMarkup,
    RenderedPage,
}

impl StrategyKind {
    pub fn provenance(&self) -> Provenance {
        match self {
            StrategyKind::Rss => Provenance::Rss,
            StrategyKind::Api => Provenance::Api,
            StrategyKind::StaticMarkup => Provenance::StaticMarkup,
            StrategyKind::RenderedPage => Provenance::RenderedPage,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Rss => "rss",
            StrategyKind::Api => "api",
            StrategyKind::StaticMarkup => "static_markup",
            StrategyKind::RenderedPage => "rendered_page",
        };
        f.write_str(name)
    }
}

/// One way of turning a site into tender records
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Whether the site offers what this strategy needs. Strategies that do
    /// not apply are skipped without a failure entry.
    fn applies_to(&self, _site: &Site) -> bool {
        true
    }

    /// Fetch the site's current listings. An empty list is a valid answer.
    async fn fetch(&self, site: &Site) -> Result<Vec<TenderRecord>, AcquisitionError>;
}

/// Thread-safe reference to a strategy
pub type SharedStrategy = Arc<dyn AcquisitionStrategy>;
