//! Discovery orchestrator
//!
//! Runs the acquisition strategies for each site in a fixed order and stops
//! at the first one that yields records. A site where every strategy comes up
//! empty gets exactly one synthetic sample record, so degraded discovery is
//! always visible downstream. Strategies that do not apply to a site, such as
//! the feed reader on a site without a feed, are skipped without a failure.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use tendazilla_agents::{
    ApiProbeStrategy, RenderedPageStrategy, RssStrategy, SharedStrategy, StaticMarkupStrategy,
    StrategyKind,
};
use tendazilla_core::{
    normalize_whitespace, sample_tender, truncate_chars, Site, TenderRecord,
    MAX_DESCRIPTION_CHARS, MIN_TITLE_CHARS,
};
use tendazilla_net::{SharedRenderer, ThrottledClient};

pub const DEFAULT_MAX_CONCURRENT_SITES: usize = 4;

/// One strategy that did not produce records for a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub error: String,
}

/// How discovery ended for one site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SiteOutcome {
    /// Live records from `strategy`
    Discovered { strategy: StrategyKind },
    /// Every strategy failed or came back empty; sample data used
    Degraded,
    /// The batch deadline passed before the site finished
    Cancelled,
}

/// Per-site line of the run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    pub site: String,
    pub url: String,
    pub outcome: SiteOutcome,
    /// Records this site contributed before cross-site deduplication
    pub records: usize,
    pub failures: Vec<StrategyFailure>,
}

/// Records and report for one site
#[derive(Debug, Clone)]
pub struct SiteDiscovery {
    pub records: Vec<TenderRecord>,
    pub report: SiteReport,
}

/// Output of [`DiscoveryOrchestrator::discover_many`]
#[derive(Debug, Clone, Default)]
pub struct DiscoveryBatch {
    /// Deduplicated by url, first occurrence wins
    pub records: Vec<TenderRecord>,
    /// One per input site, in input order
    pub reports: Vec<SiteReport>,
}

pub struct DiscoveryOrchestrator {
    strategies: Vec<SharedStrategy>,
    max_concurrent_sites: usize,
}

impl DiscoveryOrchestrator {
    /// Strategies are tried in the given order
    pub fn new(strategies: Vec<SharedStrategy>) -> Self {
        Self {
            strategies,
            max_concurrent_sites: DEFAULT_MAX_CONCURRENT_SITES,
        }
    }

    /// Feed, API probe, static markup, then rendered page, all sharing `client`
    pub fn standard(client: ThrottledClient, renderer: SharedRenderer, render_timeout: Duration) -> Self {
        Self::new(vec![
            Arc::new(RssStrategy::new(client.clone())),
            Arc::new(ApiProbeStrategy::new(client.clone())),
            Arc::new(StaticMarkupStrategy::new(client.clone())),
            Arc::new(RenderedPageStrategy::new(client, renderer, render_timeout)),
        ])
    }

    pub fn with_max_concurrent_sites(mut self, max: usize) -> Self {
        self.max_concurrent_sites = max.max(1);
        self
    }

    pub fn strategy_order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    pub async fn discover(&self, site: &Site) -> SiteDiscovery {
        self.discover_until(site, None).await
    }

    /// Discover one site, giving up at `deadline`
    pub async fn discover_until(&self, site: &Site, deadline: Option<Instant>) -> SiteDiscovery {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !strategy.applies_to(site) {
                continue;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return cancelled(site, failures);
            }

            let fetched = match deadline {
                Some(deadline) => match timeout_at(deadline, strategy.fetch(site)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!("{}: deadline reached during {} acquisition", site.name, kind);
                        return cancelled(site, failures);
                    }
                },
                None => strategy.fetch(site).await,
            };

            match fetched {
                Ok(raw) => {
                    let fetched_count = raw.len();
                    let records: Vec<TenderRecord> = raw.into_iter().filter_map(post_process).collect();
                    if !records.is_empty() {
                        info!("{}: {} tenders via {}", site.name, records.len(), kind);
                        return SiteDiscovery {
                            report: SiteReport {
                                site: site.name.clone(),
                                url: site.url.clone(),
                                outcome: SiteOutcome::Discovered { strategy: kind },
                                records: records.len(),
                                failures,
                            },
                            records,
                        };
                    }
                    debug!("{}: {} returned no usable records ({} raw)", site.name, kind, fetched_count);
                    failures.push(StrategyFailure {
                        strategy: kind,
                        error: if fetched_count == 0 {
                            "no records".to_string()
                        } else {
                            format!("{} records, none usable", fetched_count)
                        },
                    });
                }
                Err(e) => {
                    warn!("{}: {} strategy failed: {}", site.name, kind, e);
                    failures.push(StrategyFailure {
                        strategy: kind,
                        error: e.to_string(),
                    });
                }
            }
        }

        warn!("{}: all strategies failed, using sample data", site.name);
        SiteDiscovery {
            records: vec![sample_tender(&site.name, &site.url)],
            report: SiteReport {
                site: site.name.clone(),
                url: site.url.clone(),
                outcome: SiteOutcome::Degraded,
                records: 1,
                failures,
            },
        }
    }

    /// Discover every site through a bounded worker pool. Reports keep the
    /// input order and records are deduplicated by url across sites.
    pub async fn discover_many(&self, sites: &[Site], deadline: Option<Instant>) -> DiscoveryBatch {
        let discoveries: Vec<SiteDiscovery> = stream::iter(sites.iter().map(|site| self.discover_until(site, deadline)))
            .buffered(self.max_concurrent_sites)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut batch = DiscoveryBatch::default();
        for discovery in discoveries {
            for record in discovery.records {
                if seen.insert(record.url.clone()) {
                    batch.records.push(record);
                } else {
                    debug!("Dropping duplicate {} from {}", record.url, record.source_site);
                }
            }
            batch.reports.push(discovery.report);
        }

        info!(
            "Discovered {} unique tenders across {} sites",
            batch.records.len(),
            batch.reports.len()
        );
        batch
    }
}

fn cancelled(site: &Site, failures: Vec<StrategyFailure>) -> SiteDiscovery {
    SiteDiscovery {
        records: Vec::new(),
        report: SiteReport {
            site: site.name.clone(),
            url: site.url.clone(),
            outcome: SiteOutcome::Cancelled,
            records: 0,
            failures,
        },
    }
}

/// Clean a live record: trimmed title of at least [`MIN_TITLE_CHARS`],
/// whitespace-normalized description capped at [`MAX_DESCRIPTION_CHARS`]
pub fn post_process(mut record: TenderRecord) -> Option<TenderRecord> {
    record.title = record.title.trim().to_string();
    if record.title.chars().count() < MIN_TITLE_CHARS {
        return None;
    }
    record.description = truncate_chars(&normalize_whitespace(&record.description), MAX_DESCRIPTION_CHARS);
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tendazilla_agents::{AcquisitionError, AcquisitionStrategy};
    use tendazilla_core::Provenance;

    enum Script {
        Records(Vec<&'static str>),
        Fail,
        Hang,
    }

    struct FakeStrategy {
        kind: StrategyKind,
        script: Script,
        calls: Arc<Mutex<Vec<StrategyKind>>>,
    }

    #[async_trait]
    impl AcquisitionStrategy for FakeStrategy {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn applies_to(&self, site: &Site) -> bool {
            self.kind != StrategyKind::Rss || site.rss_url.is_some()
        }

        async fn fetch(&self, site: &Site) -> Result<Vec<TenderRecord>, AcquisitionError> {
            self.calls.lock().push(self.kind);
            match &self.script {
                Script::Records(urls) => Ok(urls
                    .iter()
                    .map(|url| {
                        TenderRecord::builder(&site.name, url, self.kind.provenance())
                            .title(format!("Tender at {}", url))
                            .build()
                            .unwrap()
                    })
                    .collect()),
                Script::Fail => Err(AcquisitionError::Parse("no listing".to_string())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn orchestrator(scripts: Vec<(StrategyKind, Script)>) -> (DiscoveryOrchestrator, Arc<Mutex<Vec<StrategyKind>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let strategies: Vec<SharedStrategy> = scripts
            .into_iter()
            .map(|(kind, script)| {
                Arc::new(FakeStrategy {
                    kind,
                    script,
                    calls: calls.clone(),
                }) as SharedStrategy
            })
            .collect();
        (DiscoveryOrchestrator::new(strategies), calls)
    }

    fn site(name: &str) -> Site {
        Site::new(name, &format!("https://{}.example/tenders", name))
    }

    #[tokio::test]
    async fn test_feed_strategy_only_for_sites_with_a_feed() {
        let (orchestrator, calls) = orchestrator(vec![
            (StrategyKind::Rss, Script::Records(vec!["https://a.example/feed-1"])),
            (StrategyKind::StaticMarkup, Script::Records(vec!["https://a.example/1"])),
        ]);

        let discovery = orchestrator.discover(&site("a")).await;
        assert_eq!(*calls.lock(), vec![StrategyKind::StaticMarkup]);
        assert!(discovery.report.failures.is_empty());

        calls.lock().clear();
        let with_feed = site("b").with_rss_url("https://b.example/feed.xml");
        let discovery = orchestrator.discover(&with_feed).await;
        assert_eq!(*calls.lock(), vec![StrategyKind::Rss]);
        assert_eq!(
            discovery.report.outcome,
            SiteOutcome::Discovered {
                strategy: StrategyKind::Rss
            }
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_non_empty_strategy() {
        let (orchestrator, calls) = orchestrator(vec![
            (StrategyKind::Api, Script::Fail),
            (StrategyKind::StaticMarkup, Script::Records(vec!["https://a.example/1"])),
            (StrategyKind::RenderedPage, Script::Records(vec!["https://a.example/2"])),
        ]);

        let discovery = orchestrator.discover(&site("a")).await;
        assert_eq!(*calls.lock(), vec![StrategyKind::Api, StrategyKind::StaticMarkup]);
        assert_eq!(
            discovery.report.outcome,
            SiteOutcome::Discovered {
                strategy: StrategyKind::StaticMarkup
            }
        );
        assert_eq!(discovery.report.failures.len(), 1);
        assert_eq!(discovery.records[0].provenance, Provenance::StaticMarkup);
    }

    #[tokio::test]
    async fn test_empty_result_falls_through() {
        let (orchestrator, calls) = orchestrator(vec![
            (StrategyKind::Api, Script::Records(vec![])),
            (StrategyKind::StaticMarkup, Script::Fail),
            (StrategyKind::RenderedPage, Script::Records(vec!["https://a.example/1"])),
        ]);

        let discovery = orchestrator.discover(&site("a")).await;
        assert_eq!(calls.lock().len(), 3);
        assert_eq!(discovery.records.len(), 1);
        assert_eq!(discovery.report.failures[0].error, "no records");
    }

    #[tokio::test]
    async fn test_all_failing_yields_one_sample() {
        let (orchestrator, _) = orchestrator(vec![
            (StrategyKind::Api, Script::Fail),
            (StrategyKind::StaticMarkup, Script::Fail),
            (StrategyKind::RenderedPage, Script::Records(vec![])),
        ]);

        let discovery = orchestrator.discover(&site("a")).await;
        assert_eq!(discovery.report.outcome, SiteOutcome::Degraded);
        assert_eq!(discovery.records.len(), 1);
        assert!(discovery.records[0].is_sample());
        assert_eq!(discovery.report.failures.len(), 3);
    }

    #[tokio::test]
    async fn test_discover_many_deduplicates_in_order() {
        let (orchestrator, _) = orchestrator(vec![(
            StrategyKind::Api,
            Script::Records(vec!["https://shared.example/A", "https://shared.example/B"]),
        )]);
        let sites = [site("one"), site("two")];

        let batch = orchestrator.discover_many(&sites, None).await;
        let urls: Vec<&str> = batch.records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://shared.example/A", "https://shared.example/B"]);
        assert_eq!(batch.records[0].source_site, "one");
        assert_eq!(batch.reports.len(), 2);
        assert_eq!(batch.reports[1].site, "two");
        assert_eq!(batch.reports[1].records, 2);
    }

    #[tokio::test]
    async fn test_deadline_cancels_in_flight_site() {
        let (orchestrator, _) = orchestrator(vec![
            (StrategyKind::Api, Script::Fail),
            (StrategyKind::StaticMarkup, Script::Hang),
        ]);
        let deadline = Instant::now() + Duration::from_millis(50);

        let batch = orchestrator.discover_many(&[site("slow")], Some(deadline)).await;
        assert!(batch.records.is_empty());
        assert_eq!(batch.reports[0].outcome, SiteOutcome::Cancelled);
        assert_eq!(batch.reports[0].failures.len(), 1);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_skips_sites() {
        let (orchestrator, calls) = orchestrator(vec![(
            StrategyKind::Api,
            Script::Records(vec!["https://a.example/1"]),
        )]);

        let batch = orchestrator
            .discover_many(&[site("a"), site("b")], Some(Instant::now()))
            .await;
        assert!(calls.lock().is_empty());
        assert!(batch.reports.iter().all(|r| r.outcome == SiteOutcome::Cancelled));
    }

    #[test]
    fn test_post_process() {
        let record = TenderRecord::builder("Portal", "https://portal.example/1", Provenance::Api)
            .title("  Road maintenance  ")
            .description(format!("Line one\n\n   line two {}", "x".repeat(600)))
            .build()
            .unwrap();
        let cleaned = post_process(record).unwrap();
        assert_eq!(cleaned.title, "Road maintenance");
        assert!(cleaned.description.starts_with("Line one line two"));
        assert!(cleaned.description.ends_with("..."));
        assert_eq!(cleaned.description.chars().count(), MAX_DESCRIPTION_CHARS + 3);

        let short = TenderRecord::builder("Portal", "https://portal.example/2", Provenance::Api)
            .title(" RFQ ")
            .build()
            .unwrap();
        assert!(post_process(short).is_none());
    }
}
