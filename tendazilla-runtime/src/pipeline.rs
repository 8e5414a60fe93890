//! Pipeline
//!
//! One run: discover tenders from every site, score each against the
//! company profile, and collect everything into a [`RunReport`].

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use tendazilla_agents::{HybridScorer, RuleScorer, SharedAssessor};
use tendazilla_core::{CompanyProfile, ScoreResult, Site, TenderRecord};
use tendazilla_net::{SharedRenderer, ThrottledClient};

use crate::{ConfigError, DiscoveryOrchestrator, PipelineConfig, SiteOutcome, SiteReport};

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub threshold: u8,
    pub ai_enabled: bool,
    pub sites: Vec<SiteReport>,
    pub tenders: Vec<TenderRecord>,
    /// Same order as `tenders`
    pub scores: Vec<ScoreResult>,
}

/// Counts shown at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub sites_discovered: usize,
    pub sites_degraded: usize,
    pub sites_cancelled: usize,
    pub tenders: usize,
    pub qualified: usize,
    pub ai_used: usize,
    pub ai_unavailable: usize,
}

impl RunReport {
    /// Qualifying results, best first
    pub fn qualified(&self) -> Vec<&ScoreResult> {
        let mut qualified: Vec<&ScoreResult> = self.scores.iter().filter(|s| s.qualifies).collect();
        qualified.sort_by(|a, b| b.combined_score.cmp(&a.combined_score));
        qualified
    }

    pub fn tender(&self, url: &str) -> Option<&TenderRecord> {
        self.tenders.iter().find(|t| t.url == url)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            tenders: self.tenders.len(),
            qualified: self.scores.iter().filter(|s| s.qualifies).count(),
            ..Default::default()
        };
        for site in &self.sites {
            match site.outcome {
                SiteOutcome::Discovered { .. } => summary.sites_discovered += 1,
                SiteOutcome::Degraded => summary.sites_degraded += 1,
                SiteOutcome::Cancelled => summary.sites_cancelled += 1,
            }
        }
        for score in &self.scores {
            if score.ai_score.is_some() {
                summary.ai_used += 1;
            } else if score.ai_status.is_unavailable() {
                summary.ai_unavailable += 1;
            }
        }
        summary
    }
}

pub struct Pipeline {
    discovery: DiscoveryOrchestrator,
    scorer: HybridScorer,
    threshold: u8,
    max_concurrent_scores: usize,
}

impl Pipeline {
    pub fn new(discovery: DiscoveryOrchestrator, scorer: HybridScorer, threshold: u8) -> Self {
        Self {
            discovery,
            scorer,
            threshold,
            max_concurrent_scores: 4,
        }
    }

    pub fn with_max_concurrent_scores(mut self, max: usize) -> Self {
        self.max_concurrent_scores = max.max(1);
        self
    }

    /// Build the standard pipeline: reqwest client, shared limiter, the four
    /// strategies and the hybrid scorer, all from `config`
    pub fn from_config(
        config: &PipelineConfig,
        assessor: SharedAssessor,
        renderer: SharedRenderer,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let client = ThrottledClient::from_config(&config.scraping)?;
        let discovery = DiscoveryOrchestrator::standard(client, renderer, config.scraping.render_timeout())
            .with_max_concurrent_sites(config.pipeline.max_concurrent_sites);
        let scorer = HybridScorer::new(
            RuleScorer::new(config.scoring.weights)?,
            assessor,
            config.scoring.blend,
            config.ai.timeout(),
        )?;

        Ok(Self::new(discovery, scorer, config.threshold()?)
            .with_max_concurrent_scores(config.pipeline.max_concurrent_scores))
    }

    pub fn scorer(&self) -> &HybridScorer {
        &self.scorer
    }

    /// Score one record outside a run
    pub async fn score(&self, tender: &TenderRecord, profile: &CompanyProfile) -> ScoreResult {
        self.scorer.evaluate(tender, profile, self.threshold).await
    }

    /// Run discovery and scoring. `budget` bounds the whole run; tenders
    /// discovered before it runs out are still scored, rule-only if needed.
    pub async fn run(
        &self,
        sites: &[Site],
        profile: &CompanyProfile,
        budget: Option<Duration>,
    ) -> Result<RunReport, ConfigError> {
        profile.validate()?;
        for site in sites {
            site.validate()?;
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = budget.map(|b| Instant::now() + b);
        info!("Run {} starting: {} sites", run_id, sites.len());

        let batch = self.discovery.discover_many(sites, deadline).await;

        let scores: Vec<ScoreResult> = stream::iter(
            batch
                .records
                .iter()
                .map(|tender| self.scorer.evaluate_until(tender, profile, self.threshold, deadline)),
        )
        .buffered(self.max_concurrent_scores)
        .collect()
        .await;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            threshold: self.threshold,
            ai_enabled: self.scorer.ai_enabled(),
            sites: batch.reports,
            tenders: batch.records,
            scores,
        };

        let summary = report.summary();
        if summary.sites_degraded > 0 {
            warn!("{} sites fell back to sample data", summary.sites_degraded);
        }
        info!(
            "Run {} finished: {} tenders, {} qualified",
            run_id, summary.tenders, summary.qualified
        );
        Ok(report)
    }
}
