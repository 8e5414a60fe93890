//! Run configuration
//!
//! A TOML file with `[scraping]`, `[scoring]`, `[scoring.weights]`,
//! `[scoring.blend]`, `[ai]` and `[pipeline]` sections. Every key is
//! optional. Sites live in their own TOML file as `[[sites]]` tables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use tendazilla_agents::{
    connect_backend, validate_threshold, BlendWeights, LlmAssessor, LlmError, LlmProvider, NoopAssessor,
    ScoringConfigError, ScoringWeights, SharedAssessor, DEFAULT_AI_TIMEOUT,
};
use tendazilla_core::{ModelError, Site, DEFAULT_THRESHOLD};
use tendazilla_net::{NetError, ScrapeConfig};

/// Fatal configuration problems, raised before any network access
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid scraping configuration: {0}")]
    Scraping(#[from] NetError),

    #[error("invalid scoring configuration: {0}")]
    Scoring(#[from] ScoringConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("AI backend: {0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Invalid(String),
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// Minimum combined score for a tender to qualify
    pub threshold: u32,
    pub weights: ScoringWeights,
    pub blend: BlendWeights,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            threshold: u32::from(DEFAULT_THRESHOLD),
            weights: ScoringWeights::default(),
            blend: BlendWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub model: String,
    /// Bound on a single assessment
    pub timeout_secs: f64,
    /// OpenAI-compatible base url (OpenRouter, local servers)
    pub base_url: Option<String>,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::OpenAi,
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: DEFAULT_AI_TIMEOUT.as_secs_f64(),
            base_url: None,
        }
    }
}

impl AiSection {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(DEFAULT_AI_TIMEOUT)
    }

    /// Build the assessor for this section.
    ///
    /// With AI disabled, or enabled but without a key for the chosen
    /// provider, the run scores rule-only.
    pub fn assessor(
        &self,
        openai_key: Option<&str>,
        anthropic_key: Option<&str>,
    ) -> Result<SharedAssessor, ConfigError> {
        if !self.enabled {
            return Ok(Arc::new(NoopAssessor));
        }

        let key = match self.provider {
            LlmProvider::OpenAi => openai_key,
            LlmProvider::Anthropic => anthropic_key,
        };
        let connected = connect_backend(
            self.provider,
            key.unwrap_or_default(),
            &self.model,
            self.base_url.as_deref(),
            self.timeout(),
        );

        match connected {
            Ok(backend) => {
                info!("AI scoring enabled with {}", backend.model_name());
                Ok(Arc::new(LlmAssessor::new(backend)))
            }
            Err(LlmError::MissingKey(_)) => {
                warn!("AI scoring enabled but no API key set, scoring rule-only");
                Ok(Arc::new(NoopAssessor))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Sites acquired at the same time
    pub max_concurrent_sites: usize,
    /// Tenders scored at the same time
    pub max_concurrent_scores: usize,
    /// Whole-run budget in seconds
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_concurrent_sites: 4,
            max_concurrent_scores: 4,
            deadline_secs: None,
        }
    }
}

/// Full run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub scraping: ScrapeConfig,
    pub scoring: ScoringSection,
    pub ai: AiSection,
    pub pipeline: PipelineSection,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scraping.validate()?;
        self.scoring.weights.validate()?;
        self.scoring.blend.validate()?;
        validate_threshold(self.scoring.threshold)?;

        if !self.ai.timeout_secs.is_finite() || self.ai.timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "ai.timeout_secs must be a positive number".to_string(),
            ));
        }
        if self.ai.model.trim().is_empty() {
            return Err(ConfigError::Invalid("ai.model must not be empty".to_string()));
        }
        if self.pipeline.max_concurrent_sites == 0 || self.pipeline.max_concurrent_scores == 0 {
            return Err(ConfigError::Invalid(
                "pipeline concurrency limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn threshold(&self) -> Result<u8, ConfigError> {
        Ok(validate_threshold(self.scoring.threshold)?)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pipeline.deadline_secs.map(Duration::from_secs)
    }
}

/// The portals a run discovers from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteList {
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl SiteList {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let list: Self = toml::from_str(content)?;
        list.validate()?;
        Ok(list)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::Invalid("no sites configured".to_string()));
        }
        for site in &self.sites {
            site.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.scraping.timeout_secs, 30);
        assert_eq!(config.scraping.max_retries, 3);
        assert_eq!(config.scraping.requests_per_minute, 60);
        assert_eq!(config.threshold().unwrap(), 50);
        assert!(config.ai.enabled);
        assert_eq!(config.ai.model, "gpt-3.5-turbo");
        assert_eq!(config.ai.timeout(), Duration::from_secs(8));
    }

    #[test]
    fn test_partial_sections() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [scraping]
            delay_between_requests_secs = 0.5

            [scoring]
            threshold = 65

            [scoring.weights]
            industry = 0.30
            certification = 0.0

            [ai]
            provider = "anthropic"
            model = "claude-3-5-haiku-latest"

            [pipeline]
            deadline_secs = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.scraping.timeout_secs, 30);
        assert_eq!(config.scraping.delay_between_requests_secs, 0.5);
        assert_eq!(config.threshold().unwrap(), 65);
        assert_eq!(config.scoring.weights.industry, 0.30);
        assert_eq!(config.scoring.weights.location, 0.15);
        assert_eq!(config.ai.provider, LlmProvider::Anthropic);
        assert_eq!(config.deadline(), Some(Duration::from_secs(120)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_weights = PipelineConfig::from_toml_str("[scoring.weights]\nbudget = 0.5\n").unwrap();
        assert!(matches!(
            bad_weights.validate(),
            Err(ConfigError::Scoring(ScoringConfigError::WeightSum { .. }))
        ));

        let bad_blend = PipelineConfig::from_toml_str("[scoring.blend]\nrule = 0.9\n").unwrap();
        assert!(matches!(bad_blend.validate(), Err(ConfigError::Scoring(_))));

        let bad_threshold = PipelineConfig::from_toml_str("[scoring]\nthreshold = 150\n").unwrap();
        assert!(matches!(
            bad_threshold.validate(),
            Err(ConfigError::Scoring(ScoringConfigError::Threshold(150)))
        ));

        let bad_scraping = PipelineConfig::from_toml_str("[scraping]\ntimeout_secs = 0\n").unwrap();
        assert!(matches!(bad_scraping.validate(), Err(ConfigError::Scraping(_))));
    }

    #[test]
    fn test_site_list() {
        let list = SiteList::from_toml_str(
            r#"
            [[sites]]
            name = "County Portal"
            url = "https://tenders.county.example/open"
            rss_url = "https://tenders.county.example/feed.xml"

            [[sites]]
            name = "Ministry"
            url = "https://ministry.example/procurement"
            api_url = "https://ministry.example/api/v2/notices"
            "#,
        )
        .unwrap();
        assert_eq!(list.sites.len(), 2);
        assert_eq!(
            list.sites[0].rss_url.as_deref(),
            Some("https://tenders.county.example/feed.xml")
        );
        assert_eq!(list.sites[1].rss_url, None);
        assert_eq!(
            list.sites[1].api_url.as_deref(),
            Some("https://ministry.example/api/v2/notices")
        );

        assert!(SiteList::from_toml_str("").is_err());
        assert!(SiteList::from_toml_str("[[sites]]\nname = \"x\"\nurl = \"ftp://x\"\n").is_err());
    }

    #[test]
    fn test_assessor_without_key_is_disabled() {
        let section = AiSection::default();
        assert!(!section.assessor(None, None).unwrap().is_enabled());
        assert!(section.assessor(Some("sk-test"), None).unwrap().is_enabled());

        let disabled = AiSection {
            enabled: false,
            ..Default::default()
        };
        assert!(!disabled.assessor(Some("sk-test"), None).unwrap().is_enabled());

        let anthropic = AiSection {
            provider: LlmProvider::Anthropic,
            ..Default::default()
        };
        assert!(!anthropic.assessor(Some("sk-test"), None).unwrap().is_enabled());
        assert!(anthropic.assessor(None, Some("key")).unwrap().is_enabled());
    }
}
