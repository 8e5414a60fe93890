//! Tendazilla CLI
//!
//! Discover public tenders and qualify them against a company profile.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use tendazilla_agents::SharedAssessor;
use tendazilla_core::{AiStatus, CompanyProfile, ScoreResult, TenderRecord};
use tendazilla_net::{NoopRenderer, SharedRenderer};
use tendazilla_runtime::{Pipeline, PipelineConfig, RunReport, SiteList, SiteOutcome};

#[derive(Parser)]
#[command(name = "tendazilla")]
#[command(author, version, about = "Tendazilla: tender discovery and qualification", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

/// Settings layered over the configuration file
#[derive(Args)]
struct Overrides {
    /// Request timeout in seconds
    #[arg(long, env = "SCRAPING_TIMEOUT", global = true)]
    scraping_timeout: Option<u64>,

    /// Retries per request on transient failures
    #[arg(long, env = "SCRAPING_MAX_RETRIES", global = true)]
    max_retries: Option<u32>,

    /// Minimum delay between requests to one host, in seconds
    #[arg(long, env = "SCRAPING_DELAY_BETWEEN_REQUESTS", global = true)]
    request_delay: Option<f64>,

    /// Requests-per-minute cap per host
    #[arg(long, env = "RATE_LIMIT_REQUESTS_PER_MINUTE", global = true)]
    requests_per_minute: Option<u32>,

    /// Qualification threshold (0-100)
    #[arg(long, env = "SCORING_THRESHOLD", global = true)]
    threshold: Option<u32>,

    /// Enable or disable AI scoring
    #[arg(long, env = "SCORING_AI_ENABLED", global = true)]
    ai_enabled: Option<bool>,

    /// Model used for AI scoring
    #[arg(long, env = "SCORING_AI_MODEL", global = true)]
    ai_model: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_key: Option<String>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, global = true)]
    anthropic_key: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(timeout) = self.scraping_timeout {
            config.scraping.timeout_secs = timeout;
        }
        if let Some(retries) = self.max_retries {
            config.scraping.max_retries = retries;
        }
        if let Some(delay) = self.request_delay {
            config.scraping.delay_between_requests_secs = delay;
        }
        if let Some(rpm) = self.requests_per_minute {
            config.scraping.requests_per_minute = rpm;
        }
        if let Some(threshold) = self.threshold {
            config.scoring.threshold = threshold;
        }
        if let Some(enabled) = self.ai_enabled {
            config.ai.enabled = enabled;
        }
        if let Some(model) = &self.ai_model {
            config.ai.model = model.clone();
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tenders from every site and score them
    Run {
        /// Sites file (TOML, [[sites]] tables)
        #[arg(short, long)]
        sites: PathBuf,

        /// Company profile (JSON)
        #[arg(short, long)]
        profile: PathBuf,

        /// Budget for the whole run in seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Write the full run report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render script-driven pages with headless Chromium
        #[arg(long)]
        browser: bool,

        /// Chromium executable (default: autodetect)
        #[arg(long)]
        chrome_path: Option<PathBuf>,
    },

    /// Score a single tender record
    Score {
        /// Tender record (JSON, as found in a run report)
        #[arg(short, long)]
        tender: PathBuf,

        /// Company profile (JSON)
        #[arg(short, long)]
        profile: PathBuf,
    },

    /// Validate configuration, sites and profile without network access
    Check {
        /// Sites file (TOML)
        #[arg(short, long)]
        sites: Option<PathBuf>,

        /// Company profile (JSON)
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    cli.overrides.apply(&mut config);

    match cli.command {
        Commands::Run {
            sites,
            profile,
            deadline,
            output,
            browser,
            chrome_path,
        } => {
            let renderer = renderer(browser, chrome_path).await?;
            run(&config, &cli.overrides, &sites, &profile, deadline, output, renderer).await?;
        }
        Commands::Score { tender, profile } => {
            score(&config, &cli.overrides, &tender, &profile).await?;
        }
        Commands::Check { sites, profile } => {
            check(&config, sites.as_deref(), profile.as_deref())?;
        }
    }

    Ok(())
}

fn load_profile(path: &Path) -> Result<CompanyProfile> {
    let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    CompanyProfile::from_json(&json).with_context(|| format!("invalid profile {}", path.display()))
}

fn assessor(config: &PipelineConfig, overrides: &Overrides) -> Result<SharedAssessor> {
    Ok(config
        .ai
        .assessor(overrides.openai_key.as_deref(), overrides.anthropic_key.as_deref())?)
}

#[cfg(feature = "chromium")]
async fn renderer(browser: bool, chrome_path: Option<PathBuf>) -> Result<SharedRenderer> {
    if !browser {
        return Ok(Arc::new(NoopRenderer));
    }
    let chromium = tendazilla_net::ChromiumRenderer::launch(chrome_path)
        .await
        .context("launching headless Chromium")?;
    Ok(Arc::new(chromium))
}

#[cfg(not(feature = "chromium"))]
async fn renderer(browser: bool, _chrome_path: Option<PathBuf>) -> Result<SharedRenderer> {
    if browser {
        tracing::warn!("Built without the `chromium` feature, rendered-page strategy disabled");
    }
    Ok(Arc::new(NoopRenderer))
}

async fn run(
    config: &PipelineConfig,
    overrides: &Overrides,
    sites_path: &Path,
    profile_path: &Path,
    deadline: Option<u64>,
    output: Option<PathBuf>,
    renderer: SharedRenderer,
) -> Result<()> {
    println!("🦖 Tendazilla - tender discovery and qualification\n");

    let sites = SiteList::load(sites_path)
        .with_context(|| format!("loading sites from {}", sites_path.display()))?;
    let profile = load_profile(profile_path)?;
    let pipeline = Pipeline::from_config(config, assessor(config, overrides)?, renderer)?;

    let budget = deadline.map(Duration::from_secs).or_else(|| config.deadline());
    println!("🏢 Company: {}", profile.company_name);
    println!("🌐 Sites: {}", sites.sites.len());
    println!(
        "🧮 Threshold: {} | AI: {}\n",
        config.threshold()?,
        if pipeline.scorer().ai_enabled() { config.ai.model.as_str() } else { "disabled" }
    );

    let report = pipeline.run(&sites.sites, &profile, budget).await?;
    print_report(&report);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("\n📄 Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let summary = report.summary();

    println!("{}", "=".repeat(60));
    for site in &report.sites {
        let outcome = match site.outcome {
            SiteOutcome::Discovered { strategy } => format!("discovered via {}", strategy),
            SiteOutcome::Degraded => "degraded (sample data used)".to_string(),
            SiteOutcome::Cancelled => "cancelled".to_string(),
        };
        println!("  {} - {} ({} records)", site.site, outcome, site.records);
        for failure in &site.failures {
            println!("      {}: {}", failure.strategy, failure.error);
        }
    }

    println!(
        "\n📊 Sites: {} discovered, {} degraded, {} cancelled",
        summary.sites_discovered, summary.sites_degraded, summary.sites_cancelled
    );
    println!(
        "📋 Tenders: {} found, {} qualified (threshold {})",
        summary.tenders, summary.qualified, report.threshold
    );
    if report.ai_enabled {
        println!(
            "🤖 AI: used for {}, unavailable for {} (rule-only)",
            summary.ai_used, summary.ai_unavailable
        );
    } else {
        println!("🤖 AI: disabled");
    }

    let qualified = report.qualified();
    if !qualified.is_empty() {
        println!("\n✅ Qualified tenders:");
        for score in qualified {
            let title = report
                .tender(&score.tender_url)
                .map(|t| t.title.as_str())
                .unwrap_or("(untitled)");
            println!("  [{:>3}] {} - {}", score.combined_score, title, score.tender_url);
        }
    }
}

async fn score(
    config: &PipelineConfig,
    overrides: &Overrides,
    tender_path: &Path,
    profile_path: &Path,
) -> Result<()> {
    let json = fs::read_to_string(tender_path)
        .with_context(|| format!("reading {}", tender_path.display()))?;
    let tender: TenderRecord = serde_json::from_str(&json)
        .with_context(|| format!("invalid tender record {}", tender_path.display()))?;
    tender.validate()?;
    let profile = load_profile(profile_path)?;

    let assessor = assessor(config, overrides)?;
    let pipeline = Pipeline::from_config(config, assessor, Arc::new(NoopRenderer))?;
    let result = pipeline.score(&tender, &profile).await;
    print_score(&tender, &result);
    Ok(())
}

fn print_score(tender: &TenderRecord, result: &ScoreResult) {
    println!("📋 {}", tender.title);
    println!("   {}\n", tender.url);
    println!(
        "Rule score: {} | AI score: {} | Combined: {}",
        result.rule_score,
        result
            .ai_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        result.combined_score
    );
    match &result.ai_status {
        AiStatus::Used => {}
        AiStatus::Disabled => println!("AI disabled"),
        AiStatus::Unavailable { reason } => println!("AI unavailable, rule-only: {}", reason),
    }
    println!();
    for line in &result.justification {
        println!("  • {}", line);
    }
    println!(
        "\n{}",
        if result.qualifies { "✅ Qualifies" } else { "❌ Does not qualify" }
    );
}

fn check(config: &PipelineConfig, sites: Option<&Path>, profile: Option<&Path>) -> Result<()> {
    config.validate().context("invalid configuration")?;
    println!("✅ Configuration OK (threshold {})", config.threshold()?);

    if let Some(path) = sites {
        let list = SiteList::load(path)
            .with_context(|| format!("loading sites from {}", path.display()))?;
        println!("✅ {} sites OK", list.sites.len());
    }
    if let Some(path) = profile {
        let profile = load_profile(path)?;
        println!("✅ Profile OK: {}", profile.company_name);
    }
    Ok(())
}
