//! Scoring output types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six rule-based scoring criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    IndustryMatch,
    LocationMatch,
    BudgetMatch,
    TechnicalMatch,
    ExperienceMatch,
    CertificationMatch,
}

impl Criterion {
    pub const ALL: [Criterion; 6] = [
        Criterion::IndustryMatch,
        Criterion::LocationMatch,
        Criterion::BudgetMatch,
        Criterion::TechnicalMatch,
        Criterion::ExperienceMatch,
        Criterion::CertificationMatch,
    ];

    /// Human-readable name used in justifications
    pub fn label(&self) -> &'static str {
        match self {
            Criterion::IndustryMatch => "Industry Match",
            Criterion::LocationMatch => "Location Match",
            Criterion::BudgetMatch => "Budget Match",
            Criterion::TechnicalMatch => "Technical Match",
            Criterion::ExperienceMatch => "Experience Match",
            Criterion::CertificationMatch => "Certification Match",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of a rule-score breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: Criterion,
    /// Sub-score on the 0-100 scale
    pub score: u8,
    pub weight: f64,
    /// `score * weight`, before rounding
    pub contribution: f64,
    pub reason: String,
}

/// State of the AI signal for one scored tender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AiStatus {
    /// AI score present and blended in
    Used,
    /// AI scoring switched off for the run
    Disabled,
    /// AI enabled but the collaborator failed or timed out; rule-only
    Unavailable { reason: String },
}

impl AiStatus {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AiStatus::Unavailable { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    RuleBased,
    Hybrid,
}

/// Result of scoring one tender against one company profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub tender_url: String,
    pub rule_score: u8,
    pub ai_score: Option<u8>,
    pub combined_score: u8,
    pub qualifies: bool,
    /// One reason per criterion, the AI rationale if any, then the verdict
    pub justification: Vec<String>,
    pub breakdown: Vec<CriterionScore>,
    pub ai_status: AiStatus,
    pub method: ScoringMethod,
    pub scored_at: DateTime<Utc>,
}

impl ScoreResult {
    /// Final verdict sentence (last justification line)
    pub fn verdict(&self) -> Option<&str> {
        self.justification.last().map(String::as_str)
    }

    /// Sub-score for a single criterion
    pub fn criterion_score(&self, criterion: Criterion) -> Option<u8> {
        self.breakdown
            .iter()
            .find(|c| c.criterion == criterion)
            .map(|c| c.score)
    }
}
