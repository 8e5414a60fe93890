//! Scoring and blend weights

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tendazilla_core::Criterion;

const SUM_TOLERANCE: f64 = 1e-6;

/// Invalid scoring configuration. Fatal at run start.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringConfigError {
    #[error("weight for {name} must be within [0, 1], got {value}")]
    WeightOutOfRange { name: &'static str, value: f64 },

    #[error("{what} weights must sum to 1.0, got {sum}")]
    WeightSum { what: &'static str, sum: f64 },

    #[error("threshold must be within 0-100, got {0}")]
    Threshold(u32),
}

fn check_unit(name: &'static str, value: f64) -> Result<(), ScoringConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ScoringConfigError::WeightOutOfRange { name, value })
    }
}

/// Per-criterion weights of the rule score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub industry: f64,
    pub location: f64,
    pub budget: f64,
    pub technical: f64,
    pub experience: f64,
    pub certification: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            industry: 0.20,
            location: 0.15,
            budget: 0.20,
            technical: 0.20,
            experience: 0.15,
            certification: 0.10,
        }
    }
}

impl ScoringWeights {
    pub fn get(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::IndustryMatch => self.industry,
            Criterion::LocationMatch => self.location,
            Criterion::BudgetMatch => self.budget,
            Criterion::TechnicalMatch => self.technical,
            Criterion::ExperienceMatch => self.experience,
            Criterion::CertificationMatch => self.certification,
        }
    }

    pub fn sum(&self) -> f64 {
        Criterion::ALL.iter().map(|c| self.get(*c)).sum()
    }

    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        check_unit("industry", self.industry)?;
        check_unit("location", self.location)?;
        check_unit("budget", self.budget)?;
        check_unit("technical", self.technical)?;
        check_unit("experience", self.experience)?;
        check_unit("certification", self.certification)?;

        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(ScoringConfigError::WeightSum { what: "scoring", sum });
        }
        Ok(())
    }
}

/// Weights of the rule and AI scores in the combined score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub rule: f64,
    pub ai: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self { rule: 0.7, ai: 0.3 }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> Result<(), ScoringConfigError> {
        check_unit("rule", self.rule)?;
        check_unit("ai", self.ai)?;
        let sum = self.rule + self.ai;
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(ScoringConfigError::WeightSum { what: "blend", sum });
        }
        Ok(())
    }

    /// `round(rule * w_rule + ai * w_ai)`
    pub fn combine(&self, rule_score: u8, ai_score: u8) -> u8 {
        let blended = self.rule * f64::from(rule_score) + self.ai * f64::from(ai_score);
        blended.round().clamp(0.0, 100.0) as u8
    }
}

/// Check a qualification threshold
pub fn validate_threshold(threshold: u32) -> Result<u8, ScoringConfigError> {
    u8::try_from(threshold)
        .ok()
        .filter(|t| *t <= 100)
        .ok_or(ScoringConfigError::Threshold(threshold))
}
