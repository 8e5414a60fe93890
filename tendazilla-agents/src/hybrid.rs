//! Hybrid scorer
//!
//! Runs the rule scorer, optionally blends in an AI score, and produces the
//! final [`ScoreResult`] with its justification. A failing or slow AI
//! collaborator never fails the evaluation: the tender is scored rule-only.

use chrono::Utc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use tendazilla_core::{
    AiStatus, CompanyProfile, CriterionScore, ScoreResult, ScoringMethod, TenderRecord,
};

use crate::{AiAssessment, AiUnavailable, BlendWeights, RuleScorer, ScoringConfigError, SharedAssessor};

/// Default bound on a single AI assessment
pub const DEFAULT_AI_TIMEOUT: Duration = Duration::from_secs(8);

const STRENGTH_SCORE: u8 = 75;
const WEAKNESS_SCORE: u8 = 25;

pub struct HybridScorer {
    rules: RuleScorer,
    assessor: SharedAssessor,
    blend: BlendWeights,
    ai_timeout: Duration,
}

impl HybridScorer {
    pub fn new(
        rules: RuleScorer,
        assessor: SharedAssessor,
        blend: BlendWeights,
        ai_timeout: Duration,
    ) -> Result<Self, ScoringConfigError> {
        blend.validate()?;
        Ok(Self {
            rules,
            assessor,
            blend,
            ai_timeout,
        })
    }

    pub fn rules(&self) -> &RuleScorer {
        &self.rules
    }

    pub fn ai_enabled(&self) -> bool {
        self.assessor.is_enabled()
    }

    /// Score `tender` against `profile`
    pub async fn evaluate(
        &self,
        tender: &TenderRecord,
        profile: &CompanyProfile,
        threshold: u8,
    ) -> ScoreResult {
        self.evaluate_until(tender, profile, threshold, None).await
    }

    /// Like [`evaluate`](Self::evaluate), but the AI call is cut off at `deadline`
    pub async fn evaluate_until(
        &self,
        tender: &TenderRecord,
        profile: &CompanyProfile,
        threshold: u8,
        deadline: Option<Instant>,
    ) -> ScoreResult {
        let rule = self.rules.score(tender, profile);

        let ai = if self.assessor.is_enabled() {
            Some(self.assess(tender, profile, deadline).await)
        } else {
            None
        };

        let (ai_score, ai_status, rationale) = match ai {
            None => (None, AiStatus::Disabled, None),
            Some(Ok(assessment)) => (
                Some(assessment.score),
                AiStatus::Used,
                Some(assessment.rationale),
            ),
            Some(Err(reason)) => {
                warn!("AI unavailable for {}, scoring rule-only: {}", tender.url, reason);
                (
                    None,
                    AiStatus::Unavailable {
                        reason: reason.to_string(),
                    },
                    None,
                )
            }
        };

        let combined_score = match ai_score {
            Some(ai) => self.blend.combine(rule.score, ai),
            None => rule.score,
        };
        let qualifies = combined_score >= threshold;

        let mut justification: Vec<String> = rule
            .breakdown
            .iter()
            .map(|c| format!("{}: {}/100 - {}", c.criterion.label(), c.score, c.reason))
            .collect();
        if let (Some(score), Some(rationale)) = (ai_score, rationale) {
            justification.push(format!("AI Assessment: {}/100 - {}", score, rationale));
        }
        justification.push(verdict(combined_score, threshold, qualifies, &rule.breakdown));

        debug!(
            "Scored {}: rule={} ai={:?} combined={}",
            tender.url, rule.score, ai_score, combined_score
        );

        ScoreResult {
            tender_url: tender.url.clone(),
            rule_score: rule.score,
            ai_score,
            combined_score,
            qualifies,
            justification,
            breakdown: rule.breakdown,
            ai_status,
            method: if ai_score.is_some() {
                ScoringMethod::Hybrid
            } else {
                ScoringMethod::RuleBased
            },
            scored_at: Utc::now(),
        }
    }

    async fn assess(
        &self,
        tender: &TenderRecord,
        profile: &CompanyProfile,
        deadline: Option<Instant>,
    ) -> Result<AiAssessment, AiUnavailable> {
        let budget = match deadline {
            Some(deadline) => self
                .ai_timeout
                .min(deadline.saturating_duration_since(Instant::now())),
            None => self.ai_timeout,
        };
        if budget.is_zero() {
            return Err(AiUnavailable::Timeout(budget));
        }

        timeout(budget, self.assessor.assess(tender, profile))
            .await
            .unwrap_or(Err(AiUnavailable::Timeout(budget)))
    }
}

fn verdict(combined: u8, threshold: u8, qualifies: bool, breakdown: &[CriterionScore]) -> String {
    let fit = match combined {
        80.. => "Excellent",
        65..=79 => "Strong",
        50..=64 => "Moderate",
        _ => "Weak",
    };
    let mut sentence = format!("{} fit with an overall score of {}/100.", fit, combined);

    let named = |keep: &dyn Fn(u8) -> bool| {
        breakdown
            .iter()
            .filter(|c| keep(c.score))
            .map(|c| c.criterion.label().to_lowercase())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let strengths = named(&|s| s >= STRENGTH_SCORE);
    let weaknesses = named(&|s| s <= WEAKNESS_SCORE);
    if !strengths.is_empty() {
        sentence.push_str(&format!(" Strengths: {}.", strengths));
    }
    if !weaknesses.is_empty() {
        sentence.push_str(&format!(" Weaknesses: {}.", weaknesses));
    }

    if qualifies {
        sentence.push_str(&format!(" Qualifies (threshold {}).", threshold));
    } else {
        sentence.push_str(&format!(" Does not qualify (threshold {}).", threshold));
    }
    sentence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AiAssessor, NoopAssessor};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tendazilla_core::{Criterion, Provenance};

    struct FixedAssessor {
        score: u8,
        delay: Duration,
    }

    #[async_trait]
    impl AiAssessor for FixedAssessor {
        async fn assess(
            &self,
            _tender: &TenderRecord,
            _profile: &CompanyProfile,
        ) -> Result<AiAssessment, AiUnavailable> {
            tokio::time::sleep(self.delay).await;
            Ok(AiAssessment {
                score: self.score,
                rationale: "Relevant delivery track record.".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    struct BrokenAssessor;

    #[async_trait]
    impl AiAssessor for BrokenAssessor {
        async fn assess(
            &self,
            _tender: &TenderRecord,
            _profile: &CompanyProfile,
        ) -> Result<AiAssessment, AiUnavailable> {
            Err(AiUnavailable::Backend("connection reset".to_string()))
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    fn scorer(assessor: SharedAssessor) -> HybridScorer {
        HybridScorer::new(
            RuleScorer::default(),
            assessor,
            BlendWeights::default(),
            Duration::from_millis(200),
        )
        .unwrap()
    }

    fn tender() -> TenderRecord {
        TenderRecord::builder("Portal", "https://portal.example/t/9", Provenance::Api)
            .title("Cloud migration of tax systems")
            .industry_tag("Information Technology")
            .location("Berlin, Germany")
            .budget(Some(80_000.0), Some(120_000.0))
            .build()
            .unwrap()
    }

    fn profile() -> CompanyProfile {
        let mut profile = CompanyProfile::new("Spree Digital");
        profile.industry_focus.insert("Information Technology".to_string());
        profile.core_services.insert("cloud migration".to_string());
        profile.locations.push("Berlin".to_string());
        profile
    }

    #[tokio::test]
    async fn test_combined_score_blends_ai() {
        let hybrid = scorer(Arc::new(FixedAssessor {
            score: 60,
            delay: Duration::ZERO,
        }));

        let result = hybrid.evaluate(&tender(), &profile(), 50).await;
        assert_eq!(result.ai_score, Some(60));
        assert_eq!(result.ai_status, AiStatus::Used);
        assert_eq!(result.method, ScoringMethod::Hybrid);
        let expected = (0.7 * f64::from(result.rule_score) + 0.3 * 60.0).round() as u8;
        assert_eq!(result.combined_score, expected);
        assert_eq!(result.qualifies, expected >= 50);

        // six criteria, AI rationale, verdict
        assert_eq!(result.justification.len(), 8);
        assert!(result.justification[6].starts_with("AI Assessment: 60/100"));
    }

    #[tokio::test]
    async fn test_slow_ai_falls_back_to_rules() {
        let hybrid = scorer(Arc::new(FixedAssessor {
            score: 95,
            delay: Duration::from_secs(30),
        }));

        let result = hybrid.evaluate(&tender(), &profile(), 50).await;
        assert_eq!(result.ai_score, None);
        assert!(result.ai_status.is_unavailable());
        assert_eq!(result.method, ScoringMethod::RuleBased);
        assert_eq!(result.combined_score, result.rule_score);
        assert_eq!(result.justification.len(), 7);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_skips_ai() {
        let hybrid = scorer(Arc::new(FixedAssessor {
            score: 95,
            delay: Duration::ZERO,
        }));

        let result = hybrid
            .evaluate_until(&tender(), &profile(), 50, Some(Instant::now()))
            .await;
        assert!(result.ai_status.is_unavailable());
        assert_eq!(result.combined_score, result.rule_score);
    }

    #[tokio::test]
    async fn test_backend_failure_is_rule_only() {
        let result = scorer(Arc::new(BrokenAssessor))
            .evaluate(&tender(), &profile(), 50)
            .await;
        assert_eq!(
            result.ai_status,
            AiStatus::Unavailable {
                reason: "AI backend error: connection reset".to_string()
            }
        );
        assert_eq!(result.combined_score, result.rule_score);
    }

    #[tokio::test]
    async fn test_disabled_ai() {
        let hybrid = scorer(Arc::new(NoopAssessor));
        assert!(!hybrid.ai_enabled());

        let result = hybrid.evaluate(&tender(), &profile(), 101).await;
        assert_eq!(result.ai_status, AiStatus::Disabled);
        assert_eq!(result.combined_score, result.rule_score);
        assert!(!result.qualifies);
        assert_eq!(result.criterion_score(Criterion::LocationMatch), Some(100));
        assert_eq!(result.criterion_score(Criterion::BudgetMatch), Some(100));
        assert!(result.verdict().unwrap().contains("Does not qualify"));
    }

    #[test]
    fn test_bad_blend_rejected() {
        let result = HybridScorer::new(
            RuleScorer::default(),
            Arc::new(NoopAssessor),
            BlendWeights { rule: 0.5, ai: 0.6 },
            DEFAULT_AI_TIMEOUT,
        );
        assert!(matches!(result, Err(ScoringConfigError::WeightSum { .. })));
    }

    #[test]
    fn test_verdict_tiers() {
        assert!(verdict(85, 50, true, &[]).starts_with("Excellent fit"));
        assert!(verdict(70, 50, true, &[]).starts_with("Strong fit"));
        assert!(verdict(50, 50, true, &[]).starts_with("Moderate fit"));
        assert!(verdict(49, 50, false, &[]).starts_with("Weak fit"));
    }
}
