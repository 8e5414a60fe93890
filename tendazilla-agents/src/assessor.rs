//! AI assessment collaborator
//!
//! Asks an LLM for a 0-100 fit score and a rationale. Any failure is an
//! [`AiUnavailable`], which the hybrid scorer absorbs by going rule-only.

use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use tendazilla_core::{CompanyProfile, TenderRecord};

use crate::{LlmError, SharedBackend};

/// System prompt for tender assessment
const ASSESSOR_SYSTEM_PROMPT: &str = "You are an expert tender evaluation analyst. \
Analyze the tender opportunity against the company profile and provide a score \
from 0-100 with detailed reasoning.";

/// User prompt template for tender assessment
const ASSESSOR_USER_PROMPT: &str = r#"
Please evaluate this tender opportunity against the company profile and provide a score from 0-100.

TENDER DETAILS:
Title: {title}
Description: {description}
Budget: {budget}
Location: {location}
Industry: {industry}
Requirements: {requirements}
Deadline: {deadline}

COMPANY PROFILE:
Company: {company}
Industry Focus: {industry_focus}
Core Services: {core_services}
Certifications: {certifications}
Technologies: {technologies}
Past Projects: {past_projects} relevant projects
Preferred Budget Range: {min_budget} - {max_budget}

Please provide:
1. A score from 0-100
2. Detailed reasoning for the score
3. Key strengths and weaknesses

Format your response as:
Score: [number]
Reasoning: [detailed explanation]
"#;

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)score:\s*(\d+)").unwrap());
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\w+)\}").unwrap());
static REASONING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)reasoning:\s*(.+)").unwrap());

/// AI verdict on one tender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiAssessment {
    /// 0-100
    pub score: u8,
    pub rationale: String,
}

/// Why no AI score is available. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiUnavailable {
    #[error("AI scoring is disabled")]
    Disabled,

    #[error("AI assessment timed out after {0:?}")]
    Timeout(Duration),

    #[error("AI backend error: {0}")]
    Backend(String),

    #[error("AI reply carried no score")]
    Unparseable,
}

#[async_trait]
pub trait AiAssessor: Send + Sync {
    async fn assess(
        &self,
        tender: &TenderRecord,
        profile: &CompanyProfile,
    ) -> Result<AiAssessment, AiUnavailable>;

    fn model_name(&self) -> &str;

    /// Whether calling [`assess`](AiAssessor::assess) can produce a score at all
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Thread-safe reference to an assessor
pub type SharedAssessor = Arc<dyn AiAssessor>;

/// Assessor for runs without AI access
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAssessor;

#[async_trait]
impl AiAssessor for NoopAssessor {
    async fn assess(
        &self,
        _tender: &TenderRecord,
        _profile: &CompanyProfile,
    ) -> Result<AiAssessment, AiUnavailable> {
        Err(AiUnavailable::Disabled)
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

fn or_na(s: &str) -> String {
    if s.trim().is_empty() {
        "N/A".to_string()
    } else {
        s.to_string()
    }
}

fn joined<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    or_na(&items.into_iter().map(String::as_str).collect::<Vec<_>>().join(", "))
}

/// LLM-backed assessor
pub struct LlmAssessor {
    backend: SharedBackend,
}

impl LlmAssessor {
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    /// Fill the user prompt. The template is scanned once, so braces inside
    /// scraped tender text reach the model verbatim.
    fn build_prompt(tender: &TenderRecord, profile: &CompanyProfile) -> String {
        let size = &profile.preferred_project_size;

        PLACEHOLDER_RE
            .replace_all(ASSESSOR_USER_PROMPT, |c: &Captures| match &c[1] {
                "title" => or_na(&tender.title),
                "description" => or_na(&tender.description),
                "budget" => match tender.budget_range() {
                    Some((min, max)) if min == max => format!("{:.0}", min),
                    Some((min, max)) => format!("{:.0} - {:.0}", min, max),
                    None => "N/A".to_string(),
                },
                "location" => or_na(&tender.location),
                "industry" => joined(&tender.industry_tags),
                "requirements" => joined(&tender.requirements),
                "deadline" => tender
                    .deadline
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                "company" => or_na(&profile.company_name),
                "industry_focus" => joined(&profile.industry_focus),
                "core_services" => joined(&profile.core_services),
                "certifications" => joined(&profile.certifications),
                "technologies" => joined(&profile.relevant_technologies),
                "past_projects" => profile.past_experience.len().to_string(),
                "min_budget" => format!("{:.0}", size.min_budget),
                "max_budget" => format!("{:.0}", size.max_budget),
                _ => c[0].to_string(),
            })
            .into_owned()
    }
}

/// Parse a `Score: N / Reasoning: ...` reply. Scores are clamped to 100.
pub fn parse_assessment(reply: &str) -> Result<AiAssessment, AiUnavailable> {
    let score: u32 = SCORE_RE
        .captures(reply)
        .and_then(|c| c[1].parse().ok())
        .ok_or(AiUnavailable::Unparseable)?;
    let rationale = REASONING_RE
        .captures(reply)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| reply.trim().to_string());

    Ok(AiAssessment {
        score: score.min(100) as u8,
        rationale,
    })
}

#[async_trait]
impl AiAssessor for LlmAssessor {
    async fn assess(
        &self,
        tender: &TenderRecord,
        profile: &CompanyProfile,
    ) -> Result<AiAssessment, AiUnavailable> {
        let prompt = Self::build_prompt(tender, profile);
        debug!("Assessing {} with {}", tender.url, self.backend.model_name());

        let reply = self
            .backend
            .complete(ASSESSOR_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| match e {
                LlmError::Timeout(after) => AiUnavailable::Timeout(after),
                other => AiUnavailable::Backend(other.to_string()),
            })?;

        parse_assessment(&reply)
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmBackend;
    use parking_lot::Mutex;
    use tendazilla_core::Provenance;

    struct ScriptedBackend {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.prompts.lock().push(user.to_string());
            self.reply.clone().map_err(LlmError::Api)
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn tender() -> TenderRecord {
        TenderRecord::builder("Portal", "https://portal.example/t/1", Provenance::Api)
            .title("Cloud migration")
            .budget(Some(80_000.0), Some(120_000.0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_assessment() {
        let parsed = parse_assessment("Score: 72\nReasoning: Good service fit.\nWeak on certifications.").unwrap();
        assert_eq!(parsed.score, 72);
        assert_eq!(parsed.rationale, "Good service fit.\nWeak on certifications.");

        assert_eq!(parse_assessment("score:140").unwrap().score, 100);
        assert_eq!(
            parse_assessment("I think this is a decent fit."),
            Err(AiUnavailable::Unparseable)
        );
    }

    #[test]
    fn test_rationale_defaults_to_whole_reply() {
        let parsed = parse_assessment("  Score: 40 - limited fit  ").unwrap();
        assert_eq!(parsed.rationale, "Score: 40 - limited fit");
    }

    #[tokio::test]
    async fn test_llm_assessor_builds_prompt() {
        let backend = Arc::new(ScriptedBackend {
            reply: Ok("Score: 65\nReasoning: Solid.".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let assessor = LlmAssessor::new(backend.clone());
        let profile = CompanyProfile::new("Spree Digital");

        let assessment = assessor.assess(&tender(), &profile).await.unwrap();
        assert_eq!(assessment.score, 65);
        assert_eq!(assessor.model_name(), "scripted");

        let prompts = backend.prompts.lock();
        assert!(prompts[0].contains("Title: Cloud migration"));
        assert!(prompts[0].contains("Budget: 80000 - 120000"));
        assert!(prompts[0].contains("Location: N/A"));
        assert!(prompts[0].contains("Company: Spree Digital"));
    }

    #[tokio::test]
    async fn test_braces_in_tender_text_stay_literal() {
        let backend = Arc::new(ScriptedBackend {
            reply: Ok("Score: 50".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let assessor = LlmAssessor::new(backend.clone());
        let tender = TenderRecord::builder("Portal", "https://portal.example/t/2", Provenance::Api)
            .title("Supply of {company} branded laptops")
            .description("Budget between {min_budget} and {max_budget}")
            .build()
            .unwrap();

        assessor.assess(&tender, &CompanyProfile::new("Acme Ltd")).await.unwrap();

        let prompts = backend.prompts.lock();
        assert!(prompts[0].contains("Title: Supply of {company} branded laptops"));
        assert!(prompts[0].contains("Description: Budget between {min_budget} and {max_budget}"));
        assert!(prompts[0].contains("Company: Acme Ltd"));
    }

    #[tokio::test]
    async fn test_backend_error_is_unavailable() {
        let backend = Arc::new(ScriptedBackend {
            reply: Err("503".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let assessor = LlmAssessor::new(backend);

        let result = assessor.assess(&tender(), &CompanyProfile::new("Acme")).await;
        assert!(matches!(result, Err(AiUnavailable::Backend(_))));
    }

    struct SlowBackend;

    #[async_trait]
    impl LlmBackend for SlowBackend {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Err(LlmError::Timeout(Duration::from_secs(8)))
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_backend_timeout_is_reported_as_timeout() {
        let assessor = LlmAssessor::new(Arc::new(SlowBackend));
        let result = assessor.assess(&tender(), &CompanyProfile::new("Acme")).await;
        assert_eq!(result, Err(AiUnavailable::Timeout(Duration::from_secs(8))));
    }

    #[tokio::test]
    async fn test_noop_assessor() {
        let assessor = NoopAssessor;
        assert!(!assessor.is_enabled());
        let result = assessor.assess(&tender(), &CompanyProfile::new("Acme")).await;
        assert_eq!(result, Err(AiUnavailable::Disabled));
    }
}
