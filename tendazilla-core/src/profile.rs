//! Company profile - the reference data tenders are scored against

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ModelError;

/// Budget band the company prefers to bid on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectSize {
    pub min_budget: f64,
    pub max_budget: f64,
}

impl Default for ProjectSize {
    fn default() -> Self {
        Self {
            min_budget: 20_000.0,
            max_budget: 500_000.0,
        }
    }
}

/// A prior engagement listed on the profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "industries")]
    pub industry_tags: BTreeSet<String>,
}

/// Scoring reference data supplied by the caller, read-only for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_name: String,
    #[serde(default)]
    pub industry_focus: BTreeSet<String>,
    #[serde(default)]
    pub core_services: BTreeSet<String>,
    #[serde(default)]
    pub preferred_project_size: ProjectSize,
    #[serde(default, alias = "past_projects")]
    pub past_experience: Vec<Engagement>,
    #[serde(default)]
    pub certifications: BTreeSet<String>,
    /// Preferred delivery locations, most preferred first
    #[serde(default, alias = "geographical_focus")]
    pub locations: Vec<String>,
    #[serde(default)]
    pub headquarters: Option<String>,
    #[serde(default)]
    pub relevant_technologies: BTreeSet<String>,
}

impl CompanyProfile {
    pub fn new(company_name: &str) -> Self {
        Self {
            company_name: company_name.to_string(),
            industry_focus: BTreeSet::new(),
            core_services: BTreeSet::new(),
            preferred_project_size: ProjectSize::default(),
            past_experience: Vec::new(),
            certifications: BTreeSet::new(),
            locations: Vec::new(),
            headquarters: None,
            relevant_technologies: BTreeSet::new(),
        }
    }

    /// Parse a profile from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let profile: Self = serde_json::from_str(json).map_err(|e| ModelError::Parse {
            what: "company profile",
            reason: e.to_string(),
        })?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let ProjectSize { min_budget, max_budget } = self.preferred_project_size;
        if !min_budget.is_finite() || min_budget < 0.0 {
            return Err(ModelError::InvalidBudget(min_budget));
        }
        if !max_budget.is_finite() || max_budget < 0.0 {
            return Err(ModelError::InvalidBudget(max_budget));
        }
        if min_budget > max_budget {
            return Err(ModelError::ProjectSize {
                min: min_budget,
                max: max_budget,
            });
        }
        Ok(())
    }

    /// Preferred locations followed by the headquarters, if set
    pub fn preferred_locations(&self) -> impl Iterator<Item = &str> {
        self.locations
            .iter()
            .map(String::as_str)
            .chain(self.headquarters.as_deref())
            .filter(|l| !l.trim().is_empty())
    }
}
