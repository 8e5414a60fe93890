//! Tender records
//!
//! A [`TenderRecord`] is one published procurement opportunity as seen by an
//! acquisition strategy. Records are built through [`TenderRecordBuilder`],
//! which refuses to produce a record that breaks the url or budget invariants.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ModelError;

/// Which acquisition path produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Structured JSON from a probed API endpoint
    Api,
    /// Items of the site's RSS or Atom feed
    Rss,
    /// Listing markup fetched with a plain HTTP GET
    StaticMarkup,
    /// Listing markup from a headless-browser render
    RenderedPage,
    /// Synthetic record substituted in degraded mode
    Sample,
}

impl Provenance {
    pub fn is_sample(&self) -> bool {
        matches!(self, Provenance::Sample)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provenance::Api => "api",
            Provenance::Rss => "rss",
            Provenance::StaticMarkup => "static_markup",
            Provenance::RenderedPage => "rendered_page",
            Provenance::Sample => "sample",
        };
        f.write_str(name)
    }
}

/// A discovered procurement opportunity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    /// Name of the site the record came from
    pub source_site: String,
    /// Unique key within a discovery run
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub industry_tags: BTreeSet<String>,
    #[serde(default)]
    pub location: String,
    /// Lower budget bound; `None` means unspecified
    #[serde(default)]
    pub budget_min: Option<f64>,
    /// Upper budget bound; `None` means unspecified
    #[serde(default)]
    pub budget_max: Option<f64>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    /// Requirement lines as published (certifications, experience, ...)
    #[serde(default)]
    pub requirements: Vec<String>,
    /// Tender or notice number, when published
    #[serde(default)]
    pub reference: Option<String>,
    /// Source fields kept verbatim
    #[serde(default)]
    pub raw_metadata: BTreeMap<String, serde_json::Value>,
    pub provenance: Provenance,
    pub discovered_at: DateTime<Utc>,
}

impl TenderRecord {
    /// Start building a record for `url` discovered on `source_site`
    pub fn builder(source_site: &str, url: &str, provenance: Provenance) -> TenderRecordBuilder {
        TenderRecordBuilder::new(source_site, url, provenance)
    }

    /// Check the record invariants
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.url.trim().is_empty() {
            return Err(ModelError::EmptyUrl);
        }
        for bound in [self.budget_min, self.budget_max].into_iter().flatten() {
            if !bound.is_finite() || bound < 0.0 {
                return Err(ModelError::InvalidBudget(bound));
            }
        }
        if let (Some(min), Some(max)) = (self.budget_min, self.budget_max) {
            if min > max {
                return Err(ModelError::BudgetRange { min, max });
            }
        }
        Ok(())
    }

    /// Whether this is a degraded-mode sample rather than live data
    pub fn is_sample(&self) -> bool {
        self.provenance.is_sample()
    }

    /// Budget as an inclusive range, if any bound is known.
    /// A single known bound is treated as a point value.
    pub fn budget_range(&self) -> Option<(f64, f64)> {
        match (self.budget_min, self.budget_max) {
            (Some(min), Some(max)) => Some((min, max)),
            (Some(v), None) | (None, Some(v)) => Some((v, v)),
            (None, None) => None,
        }
    }

    /// Lowercased title, description, tags and requirements joined for keyword search
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.title, &self.description];
        parts.extend(self.industry_tags.iter().map(String::as_str));
        parts.extend(self.requirements.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }
}

/// Builder for [`TenderRecord`]
#[derive(Debug, Clone)]
pub struct TenderRecordBuilder {
    record: TenderRecord,
}

impl TenderRecordBuilder {
    pub fn new(source_site: &str, url: &str, provenance: Provenance) -> Self {
        Self {
            record: TenderRecord {
                source_site: source_site.to_string(),
                url: url.trim().to_string(),
                title: String::new(),
                description: String::new(),
                industry_tags: BTreeSet::new(),
                location: String::new(),
                budget_min: None,
                budget_max: None,
                deadline: None,
                requirements: Vec::new(),
                reference: None,
                raw_metadata: BTreeMap::new(),
                provenance,
                discovered_at: Utc::now(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.record.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.record.description = description.into();
        self
    }

    pub fn industry_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !tag.trim().is_empty() {
            self.record.industry_tags.insert(tag.trim().to_string());
        }
        self
    }

    pub fn industry_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self = self.industry_tag(tag);
        }
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.record.location = location.into();
        self
    }

    pub fn budget(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.record.budget_min = min;
        self.record.budget_max = max;
        self
    }

    pub fn deadline(mut self, deadline: Option<NaiveDate>) -> Self {
        self.record.deadline = deadline;
        self
    }

    pub fn requirement(mut self, requirement: impl Into<String>) -> Self {
        let requirement = requirement.into();
        if !requirement.trim().is_empty() {
            self.record.requirements.push(requirement.trim().to_string());
        }
        self
    }

    pub fn requirements<I, S>(mut self, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for requirement in requirements {
            self = self.requirement(requirement);
        }
        self
    }

    pub fn reference(mut self, reference: Option<String>) -> Self {
        self.record.reference = reference.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.record.raw_metadata.insert(key.to_string(), value);
        self
    }

    pub fn raw_metadata(mut self, metadata: BTreeMap<String, serde_json::Value>) -> Self {
        self.record.raw_metadata.extend(metadata);
        self
    }

    pub fn discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.record.discovered_at = at;
        self
    }

    /// Validate and return the record
    pub fn build(self) -> Result<TenderRecord, ModelError> {
        self.record.validate()?;
        Ok(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_valid_record() {
        let record = TenderRecord::builder("portal", "https://portal.example/t/1", Provenance::Api)
            .title("Supply of laptops")
            .industry_tags(["IT", " ", "Education"])
            .budget(Some(80_000.0), Some(120_000.0))
            .requirement("ISO 27001 certification")
            .build()
            .unwrap();

        assert_eq!(record.industry_tags.len(), 2);
        assert_eq!(record.budget_range(), Some((80_000.0, 120_000.0)));
        assert_eq!(record.requirements.len(), 1);
        assert!(!record.is_sample());
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = TenderRecord::builder("portal", "   ", Provenance::StaticMarkup)
            .title("Anything")
            .build();
        assert_eq!(result.unwrap_err(), ModelError::EmptyUrl);
    }

    #[test]
    fn test_inverted_budget_rejected() {
        let result = TenderRecord::builder("portal", "https://x.example", Provenance::Api)
            .budget(Some(10.0), Some(5.0))
            .build();
        assert!(matches!(result, Err(ModelError::BudgetRange { .. })));

        let result = TenderRecord::builder("portal", "https://x.example", Provenance::Api)
            .budget(Some(f64::NAN), None)
            .build();
        assert!(matches!(result, Err(ModelError::InvalidBudget(_))));
    }

    #[test]
    fn test_single_bound_budget_is_point() {
        let record = TenderRecord::builder("portal", "https://x.example", Provenance::Api)
            .budget(None, Some(250_000.0))
            .build()
            .unwrap();
        assert_eq!(record.budget_range(), Some((250_000.0, 250_000.0)));
    }

    #[test]
    fn test_searchable_text_is_lowercase() {
        let record = TenderRecord::builder("portal", "https://x.example", Provenance::Api)
            .title("Cloud MIGRATION")
            .industry_tag("IT")
            .build()
            .unwrap();
        let text = record.searchable_text();
        assert!(text.contains("cloud migration"));
        assert!(text.contains("it"));
    }
}
