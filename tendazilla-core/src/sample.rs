//! Synthetic sample data for degraded discovery
//!
//! When no acquisition strategy yields a record for a site, the orchestrator
//! substitutes exactly one sample record so later stages still run. The
//! record is tagged [`Provenance::Sample`] and carries `degraded: true` in its
//! metadata; it is never mistaken for live data.

use chrono::{Days, Utc};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::{Provenance, TenderRecord};

/// Build the sample record for a site
pub fn sample_tender(site_name: &str, site_url: &str) -> TenderRecord {
    let now = Utc::now();
    let base = site_url.trim().trim_end_matches('/');
    let url = if base.is_empty() {
        format!("sample://{}", crate::slugify(site_name))
    } else {
        format!("{}#tendazilla-sample", base)
    };

    let mut raw_metadata = BTreeMap::new();
    raw_metadata.insert("degraded".to_string(), json!(true));
    raw_metadata.insert("sample".to_string(), json!(true));

    TenderRecord {
        source_site: site_name.to_string(),
        url,
        title: "Cloud Migration Services for Government Agency".to_string(),
        description: "Seeking vendors to help migrate legacy systems to cloud \
                      infrastructure with security compliance requirements."
            .to_string(),
        industry_tags: BTreeSet::from(["Information Technology".to_string()]),
        location: "Kenya".to_string(),
        budget_min: Some(250_000.0),
        budget_max: Some(250_000.0),
        deadline: now.date_naive().checked_add_days(Days::new(30)),
        requirements: vec![
            "AWS Certified".to_string(),
            "ISO 27001".to_string(),
            "3+ similar projects".to_string(),
        ],
        reference: None,
        raw_metadata,
        provenance: Provenance::Sample,
        discovered_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_tagged_and_valid() {
        let record = sample_tender("ICTA", "https://icta.go.ke/tenders/");
        assert!(record.is_sample());
        assert_eq!(record.url, "https://icta.go.ke/tenders#tendazilla-sample");
        assert_eq!(record.raw_metadata.get("degraded"), Some(&json!(true)));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_sample_url_without_site_url() {
        let record = sample_tender("My Portal", "");
        assert_eq!(record.url, "sample://my-portal");
    }
}
