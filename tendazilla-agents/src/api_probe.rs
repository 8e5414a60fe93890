//! API endpoint strategy
//!
//! Probes the site's declared API url, then conventional endpoint suffixes
//! under the listing url and under the site origin, and maps the first
//! parseable JSON listing into records. Only the declared url gets the
//! client's retries; a guessed endpoint that fails is skipped at once.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use tendazilla_core::{Site, TenderRecord};
use tendazilla_net::{RetryPolicy, ThrottledClient};

use crate::fields::{parse_budget, parse_deadline, resolve_link, value_text};
use crate::{AcquisitionError, AcquisitionStrategy, RawListing, StrategyKind};

/// Conventional endpoint suffixes, probed in order
pub const API_SUFFIXES: &[&str] = &[
    "/api/tenders",
    "/api/v1/tenders",
    "/api/opportunities",
    "/api/v1/opportunities",
    "/api/notices",
    "/api/procurement",
];

const LIST_KEYS: &[&str] = &[
    "data", "results", "items", "tenders", "opportunities", "notices", "content",
];
const TITLE_KEYS: &[&str] = &[
    "title", "name", "subject", "heading", "tender_title", "opportunity_title",
];
const DESCRIPTION_KEYS: &[&str] = &[
    "description", "summary", "content", "details", "scope", "objective",
];
const DEADLINE_KEYS: &[&str] = &[
    "deadline", "closing_date", "due_date", "expiry_date", "submission_deadline", "end_date",
];
const BUDGET_KEYS: &[&str] = &[
    "budget", "value", "amount", "estimated_value", "contract_value", "project_value",
];
const LOCATION_KEYS: &[&str] = &["location", "country", "region", "area", "city", "state"];
const INDUSTRY_KEYS: &[&str] = &["industry", "sector", "category", "domain", "field"];
const REQUIREMENT_KEYS: &[&str] = &[
    "requirements", "criteria", "qualifications", "specifications", "conditions",
];
const URL_KEYS: &[&str] = &["url", "link", "tender_url", "href"];
const REFERENCE_KEYS: &[&str] = &["reference", "id"];

pub struct ApiProbeStrategy {
    client: ThrottledClient,
    guess_client: ThrottledClient,
}

impl ApiProbeStrategy {
    pub fn new(client: ThrottledClient) -> Self {
        Self {
            guess_client: client.with_retry_policy(RetryPolicy::none()),
            client,
        }
    }

    /// Endpoints to probe for `site`, in order, without duplicates
    pub fn candidates(site: &Site) -> Vec<String> {
        let mut urls: Vec<String> = site.api_url.iter().cloned().collect();

        let listing = site.url.trim().trim_end_matches('/').to_string();
        let origin = Url::parse(&site.url)
            .ok()
            .map(|u| u.origin().ascii_serialization())
            .filter(|o| o != "null");

        for base in std::iter::once(listing).chain(origin) {
            for suffix in API_SUFFIXES {
                let url = format!("{}{}", base, suffix);
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        urls
    }
}

#[async_trait]
impl AcquisitionStrategy for ApiProbeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn fetch(&self, site: &Site) -> Result<Vec<TenderRecord>, AcquisitionError> {
        let candidates = Self::candidates(site);
        let headers = [("Accept".to_string(), "application/json".to_string())];
        let mut answered = false;

        for endpoint in &candidates {
            let client = if site.api_url.as_ref() == Some(endpoint) {
                &self.client
            } else {
                &self.guess_client
            };
            let response = match client.get_with_headers(endpoint, &headers).await {
                Ok(response) => response,
                Err(e) => {
                    debug!("Probe {} failed: {}", endpoint, e);
                    continue;
                }
            };
            if !response.looks_like_json() {
                continue;
            }
            let body: Value = match serde_json::from_str(&response.body) {
                Ok(body) => body,
                Err(e) => {
                    debug!("Probe {} returned malformed JSON: {}", endpoint, e);
                    continue;
                }
            };
            answered = true;

            let records = map_listing(&body, site, endpoint);
            if !records.is_empty() {
                debug!("{} records from {}", records.len(), endpoint);
                return Ok(records);
            }
        }

        if answered {
            Ok(Vec::new())
        } else {
            Err(AcquisitionError::NoEndpointFound {
                tried: candidates.len(),
            })
        }
    }
}

/// The item list inside an API body: the body itself, or a wrapped list
fn items(body: &Value) -> &[Value] {
    match body {
        Value::Array(items) => items,
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Map every recognizable item of an API body into records
pub fn map_listing(body: &Value, site: &Site, endpoint: &str) -> Vec<TenderRecord> {
    items(body)
        .iter()
        .filter_map(|item| map_item(item, endpoint))
        .filter_map(|raw| raw.into_record(&site.name, &site.url, StrategyKind::Api.provenance()))
        .collect()
}

fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| item.get(*k).and_then(value_text))
}

fn budget_of(item: &Value) -> Option<(f64, f64)> {
    let min = item.get("budget_min").and_then(number_of);
    let max = item.get("budget_max").and_then(number_of);
    match (min, max) {
        (Some(min), Some(max)) => return Some((min.min(max), min.max(max))),
        (Some(v), None) | (None, Some(v)) => return Some((v, v)),
        (None, None) => {}
    }

    BUDGET_KEYS.iter().find_map(|k| match item.get(*k)? {
        Value::Object(range) => {
            let min = range.get("min").and_then(number_of);
            let max = range.get("max").and_then(number_of);
            match (min, max) {
                (Some(min), Some(max)) => Some((min.min(max), min.max(max))),
                _ => range
                    .get("amount")
                    .or_else(|| range.get("value"))
                    .and_then(number_of)
                    .map(|v| (v, v)),
            }
        }
        Value::String(s) => parse_budget(s),
        other => number_of(other).map(|v| (v, v)),
    })
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
        Value::String(s) => parse_budget(s).map(|(min, _)| min),
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.iter().filter_map(value_text).collect(),
        Value::String(s) => s
            .split([';', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether a JSON object met outside an API body reads as a tender: a title
/// plus a parseable deadline, a price or a tender-named key
pub(crate) fn looks_like_item(item: &Value) -> bool {
    let Some(map) = item.as_object() else {
        return false;
    };
    if first_text(item, TITLE_KEYS).is_none() {
        return false;
    }
    let dated = first_text(item, DEADLINE_KEYS)
        .and_then(|d| parse_deadline(&d))
        .is_some();
    // a bare "value" is too common in settings and form data
    let priced = BUDGET_KEYS
        .iter()
        .chain(&["budget_min", "budget_max"])
        .filter(|k| **k != "value")
        .any(|k| map.contains_key(*k));
    let marked = map.keys().any(|k| k.to_ascii_lowercase().contains("tender"));
    dated || priced || marked
}

pub(crate) fn map_item(item: &Value, endpoint: &str) -> Option<RawListing> {
    let map = item.as_object()?;
    let title = first_text(item, TITLE_KEYS)?;

    let category = INDUSTRY_KEYS
        .iter()
        .find_map(|k| item.get(*k))
        .map(string_list)
        .unwrap_or_default();
    let requirements = REQUIREMENT_KEYS
        .iter()
        .find_map(|k| item.get(*k))
        .map(string_list)
        .unwrap_or_default();

    Some(RawListing {
        title,
        description: first_text(item, DESCRIPTION_KEYS).unwrap_or_default(),
        location: first_text(item, LOCATION_KEYS).unwrap_or_default(),
        budget: budget_of(item),
        deadline: first_text(item, DEADLINE_KEYS).and_then(|d| parse_deadline(&d)),
        category,
        requirements,
        reference: first_text(item, REFERENCE_KEYS),
        link: first_text(item, URL_KEYS).and_then(|u| resolve_link(endpoint, &u)),
        metadata: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_client, retrying_client, shared_client, StaticFetcher};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;
    use tendazilla_core::Provenance;

    #[test]
    fn test_candidates_order() {
        let site = Site::new("Portal", "https://portal.example/procurement/")
            .with_api_url("https://api.portal.example/v2/tenders");
        let candidates = ApiProbeStrategy::candidates(&site);

        assert_eq!(candidates[0], "https://api.portal.example/v2/tenders");
        assert_eq!(candidates[1], "https://portal.example/procurement/api/tenders");
        assert_eq!(candidates[7], "https://portal.example/api/tenders");
        assert_eq!(candidates.len(), 1 + 2 * API_SUFFIXES.len());
    }

    #[test]
    fn test_candidates_without_path_are_deduplicated() {
        let site = Site::new("Portal", "https://portal.example");
        assert_eq!(ApiProbeStrategy::candidates(&site).len(), API_SUFFIXES.len());
    }

    #[test]
    fn test_field_aliases() {
        let body = serde_json::json!({
            "results": [{
                "id": 4411,
                "tender_title": "Managed SOC services",
                "summary": "24/7 security monitoring",
                "closing_date": "2025-07-31T17:00:00Z",
                "estimated_value": "USD 80k - 120k",
                "country": "Kenya",
                "sector": ["Information Technology", "Finance"],
                "qualifications": "ISO 27001; 5 years experience",
                "link": "/tenders/4411"
            }]
        });
        let site = Site::new("Portal", "https://portal.example/");

        let records = map_listing(&body, &site, "https://portal.example/api/tenders");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.title, "Managed SOC services");
        assert_eq!(record.url, "https://portal.example/tenders/4411");
        assert_eq!(record.reference.as_deref(), Some("4411"));
        assert_eq!(record.budget_range(), Some((80_000.0, 120_000.0)));
        assert_eq!(record.deadline, NaiveDate::from_ymd_opt(2025, 7, 31));
        assert_eq!(record.location, "Kenya");
        assert_eq!(record.industry_tags.len(), 2);
        assert_eq!(record.requirements, vec!["ISO 27001", "5 years experience"]);
        assert_eq!(record.raw_metadata.get("id"), Some(&serde_json::json!(4411)));
        assert_eq!(record.provenance, Provenance::Api);
    }

    #[test]
    fn test_explicit_budget_bounds() {
        let body = serde_json::json!([
            {"title": "Bridge rehabilitation", "budget_min": 200000, "budget_max": 150000}
        ]);
        let site = Site::new("Portal", "https://portal.example/");

        let records = map_listing(&body, &site, "https://portal.example/api/tenders");
        assert_eq!(records[0].budget_range(), Some((150_000.0, 200_000.0)));
        assert_eq!(records[0].url, "https://portal.example/#bridge-rehabilitation");
    }

    #[tokio::test]
    async fn test_first_answering_endpoint_wins() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .page("https://portal.example/api/tenders", 200, "<html>not json</html>")
                .json(
                    "https://portal.example/api/v1/tenders",
                    r#"{"data": [{"title": "Payroll system upgrade"}]}"#,
                ),
        );
        let strategy = ApiProbeStrategy::new(shared_client(fetcher.clone()));

        let records = strategy
            .fetch(&Site::new("Portal", "https://portal.example"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            fetcher.requested.lock().as_slice(),
            ["https://portal.example/api/tenders", "https://portal.example/api/v1/tenders"]
        );
    }

    #[tokio::test]
    async fn test_no_endpoint_found() {
        let strategy = ApiProbeStrategy::new(fixed_client(StaticFetcher::new()));

        let result = strategy.fetch(&Site::new("Portal", "https://portal.example")).await;
        assert!(matches!(
            result,
            Err(AcquisitionError::NoEndpointFound { tried }) if tried == API_SUFFIXES.len()
        ));
    }

    #[tokio::test]
    async fn test_empty_listing_is_not_an_error() {
        let fetcher = StaticFetcher::new().json("https://portal.example/api/tenders", r#"{"items": []}"#);
        let strategy = ApiProbeStrategy::new(fixed_client(fetcher));

        let records = strategy
            .fetch(&Site::new("Portal", "https://portal.example"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_only_declared_endpoint_is_retried() {
        let fetcher = Arc::new(StaticFetcher::new().otherwise(403));
        let strategy = ApiProbeStrategy::new(retrying_client(fetcher.clone(), 3));
        let site = Site::new("Portal", "https://portal.example/procurement")
            .with_api_url("https://portal.example/v2/notices");

        let result = strategy.fetch(&site).await;
        assert!(matches!(result, Err(AcquisitionError::NoEndpointFound { tried: 13 })));

        let requested = fetcher.requested.lock();
        let declared = requested
            .iter()
            .filter(|url| url.as_str() == "https://portal.example/v2/notices")
            .count();
        assert_eq!(declared, 4);
        assert_eq!(requested.len(), 4 + 2 * API_SUFFIXES.len());
    }

    #[test]
    fn test_tender_shaped_objects() {
        let tender = json!({"title": "Supply of hospital beds", "closing_date": "2025-09-30"});
        assert!(looks_like_item(&tender));
        assert!(looks_like_item(&json!({"name": "Fibre backbone", "estimated_value": 900000})));
        assert!(looks_like_item(&json!({"subject": "Office cleaning", "tender_no": "KRA/14"})));

        assert!(!looks_like_item(&json!({"title": "Home", "url": "/"})));
        assert!(!looks_like_item(&json!({"name": "Page size", "value": 20})));
        assert!(!looks_like_item(&json!({"closing_date": "2025-09-30"})));
        assert!(!looks_like_item(&json!(["Supply of hospital beds"])));
    }
}
