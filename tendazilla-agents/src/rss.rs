//! RSS strategy: items of the site's declared RSS or Atom feed
//!
//! Feeds rarely carry structured tender fields, so the deadline and location
//! fall back to what the entry text says when no dedicated element exists.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::Html;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use tendazilla_core::{contains_phrase, normalize_whitespace, words, Site, TenderRecord};
use tendazilla_net::ThrottledClient;

use crate::fields::{find_budget, parse_deadline, resolve_link};
use crate::{AcquisitionError, AcquisitionStrategy, RawListing, StrategyKind};

/// Entries read from one feed
pub const MAX_FEED_ENTRIES: usize = 50;
const MAX_FEED_TITLE_CHARS: usize = 200;

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.5";

const DEADLINE_FIELDS: &[&str] = &[
    "deadline", "closing_date", "closingdate", "due_date", "expiry_date",
];
const LOCATION_FIELDS: &[&str] = &["location", "country", "region", "area"];

/// Places recognized in entry text, most specific first
const KNOWN_PLACES: &[&str] = &[
    "Nairobi", "Mombasa", "Kisumu", "Nakuru", "Dar es Salaam", "Dodoma", "Arusha", "Mwanza",
    "Kenya", "Tanzania", "Sub-Saharan Africa", "East Africa", "Africa",
];

/// One `<item>` (RSS) or `<entry>` (Atom)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    /// Description, summary or content; may hold markup
    pub summary: String,
    pub published: Option<String>,
    pub guid: Option<String>,
    pub categories: Vec<String>,
    /// Remaining child elements by lowercase local name, e.g. `closing_date`
    pub fields: BTreeMap<String, String>,
}

impl FeedEntry {
    fn set(&mut self, element: &str, text: String) {
        if text.is_empty() {
            return;
        }
        match element {
            "title" => self.title = text,
            "link" => {
                self.link.get_or_insert(text);
            }
            "description" | "summary" | "content" | "encoded" => {
                if self.summary.is_empty() {
                    self.summary = text;
                }
            }
            "pubdate" | "published" | "updated" | "date" => {
                self.published.get_or_insert(text);
            }
            "guid" | "id" => {
                self.guid.get_or_insert(text);
            }
            "category" | "subject" => self.categories.push(text),
            other => {
                self.fields.entry(other.to_string()).or_insert(text);
            }
        }
    }

    /// Atom puts the link in `href` and the category in `term`
    fn set_from_attributes(&mut self, element: &str, start: &BytesStart) {
        let attr = |name: &str| {
            start
                .try_get_attribute(name)
                .ok()
                .flatten()
                .and_then(|a| a.unescape_value().ok().map(|v| v.trim().to_string()))
                .filter(|v| !v.is_empty())
        };
        match element {
            "link" if attr("rel").map_or(true, |rel| rel == "alternate") => {
                if let Some(href) = attr("href") {
                    self.link.get_or_insert(href);
                }
            }
            "category" => self.categories.extend(attr("term")),
            _ => {}
        }
    }
}

fn local_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).to_ascii_lowercase()
}

/// Read the entries of an RSS 2.0 or Atom document.
///
/// Malformed XML is an error unless some entries were already read, in which
/// case those are kept.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, AcquisitionError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut entry: Option<FeedEntry> = None;
    let mut element: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name == "item" || name == "entry" {
                    entry = Some(FeedEntry::default());
                    element = None;
                } else if let Some(entry) = entry.as_mut() {
                    entry.set_from_attributes(&name, &e);
                    element = Some(name);
                    text.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = entry.as_mut() {
                    entry.set_from_attributes(&local_name(&e), &e);
                }
            }
            Ok(Event::Text(e)) if element.is_some() => match e.unescape() {
                Ok(unescaped) => text.push_str(&unescaped),
                Err(_) => text.push_str(&String::from_utf8_lossy(&e)),
            },
            Ok(Event::CData(e)) if element.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                if name == "item" || name == "entry" {
                    entries.extend(entry.take());
                    element = None;
                } else if element.as_deref() == Some(name.as_str()) {
                    if let Some(entry) = entry.as_mut() {
                        entry.set(&name, text.trim().to_string());
                    }
                    element = None;
                    text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) if entries.is_empty() => return Err(AcquisitionError::Feed(e.to_string())),
            Err(e) => {
                debug!("Feed cut short after {} entries: {}", entries.len(), e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(entries)
}

/// Text content of a fragment that may hold markup
fn plain_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return normalize_whitespace(fragment);
    }
    let html = Html::parse_fragment(fragment);
    normalize_whitespace(&html.root_element().text().collect::<Vec<_>>().join(" "))
}

fn known_place(text: &str) -> Option<String> {
    let text_words = words(text);
    KNOWN_PLACES
        .iter()
        .find(|place| contains_phrase(&text_words, place))
        .map(|place| place.to_string())
}

fn is_web_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn entry_listing(entry: FeedEntry, feed_url: &str) -> RawListing {
    let summary = plain_text(&entry.summary);
    let field = |keys: &[&str]| keys.iter().find_map(|k| entry.fields.get(*k)).cloned();

    let deadline = field(DEADLINE_FIELDS)
        .and_then(|d| parse_deadline(&d))
        .or_else(|| parse_deadline(&summary));
    let location = field(LOCATION_FIELDS)
        .or_else(|| known_place(&summary))
        .unwrap_or_default();
    let link = entry
        .link
        .as_deref()
        .or(entry.guid.as_deref().filter(|g| is_web_url(g)))
        .and_then(|l| resolve_link(feed_url, l));
    let reference = entry.guid.clone().filter(|g| !is_web_url(g));

    let mut metadata: BTreeMap<String, Value> = entry
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    if let Some(published) = &entry.published {
        metadata.insert("published".to_string(), Value::String(published.clone()));
    }

    RawListing {
        title: plain_text(&entry.title).chars().take(MAX_FEED_TITLE_CHARS).collect(),
        budget: find_budget(&summary),
        description: summary,
        location,
        deadline,
        category: entry.categories,
        requirements: Vec::new(),
        reference,
        link,
        metadata,
    }
}

pub struct RssStrategy {
    client: ThrottledClient,
}

impl RssStrategy {
    pub fn new(client: ThrottledClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AcquisitionStrategy for RssStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rss
    }

    fn applies_to(&self, site: &Site) -> bool {
        site.rss_url.is_some()
    }

    async fn fetch(&self, site: &Site) -> Result<Vec<TenderRecord>, AcquisitionError> {
        let Some(feed_url) = site.rss_url.as_deref() else {
            return Ok(Vec::new());
        };
        let headers = [("Accept".to_string(), FEED_ACCEPT.to_string())];
        let response = self.client.get_with_headers(feed_url, &headers).await?;

        let entries = parse_feed(&response.body)?;
        debug!("{} entries in {}", entries.len(), feed_url);

        let mut seen = HashSet::new();
        Ok(entries
            .into_iter()
            .take(MAX_FEED_ENTRIES)
            .map(|entry| entry_listing(entry, feed_url))
            .filter_map(|raw| raw.into_record(&site.name, &site.url, self.kind().provenance()))
            .filter(|record| seen.insert(record.url.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixed_client, shared_client, StaticFetcher};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tendazilla_core::Provenance;

    const FEED_URL: &str = "https://portal.example/feeds/tenders.xml";

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <rss version="2.0" xmlns:tender="https://portal.example/ns">
          <channel>
            <title>Portal tenders</title>
            <link>https://portal.example</link>
            <item>
              <title>Supply of solar water pumps</title>
              <link>https://portal.example/t/101</link>
              <description><![CDATA[<p>Installation of pumps in Kisumu county. Budget KES 4,500,000.</p>]]></description>
              <pubDate>Mon, 03 Feb 2025 09:00:00 +0000</pubDate>
              <tender:closing_date>2025-03-20</tender:closing_date>
              <category>Energy</category>
            </item>
            <item>
              <title>Consultancy for ICT policy review</title>
              <link>/t/102</link>
              <description>Closing 14/04/2025. Open to firms registered in Tanzania.</description>
              <guid isPermaLink="false">PPRA-2025-102</guid>
            </item>
          </channel>
        </rss>"#;

    fn feed_site() -> Site {
        Site::new("Portal", "https://portal.example/tenders").with_rss_url(FEED_URL)
    }

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "Supply of solar water pumps");
        assert_eq!(first.link.as_deref(), Some("https://portal.example/t/101"));
        assert_eq!(first.fields.get("closing_date").map(String::as_str), Some("2025-03-20"));
        assert_eq!(first.published.as_deref(), Some("Mon, 03 Feb 2025 09:00:00 +0000"));
        assert_eq!(first.categories, vec!["Energy"]);
        assert!(first.summary.starts_with("<p>Installation"));

        assert_eq!(entries[1].guid.as_deref(), Some("PPRA-2025-102"));
    }

    #[test]
    fn test_parse_atom_entries() {
        let atom = r#"<feed xmlns="http://www.w3.org/2005/Atom">
              <title>Notices</title>
              <link href="https://portal.example/"/>
              <entry>
                <title type="html">Road maintenance &amp; repairs</title>
                <link rel="enclosure" href="https://portal.example/notices/9.pdf"/>
                <link rel="alternate" href="https://portal.example/notices/9"/>
                <id>urn:uuid:1225c695</id>
                <summary>Deadline 2025-06-30</summary>
                <category term="Infrastructure"/>
              </entry>
            </feed>"#;

        let entries = parse_feed(atom).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.title, "Road maintenance & repairs");
        assert_eq!(entry.link.as_deref(), Some("https://portal.example/notices/9"));
        assert_eq!(entry.guid.as_deref(), Some("urn:uuid:1225c695"));
        assert_eq!(entry.categories, vec!["Infrastructure"]);
    }

    #[test]
    fn test_malformed_feed() {
        let result = parse_feed("<rss><channel><item><title>Broken</item></channel></rss>");
        assert!(matches!(result, Err(AcquisitionError::Feed(_))));
    }

    #[tokio::test]
    async fn test_fetch_feed_records() {
        let fetcher = StaticFetcher::new().page(FEED_URL, 200, RSS);
        let strategy = RssStrategy::new(fixed_client(fetcher));

        let records = strategy.fetch(&feed_site()).await.unwrap();
        assert_eq!(records.len(), 2);

        let pumps = &records[0];
        assert_eq!(pumps.provenance, Provenance::Rss);
        assert_eq!(pumps.source_site, "Portal");
        assert_eq!(pumps.deadline, NaiveDate::from_ymd_opt(2025, 3, 20));
        assert_eq!(pumps.location, "Kisumu");
        assert_eq!(pumps.budget_range(), Some((4_500_000.0, 4_500_000.0)));
        assert_eq!(
            pumps.description,
            "Installation of pumps in Kisumu county. Budget KES 4,500,000."
        );
        assert!(pumps.industry_tags.contains("Energy"));

        let policy = &records[1];
        assert_eq!(policy.url, "https://portal.example/t/102");
        assert_eq!(policy.deadline, NaiveDate::from_ymd_opt(2025, 4, 14));
        assert_eq!(policy.location, "Tanzania");
        assert_eq!(policy.reference.as_deref(), Some("PPRA-2025-102"));
    }

    #[tokio::test]
    async fn test_only_sites_with_a_feed() {
        let fetcher = Arc::new(StaticFetcher::new());
        let strategy = RssStrategy::new(shared_client(fetcher.clone()));
        let site = Site::new("Portal", "https://portal.example/tenders");

        assert!(!strategy.applies_to(&site));
        assert!(strategy.applies_to(&feed_site()));
        assert!(strategy.fetch(&site).await.unwrap().is_empty());
        assert!(fetcher.requested.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_feed_is_net_error() {
        let strategy = RssStrategy::new(fixed_client(StaticFetcher::new()));
        let result = strategy.fetch(&feed_site()).await;
        assert!(matches!(result, Err(AcquisitionError::Net(_))));
    }
}
