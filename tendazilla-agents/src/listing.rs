//! Listing extraction
//!
//! Turns a tender listing page into records. Patterns are tried in order and
//! the first one that yields anything wins:
//! 1. tables with a header row
//! 2. elements whose class marks them as a tender/opportunity/rfp/bid
//! 3. JSON-LD blocks typed `Tender`, `RequestForProposal` or `Bid`
//! 4. elements whose `data-*` attributes mention a tender/opportunity/rfp
//! 5. tender-shaped JSON objects embedded in inline scripts
//!
//! Both the static and the rendered strategy feed their HTML through here.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use tracing::debug;

use tendazilla_core::{infer_industries, normalize_whitespace, Provenance, TenderRecord};

use crate::api_probe::{looks_like_item, map_item};
use crate::fields::{
    find_budget, fragment_url, parse_budget, parse_deadline, resolve_link, value_text,
};

/// Maximum records taken from one table or one element pattern
pub const MAX_LISTING_ROWS: usize = 20;

const LISTING_CLASS_MARKERS: &[&str] = &["tender", "opportunit", "rfp", "bid", "procurement"];
const JSON_LD_TYPES: &[&str] = &["Tender", "RequestForProposal", "Bid"];
const DATA_MARKERS: &[&str] = &["tender", "opportunit", "rfp"];

/// Inline scripts above this size are not searched for listing data
const MAX_SCRIPT_BYTES: usize = 512 * 1024;
const MAX_JSON_DEPTH: usize = 8;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th, td").unwrap());
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static CANDIDATE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div[class], li[class], article[class], tr[class]").unwrap()
});
static HEADING: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, .title, a, strong").unwrap()
});
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static CLASSED: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[class]").unwrap());
static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).unwrap()
});
static INLINE_SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script:not([src])").unwrap());

/// One listing entry before it becomes a [`TenderRecord`]
#[derive(Debug, Clone, Default)]
pub struct RawListing {
    pub title: String,
    pub description: String,
    pub location: String,
    pub budget: Option<(f64, f64)>,
    pub deadline: Option<NaiveDate>,
    pub category: Vec<String>,
    pub requirements: Vec<String>,
    pub reference: Option<String>,
    /// Absolute url of the tender detail page
    pub link: Option<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl RawListing {
    /// Build the record. Returns `None` when no title or url can be derived.
    pub fn into_record(
        self,
        source_site: &str,
        page_url: &str,
        provenance: Provenance,
    ) -> Option<TenderRecord> {
        let title = normalize_whitespace(&self.title);
        if title.is_empty() {
            return None;
        }
        let url = match self.link {
            Some(link) => link,
            None => fragment_url(page_url, self.reference.as_deref().unwrap_or(&title))?,
        };

        let tags = if self.category.is_empty() {
            infer_industries(&format!("{} {}", title, self.description))
                .into_iter()
                .collect()
        } else {
            self.category
        };
        let (budget_min, budget_max) = match self.budget {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };

        let built = TenderRecord::builder(source_site, &url, provenance)
            .title(title)
            .description(self.description)
            .location(normalize_whitespace(&self.location))
            .budget(budget_min, budget_max)
            .deadline(self.deadline)
            .industry_tags(tags)
            .requirements(self.requirements)
            .reference(self.reference)
            .raw_metadata(self.metadata)
            .build();
        match built {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Dropping listing {}: {}", url, e);
                None
            }
        }
    }
}

/// Extract every recognizable listing from `html`
pub fn extract_listings(
    html: &str,
    page_url: &str,
    source_site: &str,
    provenance: Provenance,
) -> Vec<TenderRecord> {
    let document = Html::parse_document(html);

    let patterns: [(&str, fn(&Html, &str) -> Vec<RawListing>); 5] = [
        ("table", extract_tables),
        ("element", extract_elements),
        ("json-ld", extract_json_ld),
        ("data-attribute", extract_data_attributes),
        ("script-data", extract_script_data),
    ];

    for (name, extract) in patterns {
        let mut seen = HashSet::new();
        let records: Vec<TenderRecord> = extract(&document, page_url)
            .into_iter()
            .filter_map(|raw| raw.into_record(source_site, page_url, provenance))
            .filter(|record| seen.insert(record.url.clone()))
            .collect();
        if !records.is_empty() {
            debug!("{} {} listings on {}", records.len(), name, page_url);
            return records;
        }
    }
    Vec::new()
}

fn cell_text(el: &ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn heading_text(el: &ElementRef) -> Option<String> {
    el.select(&HEADING)
        .filter(|h| h.id() != el.id())
        .map(|h| cell_text(&h))
        .find(|t| !t.is_empty())
}

fn paragraphs_text(el: &ElementRef) -> String {
    el.select(&PARAGRAPH)
        .map(|p| cell_text(&p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_link(el: &ElementRef, page_url: &str) -> Option<String> {
    el.select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| resolve_link(page_url, href))
}

fn split_list(text: &str) -> Vec<String> {
    text.split([';', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// What a table column holds, judged from its header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Reference,
    Title,
    Description,
    Deadline,
    Budget,
    Location,
    Category,
    Requirements,
    Other,
}

impl Column {
    fn from_header(header: &str) -> Self {
        let header = header.to_lowercase();
        let words = tendazilla_core::words(&header);
        let has = |keys: &[&str]| keys.iter().any(|k| header.contains(k));
        let has_word = |keys: &[&str]| keys.iter().any(|k| words.iter().any(|w| w.as_str() == *k));

        if has(&["reference", "number"]) || has_word(&["no", "ref", "id"]) {
            Column::Reference
        } else if has(&["deadline", "closing", "due", "close", "submission"]) {
            Column::Deadline
        } else if has(&["budget", "value", "amount", "cost", "price"]) {
            Column::Budget
        } else if has(&["location", "country", "region", "county", "city"]) {
            Column::Location
        } else if has(&["category", "sector", "industry", "type"]) {
            Column::Category
        } else if has(&["requirement", "eligibility", "qualification"]) {
            Column::Requirements
        } else if has(&["title", "subject", "name", "tender", "opportunity"]) {
            Column::Title
        } else if has(&["description", "details", "scope", "summary"]) {
            Column::Description
        } else {
            Column::Other
        }
    }
}

fn extract_tables(document: &Html, page_url: &str) -> Vec<RawListing> {
    let mut listings = Vec::new();
    for table in document.select(&TABLE) {
        let rows: Vec<ElementRef> = table.select(&ROW).collect();
        let th_row = rows.iter().position(|r| r.select(&TH).next().is_some());
        // Without <th>, the first row is the header
        let Some(header_idx) = th_row.or((!rows.is_empty()).then_some(0)) else {
            continue;
        };

        let headers: Vec<String> = rows[header_idx].select(&HEADER_CELL).map(|c| cell_text(&c)).collect();
        let mut columns: Vec<Column> = headers.iter().map(|h| Column::from_header(h)).collect();
        if !columns.contains(&Column::Title) {
            if let Some(desc) = columns.iter().position(|c| *c == Column::Description) {
                columns[desc] = Column::Title;
            }
        }
        let positional = !columns.contains(&Column::Title);

        for row in rows.iter().skip(header_idx + 1).take(MAX_LISTING_ROWS) {
            let cells: Vec<String> = row.select(&TD).map(|c| cell_text(&c)).collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            let mut listing = if positional {
                positional_row(&cells)
            } else {
                mapped_row(&columns, &cells)
            };
            listing.link = first_link(row, page_url);
            for (header, cell) in headers.iter().zip(&cells) {
                if !header.is_empty() && !cell.is_empty() {
                    listing.metadata.insert(header.clone(), Value::String(cell.clone()));
                }
            }
            listings.push(listing);
        }
    }
    listings
}

fn mapped_row(columns: &[Column], cells: &[String]) -> RawListing {
    let mut listing = RawListing::default();
    for (column, cell) in columns.iter().zip(cells) {
        if cell.is_empty() {
            continue;
        }
        match column {
            Column::Reference => listing.reference = Some(cell.clone()),
            Column::Title => listing.title = cell.clone(),
            Column::Description => listing.description = cell.clone(),
            Column::Deadline => listing.deadline = parse_deadline(cell),
            Column::Budget => listing.budget = parse_budget(cell),
            Column::Location => listing.location = cell.clone(),
            Column::Category => listing.category.push(cell.clone()),
            Column::Requirements => listing.requirements.extend(split_list(cell)),
            Column::Other => {}
        }
    }
    listing
}

/// Layout used by portals with unlabeled columns: reference, title, then dates.
/// The last date found wins as the deadline.
fn positional_row(cells: &[String]) -> RawListing {
    let mut listing = RawListing::default();
    if let Some(reference) = cells.first().filter(|c| c.chars().count() > 5) {
        listing.reference = Some(reference.clone());
    }
    if let Some(title) = cells.get(1).filter(|c| c.chars().count() > 10) {
        listing.title = title.clone();
    }
    for cell in cells.iter().skip(2) {
        if let Some(date) = parse_deadline(cell) {
            listing.deadline = Some(date);
        }
    }
    if listing.title.is_empty() {
        if let Some(reference) = &listing.reference {
            listing.title = reference.clone();
        }
    }
    listing
}

fn is_listing_element(el: &ElementRef) -> bool {
    el.value().attr("class").is_some_and(|class| {
        let class = class.to_lowercase();
        LISTING_CLASS_MARKERS.iter().any(|m| class.contains(m))
    })
}

/// Text of the first descendant whose class mentions one of `keys`
fn field_by_class(el: &ElementRef, keys: &[&str]) -> Option<String> {
    el.select(&CLASSED)
        .filter(|child| child.id() != el.id())
        .find(|child| {
            child.value().attr("class").is_some_and(|class| {
                let class = class.to_lowercase();
                keys.iter().any(|k| class.contains(k))
            })
        })
        .map(|child| cell_text(&child))
        .filter(|text| !text.is_empty())
}

fn extract_elements(document: &Html, page_url: &str) -> Vec<RawListing> {
    document
        .select(&CANDIDATE)
        .filter(is_listing_element)
        // Containers of other listing elements are lists, not listings
        .filter(|el| {
            !el.descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .any(|child| CANDIDATE.matches(&child) && is_listing_element(&child))
        })
        .take(MAX_LISTING_ROWS)
        .map(|el| element_listing(&el, page_url))
        .collect()
}

fn element_listing(el: &ElementRef, page_url: &str) -> RawListing {
    let text = cell_text(el);
    let title = heading_text(el).unwrap_or_else(|| text.chars().take(200).collect());

    let paragraphs = paragraphs_text(el);
    let description = if paragraphs.is_empty() {
        text.replacen(&title, "", 1).trim().to_string()
    } else {
        paragraphs
    };

    let deadline = field_by_class(el, &["deadline", "closing", "due"])
        .and_then(|t| parse_deadline(&t))
        .or_else(|| parse_deadline(&text));
    let budget = field_by_class(el, &["budget", "value", "amount"])
        .and_then(|t| parse_budget(&t))
        .or_else(|| find_budget(&text));

    RawListing {
        title,
        description,
        location: field_by_class(el, &["location", "country", "region"]).unwrap_or_default(),
        budget,
        deadline,
        category: field_by_class(el, &["category", "sector", "industry"])
            .into_iter()
            .collect(),
        requirements: field_by_class(el, &["requirement", "eligibility"])
            .map(|t| split_list(&t))
            .unwrap_or_default(),
        reference: field_by_class(el, &["reference", "ref-no", "tender-no"]),
        link: first_link(el, page_url),
        metadata: BTreeMap::new(),
    }
}

fn extract_json_ld(document: &Html, page_url: &str) -> Vec<RawListing> {
    let mut items = Vec::new();
    for script in document.select(&JSON_LD) {
        let body: String = script.text().collect();
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => collect_json_ld(value, &mut items),
            Err(e) => debug!("Skipping malformed JSON-LD on {}: {}", page_url, e),
        }
    }
    items
        .into_iter()
        .take(MAX_LISTING_ROWS)
        .map(|item| json_ld_listing(item, page_url))
        .collect()
}

fn collect_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(values) => values.into_iter().for_each(|v| collect_json_ld(v, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_json_ld(graph, out);
            }
            let typed = match map.get("@type") {
                Some(Value::String(t)) => JSON_LD_TYPES.contains(&t.as_str()),
                Some(Value::Array(ts)) => ts
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|t| JSON_LD_TYPES.contains(&t)),
                _ => false,
            };
            if typed {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

fn json_str(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| item.get(*k).and_then(value_text))
}

fn json_ld_listing(item: Value, page_url: &str) -> RawListing {
    let budget = match item.get("budget").or_else(|| item.get("amount")) {
        Some(Value::Number(n)) => n.as_f64().map(|v| (v, v)),
        Some(other) => value_text(other).and_then(|s| parse_budget(&s)),
        None => None,
    };
    let location = json_str(&item, &["location", "areaServed"])
        .or_else(|| {
            item.pointer("/location/address/addressCountry")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let metadata = match &item {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => BTreeMap::new(),
    };

    RawListing {
        title: json_str(&item, &["name", "title"]).unwrap_or_default(),
        description: json_str(&item, &["description", "summary"]).unwrap_or_default(),
        location,
        budget,
        deadline: json_str(&item, &["closingDate", "dueDate", "deadline", "endDate"])
            .and_then(|d| parse_deadline(&d)),
        category: json_str(&item, &["category", "industry"]).into_iter().collect(),
        requirements: Vec::new(),
        reference: json_str(&item, &["identifier"]),
        link: json_str(&item, &["url"]).and_then(|u| resolve_link(page_url, &u)),
        metadata,
    }
}

/// `data-*` attributes of `el`, names without the prefix
fn data_attrs<'a>(el: ElementRef<'a>) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    el.value()
        .attrs()
        .filter_map(|(name, value)| name.strip_prefix("data-").map(|n| (n, value)))
}

fn is_data_listing(el: ElementRef) -> bool {
    if matches!(el.value().name(), "html" | "body" | "main") {
        return false;
    }
    data_attrs(el).any(|(name, value)| {
        let value = value.to_lowercase();
        DATA_MARKERS.iter().any(|m| name.contains(m) || value.contains(m))
    })
}

fn extract_data_attributes(document: &Html, page_url: &str) -> Vec<RawListing> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| is_data_listing(*el))
        .filter(|el| {
            !el.descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .any(is_data_listing)
        })
        .take(MAX_LISTING_ROWS)
        .map(|el| data_listing(el, page_url))
        .collect()
}

fn data_listing(el: ElementRef, page_url: &str) -> RawListing {
    let data: BTreeMap<String, String> = data_attrs(el)
        .map(|(name, value)| (name.to_string(), normalize_whitespace(value)))
        .filter(|(_, value)| !value.is_empty())
        .collect();
    let field = |keys: &[&str]| keys.iter().find_map(|k| data.get(*k)).cloned();
    let text = cell_text(&el);

    let title = field(&["title", "name", "tender-title", "subject"])
        .or_else(|| heading_text(&el))
        .unwrap_or_default();
    let description = field(&["description", "summary"]).unwrap_or_else(|| paragraphs_text(&el));
    let deadline = field(&["deadline", "closing-date", "closing", "due-date"])
        .and_then(|d| parse_deadline(&d))
        .or_else(|| parse_deadline(&text));
    let budget = field(&["budget", "value", "amount"])
        .and_then(|b| parse_budget(&b))
        .or_else(|| find_budget(&text));
    let link = field(&["url", "href", "link"])
        .and_then(|u| resolve_link(page_url, &u))
        .or_else(|| first_link(&el, page_url));

    RawListing {
        title,
        description,
        location: field(&["location", "country", "region"]).unwrap_or_default(),
        budget,
        deadline,
        category: field(&["category", "sector", "industry"]).into_iter().collect(),
        requirements: Vec::new(),
        reference: field(&["reference", "ref", "tender-id", "tender-no", "id"]),
        link,
        metadata: data.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
    }
}

fn extract_script_data(document: &Html, page_url: &str) -> Vec<RawListing> {
    let mut items = Vec::new();
    for script in document.select(&INLINE_SCRIPT) {
        let kind = script.value().attr("type").unwrap_or_default();
        if kind.eq_ignore_ascii_case("application/ld+json") {
            continue;
        }
        let body: String = script.text().collect();
        if body.len() > MAX_SCRIPT_BYTES {
            debug!("Skipping {} byte inline script on {}", body.len(), page_url);
            continue;
        }
        for value in embedded_json(&body) {
            collect_items(&value, 0, &mut items);
        }
        if items.len() >= MAX_LISTING_ROWS {
            break;
        }
    }
    items
        .iter()
        .take(MAX_LISTING_ROWS)
        .filter_map(|item| map_item(item, page_url))
        .collect()
}

/// JSON in a script body: the whole body, or objects and arrays that follow
/// `=`, `(` or `:`
fn embedded_json(body: &str) -> Vec<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(body.trim()) {
        return vec![value];
    }
    let mut values = Vec::new();
    let mut offset = 0;
    while let Some(found) = body[offset..].find(['{', '[']) {
        let start = offset + found;
        offset = start + 1;
        if !body[..start].trim_end().ends_with(['=', '(', ':']) {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            offset = start + stream.byte_offset();
            values.push(value);
        }
    }
    values
}

fn collect_items(value: &Value, depth: usize, out: &mut Vec<Value>) {
    if depth > MAX_JSON_DEPTH || out.len() >= MAX_LISTING_ROWS {
        return;
    }
    match value {
        Value::Object(_) if looks_like_item(value) => out.push(value.clone()),
        Value::Object(map) => map.values().for_each(|v| collect_items(v, depth + 1, out)),
        Value::Array(values) => values.iter().for_each(|v| collect_items(v, depth + 1, out)),
        _ => {}
    }
}
