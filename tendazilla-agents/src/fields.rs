//! Budget, deadline and url parsing shared by every acquisition strategy

use chrono::NaiveDate;
use regex::{Captures, Regex};
use reqwest::Url;
use serde_json::Value;
use std::sync::LazyLock;

use tendazilla_core::slugify;

/// Amount with optional magnitude suffix: `250,000`, `80k`, `1.2M`, `3 million`
const AMOUNT: &str = r"(\d[\d,]*(?:\.\d+)?)\s*(?:(k|m|bn|b|thousand|million|billion)\b)?";
const CURRENCY: &str = r"(?:\b(?:usd|kes|tzs|ugx|eur|gbp|zar|ngn)|\$|€|£)";

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("(?i){AMOUNT}")).unwrap());

/// Two amounts joined by `-`, `–` or `to`
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){AMOUNT}\s*(?:-|–|\bto\b)\s*{CURRENCY}?\s*{AMOUNT}")).unwrap()
});

/// Currency-marked amount or range inside free text
static CURRENCY_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    let amount = r"\d[\d,]*(?:\.\d+)?(?:\s*(?:k|m|bn|million|billion)\b)?";
    Regex::new(&format!(
        r"(?i){CURRENCY}\s*{amount}(?:\s*(?:-|–|\bto\b)\s*{CURRENCY}?\s*{amount})?"
    ))
    .unwrap()
});

static YMD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})").unwrap());

static DMY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap());

fn parse_amount(digits: &str, suffix: Option<&str>) -> Option<f64> {
    let value: f64 = digits.replace(',', "").parse().ok()?;
    let factor = match suffix.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("k") | Some("thousand") => 1e3,
        Some("m") | Some("million") => 1e6,
        Some("b") | Some("bn") | Some("billion") => 1e9,
        _ => 1.0,
    };
    let amount = value * factor;
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

fn captured_amount(c: &Captures, digits: usize) -> Option<f64> {
    parse_amount(c.get(digits)?.as_str(), c.get(digits + 1).map(|m| m.as_str()))
}

/// A joined range if there is one, otherwise the largest single amount
fn amounts_in(text: &str) -> Option<(f64, f64)> {
    if let Some(c) = RANGE_RE.captures(text) {
        if let (Some(a), Some(b)) = (captured_amount(&c, 1), captured_amount(&c, 3)) {
            return Some((a.min(b), a.max(b)));
        }
    }
    AMOUNT_RE
        .captures_iter(text)
        .filter_map(|c| captured_amount(&c, 1))
        .max_by(f64::total_cmp)
        .map(|v| (v, v))
}

/// Parse a budget string into `(min, max)`.
///
/// A currency-marked amount wins over bare numbers, so lot and item numbers
/// never end up in the range. Two amounts only form a range when `-`, `–`
/// or `to` joins them.
pub fn parse_budget(text: &str) -> Option<(f64, f64)> {
    find_budget(text).or_else(|| amounts_in(text))
}

/// Find a currency-marked budget anywhere in free text
pub fn find_budget(text: &str) -> Option<(f64, f64)> {
    CURRENCY_AMOUNT_RE
        .find(text)
        .and_then(|m| amounts_in(m.as_str()))
}

/// Parse the first date in `text`.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `DD/MM/YYYY` and `DD-MM-YYYY`;
/// an ISO timestamp is read by its date part.
pub fn parse_deadline(text: &str) -> Option<NaiveDate> {
    if let Some(c) = YMD_RE.captures(text) {
        let date = NaiveDate::from_ymd_opt(
            c[1].parse().ok()?,
            c[2].parse().ok()?,
            c[3].parse().ok()?,
        );
        if date.is_some() {
            return date;
        }
    }
    let c = DMY_RE.captures(text)?;
    NaiveDate::from_ymd_opt(c[3].parse().ok()?, c[2].parse().ok()?, c[1].parse().ok()?)
}

/// Display text of a JSON field: strings, numbers, or an object's `name`/`value`
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => o.get("name").or_else(|| o.get("value")).and_then(value_text),
        _ => None,
    }
}

/// Resolve a link found on `base` into an absolute http(s) url
pub fn resolve_link(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    let resolved = Url::parse(base).ok()?.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Stable per-record url for listings that publish no link: `page#slug`
pub fn fragment_url(page_url: &str, key: &str) -> Option<String> {
    let slug = slugify(key);
    if slug.is_empty() {
        return None;
    }
    let page = page_url.split('#').next().unwrap_or(page_url);
    Some(format!("{}#{}", page, slug))
}
