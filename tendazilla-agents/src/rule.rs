//! Rule-based scorer
//!
//! Deterministic 0-100 score from six weighted sub-scores. All text
//! comparisons are case-insensitive. Pure computation, no I/O.

use std::collections::BTreeSet;

use tendazilla_core::{
    contains_phrase, words, CompanyProfile, Criterion, CriterionScore, TenderRecord, NEUTRAL_SCORE,
};

use crate::{ScoringConfigError, ScoringWeights};

const LOCATION_EXACT: u8 = 100;
const LOCATION_SAME_COUNTRY: u8 = 80;
const LOCATION_SAME_REGION: u8 = 65;
const LOCATION_UNKNOWN: u8 = 50;
const LOCATION_FAR: u8 = 20;
const EXPERIENCE_BASE: u8 = 40;

/// Macro-regions and the countries and major cities inside them
const REGIONS: &[(&str, &[&str])] = &[
    (
        "East Africa",
        &[
            "kenya", "tanzania", "uganda", "rwanda", "burundi", "ethiopia", "south sudan",
            "somalia", "nairobi", "mombasa", "kisumu", "dar es salaam", "dodoma", "arusha",
            "zanzibar", "kampala", "kigali", "addis ababa",
        ],
    ),
    (
        "West Africa",
        &[
            "nigeria", "ghana", "senegal", "ivory coast", "cote d'ivoire", "sierra leone",
            "liberia", "benin", "togo", "lagos", "abuja", "accra", "dakar", "freetown",
        ],
    ),
    (
        "Southern Africa",
        &[
            "south africa", "zambia", "zimbabwe", "botswana", "namibia", "mozambique",
            "malawi", "johannesburg", "cape town", "pretoria", "lusaka", "harare", "gaborone",
        ],
    ),
    (
        "North Africa",
        &["egypt", "morocco", "tunisia", "algeria", "libya", "cairo", "casablanca", "tunis"],
    ),
    (
        "Western Europe",
        &[
            "germany", "france", "netherlands", "belgium", "luxembourg", "austria",
            "switzerland", "berlin", "munich", "hamburg", "frankfurt", "paris", "lyon",
            "amsterdam", "rotterdam", "brussels", "vienna", "zurich", "geneva",
        ],
    ),
    (
        "Northern Europe",
        &[
            "united kingdom", "uk", "ireland", "sweden", "norway", "denmark", "finland",
            "london", "manchester", "dublin", "stockholm", "oslo", "copenhagen", "helsinki",
        ],
    ),
    (
        "Southern Europe",
        &["italy", "spain", "portugal", "greece", "rome", "milan", "madrid", "barcelona", "lisbon", "athens"],
    ),
    (
        "North America",
        &["united states", "usa", "canada", "mexico", "new york", "washington", "toronto", "ottawa"],
    ),
    (
        "Middle East",
        &["united arab emirates", "uae", "saudi arabia", "qatar", "oman", "jordan", "dubai", "abu dhabi", "riyadh", "doha"],
    ),
    (
        "South Asia",
        &["india", "pakistan", "bangladesh", "sri lanka", "nepal", "delhi", "mumbai", "karachi", "dhaka"],
    ),
];

/// Output of [`RuleScorer::score`]
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    /// `round(sum of sub-score * weight)`
    pub score: u8,
    /// One entry per criterion, in [`Criterion::ALL`] order
    pub breakdown: Vec<CriterionScore>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleScorer {
    weights: ScoringWeights,
}

impl RuleScorer {
    pub fn new(weights: ScoringWeights) -> Result<Self, ScoringConfigError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn score(&self, tender: &TenderRecord, profile: &CompanyProfile) -> RuleScore {
        let breakdown: Vec<CriterionScore> = Criterion::ALL
            .iter()
            .map(|criterion| {
                let (score, reason) = match criterion {
                    Criterion::IndustryMatch => industry_match(tender, profile),
                    Criterion::LocationMatch => location_match(tender, profile),
                    Criterion::BudgetMatch => budget_match(tender, profile),
                    Criterion::TechnicalMatch => technical_match(tender, profile),
                    Criterion::ExperienceMatch => experience_match(tender, profile),
                    Criterion::CertificationMatch => certification_match(tender, profile),
                };
                let weight = self.weights.get(*criterion);
                CriterionScore {
                    criterion: *criterion,
                    score,
                    weight,
                    contribution: f64::from(score) * weight,
                    reason,
                }
            })
            .collect();

        let total: f64 = breakdown.iter().map(|c| c.contribution).sum();
        RuleScore {
            score: total.round().clamp(0.0, 100.0) as u8,
            breakdown,
        }
    }
}

fn percent(matched: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((matched as f64 / total as f64) * 100.0).round() as u8
}

fn lowercase_set<'a>(items: impl IntoIterator<Item = &'a String>) -> BTreeSet<String> {
    items.into_iter().map(|s| s.trim().to_lowercase()).collect()
}

/// Whether `phrase` occurs in `text`, as a substring or with all of its words present
fn mentions(text: &str, text_words: &BTreeSet<String>, phrase: &str) -> bool {
    let phrase = phrase.trim().to_lowercase();
    if phrase.is_empty() {
        return false;
    }
    if text.contains(&phrase) {
        return true;
    }
    let phrase_words = words(&phrase);
    !phrase_words.is_empty() && phrase_words.iter().all(|w| text_words.contains(w))
}

/// Whether the word sequence of `phrase` appears in `haystack` on word boundaries
fn industry_match(tender: &TenderRecord, profile: &CompanyProfile) -> (u8, String) {
    if tender.industry_tags.is_empty() {
        return (100, "Tender states no industry; no industry constraint".to_string());
    }
    let focus = lowercase_set(&profile.industry_focus);
    let matched: Vec<&String> = tender
        .industry_tags
        .iter()
        .filter(|tag| focus.contains(&tag.trim().to_lowercase()))
        .collect();

    let score = percent(matched.len(), tender.industry_tags.len());
    let reason = if matched.is_empty() {
        format!(
            "None of the tender industries ({}) are in the company focus",
            join(&tender.industry_tags)
        )
    } else {
        format!(
            "{}/{} tender industries in company focus ({})",
            matched.len(),
            tender.industry_tags.len(),
            join(matched)
        )
    };
    (score, reason)
}

fn location_components(location: &str) -> Vec<String> {
    location
        .split([',', ';', '/'])
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

/// One component names the other word for word: "nairobi county" and "nairobi"
fn same_place(a: &str, b: &str) -> bool {
    contains_phrase(&words(a), b) || contains_phrase(&words(b), a)
}

/// Every component of `narrow` names some component of `wide`
fn within(narrow: &[String], wide: &[String]) -> bool {
    narrow.iter().all(|n| wide.iter().any(|w| same_place(n, w)))
}

/// Macro-region containing `location`, by region name or a known country/city
fn region_of(location: &str) -> Option<&'static str> {
    let location_words = words(location);
    REGIONS.iter().find_map(|(region, members)| {
        let named = contains_phrase(&location_words, region);
        let member = members.iter().any(|m| contains_phrase(&location_words, m));
        (named || member).then_some(*region)
    })
}

fn location_match(tender: &TenderRecord, profile: &CompanyProfile) -> (u8, String) {
    let location = tender.location.trim().to_lowercase();
    if location.is_empty() {
        return (LOCATION_UNKNOWN, "Tender location not specified".to_string());
    }
    let preferred: Vec<&str> = profile.preferred_locations().collect();
    if preferred.is_empty() {
        return (
            LOCATION_UNKNOWN,
            "Company lists no preferred locations".to_string(),
        );
    }

    let tender_components = location_components(&location);
    for place in &preferred {
        let place_components = location_components(place);
        if !tender_components.is_empty()
            && !place_components.is_empty()
            && (within(&tender_components, &place_components)
                || within(&place_components, &tender_components))
        {
            return (
                LOCATION_EXACT,
                format!("{} matches preferred location {}", tender.location, place),
            );
        }
    }

    for place in &preferred {
        let shared = location_components(place)
            .into_iter()
            .find(|c| tender_components.iter().any(|t| same_place(t, c)));
        if let Some(shared) = shared {
            return (
                LOCATION_SAME_COUNTRY,
                format!("{} shares {} with preferred location {}", tender.location, shared, place),
            );
        }
    }

    if let Some(region) = region_of(&location) {
        if let Some(place) = preferred.iter().find(|p| region_of(p) == Some(region)) {
            return (
                LOCATION_SAME_REGION,
                format!("{} is in {}, like preferred location {}", tender.location, region, place),
            );
        }
    }

    (
        LOCATION_FAR,
        format!(
            "{} is outside the preferred locations ({})",
            tender.location,
            preferred.join(", ")
        ),
    )
}

fn budget_match(tender: &TenderRecord, profile: &CompanyProfile) -> (u8, String) {
    let Some((min, max)) = tender.budget_range() else {
        return (NEUTRAL_SCORE, "Tender budget not specified".to_string());
    };
    let pref = profile.preferred_project_size;
    let range = format!("{:.0}-{:.0}", min, max);
    let preferred = format!("{:.0}-{:.0}", pref.min_budget, pref.max_budget);

    if min <= pref.max_budget && max >= pref.min_budget {
        return (
            100,
            format!("Budget {} overlaps preferred range {}", range, preferred),
        );
    }

    let (gap, edge, side) = if max < pref.min_budget {
        (pref.min_budget - max, pref.min_budget, "below")
    } else {
        (min - pref.max_budget, pref.max_budget, "above")
    };
    let score = if edge > 0.0 {
        (100.0 * (1.0 - gap / edge)).clamp(0.0, 100.0).round() as u8
    } else {
        0
    };
    (
        score,
        format!("Budget {} is {} preferred range {}", range, side, preferred),
    )
}

fn technical_match(tender: &TenderRecord, profile: &CompanyProfile) -> (u8, String) {
    let (vocabulary, what) = if !profile.core_services.is_empty() {
        (&profile.core_services, "core services")
    } else if !profile.relevant_technologies.is_empty() {
        (&profile.relevant_technologies, "technologies")
    } else {
        return (
            NEUTRAL_SCORE,
            "Company lists no core services to compare".to_string(),
        );
    };

    let text = tender.searchable_text();
    let text_words: BTreeSet<String> = words(&text).into_iter().collect();
    let matched: Vec<&String> = vocabulary
        .iter()
        .filter(|s| mentions(&text, &text_words, s))
        .collect();
    let technologies: Vec<&String> = profile
        .relevant_technologies
        .iter()
        .filter(|t| mentions(&text, &text_words, t))
        .collect();

    let mut reason = if matched.is_empty() {
        format!("No {} mentioned in the tender", what)
    } else {
        format!(
            "{}/{} {} mentioned ({})",
            matched.len(),
            vocabulary.len(),
            what,
            join(matched.iter().copied())
        )
    };
    if what == "core services" && !technologies.is_empty() {
        reason.push_str(&format!("; technologies named: {}", join(technologies)));
    }
    (percent(matched.len(), vocabulary.len()), reason)
}

fn experience_match(tender: &TenderRecord, profile: &CompanyProfile) -> (u8, String) {
    let tender_tags = lowercase_set(&tender.industry_tags);
    let text = tender.searchable_text();
    let text_words = words(&text);

    for engagement in &profile.past_experience {
        let shared = engagement.industry_tags.iter().find(|tag| {
            let tag = tag.trim().to_lowercase();
            tender_tags.contains(&tag) || contains_phrase(&text_words, &tag)
        });
        if let Some(tag) = shared {
            return (
                100,
                format!("Past engagement \"{}\" shares industry {}", engagement.name, tag),
            );
        }
    }

    let reason = if profile.past_experience.is_empty() {
        "No past engagements listed".to_string()
    } else {
        format!(
            "None of {} past engagements share an industry with the tender",
            profile.past_experience.len()
        )
    };
    (EXPERIENCE_BASE, reason)
}

/// Whether a requirement line asks for a certification, accreditation or licence
fn is_certification_requirement(line: &str) -> bool {
    words(line).iter().any(|w| {
        w == "iso" || w.starts_with("certif") || w.starts_with("accredit") || w.starts_with("licen")
    })
}

/// Certification requirements stated by the tender
pub fn certification_requirements(tender: &TenderRecord) -> Vec<String> {
    let mut lines: Vec<String> = tender
        .requirements
        .iter()
        .filter(|r| is_certification_requirement(r))
        .cloned()
        .collect();

    for key in ["certifications", "required_certifications"] {
        match tender.raw_metadata.get(key) {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => lines.push(s.clone()),
            Some(serde_json::Value::Array(items)) => lines.extend(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }
    }
    lines
}

fn certification_match(tender: &TenderRecord, profile: &CompanyProfile) -> (u8, String) {
    let required = certification_requirements(tender);
    if required.is_empty() {
        return (100, "Tender states no certification requirement".to_string());
    }
    if profile.certifications.is_empty() {
        return (
            0,
            format!(
                "Tender requires certification ({}); company lists none",
                required.join("; ")
            ),
        );
    }

    let text = required.join(" ").to_lowercase();
    let text_words: BTreeSet<String> = words(&text).into_iter().collect();
    let held: Vec<&String> = profile
        .certifications
        .iter()
        .filter(|c| mentions(&text, &text_words, c))
        .collect();

    let score = percent(held.len(), profile.certifications.len());
    let reason = if held.is_empty() {
        format!(
            "Required certifications ({}) not among company certifications",
            required.join("; ")
        )
    } else {
        format!(
            "{}/{} company certifications requested by the tender ({})",
            held.len(),
            profile.certifications.len(),
            join(held)
        )
    };
    (score, reason)
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
