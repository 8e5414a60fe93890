//! Industry keyword registry
//!
//! Infers industry tags from free text when a portal does not publish a
//! category. Keywords are matched on word boundaries, case-insensitively.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// An industry and the keywords that indicate it
#[derive(Debug, Clone)]
pub struct Industry {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

pub static INDUSTRIES: &[Industry] = &[
    Industry {
        name: "Information Technology",
        keywords: &[
            "it", "ict", "technology", "software", "hardware", "digital", "cloud",
            "cybersecurity", "data centre", "data center",
        ],
    },
    Industry {
        name: "Telecommunications",
        keywords: &["telecom", "telecommunications", "communication", "network", "broadband", "fiber", "fibre"],
    },
    Industry {
        name: "Infrastructure",
        keywords: &["infrastructure", "construction", "engineering", "building", "roads"],
    },
    Industry {
        name: "Healthcare",
        keywords: &["health", "medical", "hospital", "clinic", "pharmaceutical"],
    },
    Industry {
        name: "Education",
        keywords: &["education", "school", "university", "training"],
    },
    Industry {
        name: "Finance",
        keywords: &["finance", "banking", "financial", "accounting", "audit"],
    },
];

static INDUSTRY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    INDUSTRIES
        .iter()
        .map(|industry| {
            let alternation = industry
                .keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\b(?:{})\b", alternation);
            (industry.name, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// All industries whose keywords appear in `text`, in registry order
pub fn infer_industries(text: &str) -> BTreeSet<String> {
    INDUSTRY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
        .collect()
}
