//! Small text helpers shared by extraction and scoring

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters, appending `...` when cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Lowercase, alphanumeric-and-dash slug used to build fragment urls
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    slug.chars().take(64).collect()
}

/// Split text into lowercase alphanumeric words
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Whether `phrase`'s words appear consecutively in `haystack`
pub fn contains_phrase(haystack: &[String], phrase: &str) -> bool {
    let needle = words(phrase);
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  c "), "a b c");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Supply of ICT Equipment (Lot 2)"), "supply-of-ict-equipment-lot-2");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn test_words() {
        assert_eq!(words("Cloud-Migration, AWS!"), vec!["cloud", "migration", "aws"]);
    }

    #[test]
    fn test_contains_phrase() {
        let haystack = words("Road works in Dar es Salaam, Tanzania");
        assert!(contains_phrase(&haystack, "dar es salaam"));
        assert!(!contains_phrase(&words("Bucharest, Romania"), "Oman"));
        assert!(!contains_phrase(&haystack, ""));
    }
}
