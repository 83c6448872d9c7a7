//! Section title extraction from markup.

use crate::text::fragment_text;
use once_cell::sync::Lazy;
use regex::Regex;

/// Paragraph fallbacks at or above this many characters read as prose.
const MAX_FRAGMENT_TITLE_CHARS: usize = 100;

/// Heading elements, most prominent first, then the document title.
static HEADING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["h1", "h2", "h3", "title"]
        .iter()
        .map(|tag| element_pattern(tag))
        .collect()
});

static PARAGRAPH_PATTERN: Lazy<Regex> = Lazy::new(|| element_pattern("p"));

fn element_pattern(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>")).unwrap()
}

/// Derive a human-readable title for a section.
///
/// Rules, first hit wins:
/// 1. the first non-empty `h1`, then `h2`, `h3`, then `<title>`;
/// 2. the first non-empty paragraph, if it is under 100 characters and does
///    not end with a period (a short fragment at the top is a title, not prose);
/// 3. `"Section {fallback_index + 1}"`.
///
/// Total: always returns a non-empty string.
pub fn extract_title(markup: &str, fallback_index: usize) -> String {
    heading_title(markup)
        .or_else(|| paragraph_title(markup))
        .unwrap_or_else(|| format!("Section {}", fallback_index + 1))
}

fn heading_title(markup: &str) -> Option<String> {
    HEADING_PATTERNS
        .iter()
        .find_map(|pattern| first_non_empty(pattern, markup))
}

fn paragraph_title(markup: &str) -> Option<String> {
    first_non_empty(&PARAGRAPH_PATTERN, markup).filter(|text| {
        text.chars().count() < MAX_FRAGMENT_TITLE_CHARS && !text.ends_with('.')
    })
}

/// Normalized text of the first matching element that has any.
fn first_non_empty(pattern: &Regex, markup: &str) -> Option<String> {
    pattern
        .captures_iter(markup)
        .map(|caps| fragment_text(&caps[1]))
        .find(|text| !text.is_empty())
}
