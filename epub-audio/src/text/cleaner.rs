//! Text cleaning and sanitization for TTS processing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that trip up speech engines and their replacements.
const PROBLEMATIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201c}', "\""),  // Left double quote
    ('\u{201d}', "\""),  // Right double quote
    ('\u{00ab}', "\""),  // Left guillemet
    ('\u{00bb}', "\""),  // Right guillemet
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "-"),   // Em dash
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),   // Non-breaking space
    ('\u{202f}', " "),   // Narrow no-break space (French punctuation)
    ('\u{200b}', ""),    // Zero-width space
    ('\u{200c}', ""),    // Zero-width non-joiner
    ('\u{200d}', ""),    // Zero-width joiner
    ('\u{feff}', ""),    // BOM
];

/// Sentence punctuation glued to the next sentence ("fin.Puis").
static MISSING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.!?])(\p{Lu})").unwrap());

/// French abbreviations the voices read letter by letter, and their spoken form.
static ABBREVIATIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"\bM\.(\s+\p{Lu})").unwrap(), "Monsieur$1"),
        (Regex::new(r"\bMme\b\.?").unwrap(), "Madame"),
        (Regex::new(r"\bDr\b\.?").unwrap(), "Docteur"),
        (Regex::new(r"\betc\.").unwrap(), "et cetera"),
        (Regex::new(r"\bex\.").unwrap(), "exemple"),
    ]
});

/// Replace typographic characters with plain equivalents.
///
/// Control characters are dropped; box-drawing characters (table borders
/// from the markup renderer) and every whitespace run become a single space.
pub fn normalize_characters(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        let replacement = PROBLEMATIC_CHARS
            .iter()
            .find(|(ch, _)| *ch == c)
            .map(|(_, r)| *r);

        if let Some(r) = replacement {
            result.push_str(r);
        } else if c.is_whitespace() || is_box_drawing(c) {
            result.push(' ');
        } else if !c.is_control() {
            result.push(c);
        }
    }

    collapse_whitespace(&result)
}

/// U+2500..=U+257F, used by html2text for table borders.
fn is_box_drawing(c: char) -> bool {
    ('\u{2500}'..='\u{257F}').contains(&c)
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean text for TTS processing.
///
/// This function:
/// - Replaces problematic Unicode characters (smart quotes, dashes, etc.)
/// - Collapses whitespace, newlines included, to single spaces
/// - Collapses runs of periods that cause TTS noise
/// - Restores the space after sentence punctuation when it is missing
/// - Optionally expands common French abbreviations
pub fn clean_for_tts(text: &str, expand_abbreviations: bool) -> String {
    let text = normalize_characters(text);
    let text = fix_multiple_periods(&text);
    let text = MISSING_SPACE.replace_all(&text, "$1 $2").into_owned();

    if expand_abbreviations {
        fix_pronunciation(&text)
    } else {
        text
    }
}

/// Expand abbreviations into their spoken form.
pub fn fix_pronunciation(text: &str) -> String {
    ABBREVIATIONS
        .iter()
        .fold(text.to_string(), |acc, (pattern, spoken)| {
            pattern.replace_all(&acc, *spoken).into_owned()
        })
}

/// Replace multiple consecutive periods with a single period.
fn fix_multiple_periods(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut period_count = 0;

    for c in text.chars() {
        if c == '.' {
            period_count += 1;
            if period_count == 1 {
                result.push('.');
            }
        } else {
            period_count = 0;
            result.push(c);
        }
    }

    result
}

/// Estimated narration time in minutes at the given pace.
pub fn estimate_reading_minutes(word_count: usize, words_per_minute: usize) -> f64 {
    if words_per_minute == 0 {
        return 0.0;
    }
    word_count as f64 / words_per_minute as f64
}
