//! Chapter number detection in titles ("Chapitre 3", "Part IV", ...).

use once_cell::sync::Lazy;
use regex::Regex;

/// Content-unit keyword followed by Arabic digits.
static ARABIC_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chapitre|chapter|partie|part|livre|book)\s*(\d+)").unwrap()
});

/// Content-unit keyword followed by a Roman numeral standing as its own word.
static ROMAN_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chapitre|chapter|partie|part|livre|book)\s+([ivxlcdm]+)\b").unwrap()
});

/// Extract the chapter/part number from a title.
///
/// Arabic digits are tried first; only when none follow a keyword is the
/// Roman-numeral pattern considered. The first match in the title wins.
pub fn chapter_number(title: &str) -> Option<u32> {
    if let Some(caps) = ARABIC_NUMBER.captures(title) {
        if let Ok(n) = caps[1].parse::<u32>() {
            return Some(n);
        }
    }

    ROMAN_NUMBER
        .captures(title)
        .and_then(|caps| roman_to_int(&caps[1]))
}

/// Decode a Roman numeral using subtractive pairs (IV = 4, XC = 90).
///
/// Returns `None` for empty input, unknown symbols, or a non-positive total.
pub fn roman_to_int(numeral: &str) -> Option<u32> {
    let values = numeral
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'I' => Some(1i64),
            'V' => Some(5),
            'X' => Some(10),
            'L' => Some(50),
            'C' => Some(100),
            'D' => Some(500),
            'M' => Some(1000),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    let total: i64 = values
        .iter()
        .enumerate()
        .map(|(i, &value)| match values.get(i + 1) {
            Some(&next) if next > value => -value,
            _ => value,
        })
        .sum();

    u32::try_from(total).ok().filter(|n| *n > 0)
}
