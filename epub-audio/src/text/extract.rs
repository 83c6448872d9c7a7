//! Markup to plain text conversion.

use super::cleaner::normalize_characters;
use html2text::render::text_renderer::TrivialDecorator;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Wrap width handed to html2text; wide enough that it never wraps prose.
const EXTRACT_WIDTH: usize = 100_000;

static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").unwrap());

/// Named entities that show up in EPUB markup.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&mdash;", "—"),
    ("&ndash;", "–"),
    ("&hellip;", "…"),
    ("&rsquo;", "'"),
    ("&lsquo;", "'"),
    ("&rdquo;", "\""),
    ("&ldquo;", "\""),
    ("&laquo;", "«"),
    ("&raquo;", "»"),
    ("&eacute;", "é"),
    ("&egrave;", "è"),
    ("&agrave;", "à"),
    ("&ccedil;", "ç"),
    // Must stay last so "&amp;lt;" decodes to "&lt;" and not "<".
    ("&amp;", "&"),
];

/// Extract readable text from a section's markup.
///
/// Script and style blocks are removed before rendering; the result has
/// non-breaking and zero-width spaces normalized and whitespace collapsed.
/// Never fails: markup html2text cannot make sense of yields whatever text
/// it recovers, possibly an empty string.
pub fn extract_text(markup: &str) -> String {
    if markup.trim().is_empty() {
        return String::new();
    }

    let without_scripts = SCRIPT_BLOCK.replace_all(markup, "");
    let without_styles = STYLE_BLOCK.replace_all(&without_scripts, "");

    let rendered = html2text::from_read_with_decorator(
        without_styles.as_bytes(),
        EXTRACT_WIDTH,
        TrivialDecorator::new(),
    );

    normalize_characters(&rendered)
}

/// Plain text of a markup fragment (the inside of one element).
///
/// Lighter than [`extract_text`]: tags are dropped, entities decoded and
/// whitespace collapsed. Used for titles, where a full render is overkill.
pub fn fragment_text(fragment: &str) -> String {
    let with_breaks = LINE_BREAK.replace_all(fragment, " ");
    let without_tags = TAG.replace_all(&with_breaks, "");
    normalize_characters(&decode_entities(&without_tags))
}

/// Decode numeric and common named character references.
pub fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY.replace_all(text, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    NAMED_ENTITIES
        .iter()
        .fold(numeric.into_owned(), |acc, (entity, plain)| acc.replace(entity, plain))
}
