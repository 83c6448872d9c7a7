//! French/English keyword sets used to recognise narrative and non-narrative sections.

/// Title fragments signalling that narrative content has begun.
pub const CONTENT_START_KEYWORDS: &[&str] = &[
    "introduction",
    "préface",
    "preface",
    "avant-propos",
    "foreword",
    "prologue",
    "chapitre",
    "chapter",
    "partie",
    "part",
    "livre",
    "book",
];

/// Title fragments signalling front or back matter.
///
/// Overlapping entries ("table of contents" / "contents") are deliberate: a
/// title hitting both is a strong signal and is counted twice.
pub const SKIP_KEYWORDS: &[&str] = &[
    "table des matières",
    "table of contents",
    "sommaire",
    "contents",
    "index",
    "bibliographie",
    "bibliography",
    "glossaire",
    "glossary",
    "copyright",
    "couverture",
    "cover",
    "colophon",
    "mentions légales",
    "legal notice",
    "du même auteur",
    "also by",
    "achevé d'imprimer",
];

/// Whether the title contains any content-start keyword (case-insensitive).
pub fn is_content_start(title: &str) -> bool {
    let title = title.to_lowercase();
    CONTENT_START_KEYWORDS.iter().any(|k| title.contains(k))
}

/// Number of distinct skip keywords found in the title (case-insensitive).
pub fn skip_keyword_count(title: &str) -> usize {
    let title = title.to_lowercase();
    SKIP_KEYWORDS.iter().filter(|k| title.contains(*k)).count()
}
