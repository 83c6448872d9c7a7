//! Chapter classification.
//!
//! Walks a document's sections once, in reading order, deciding which are
//! narrative content and assigning each accepted one a chapter id and a
//! display title. Front matter is recognised by a one-way latch: with
//! `skip_metadata`, nothing is accepted until a section title contains a
//! content-start keyword ("Chapitre", "Prologue", "Introduction", ...).

pub mod keywords;
pub mod numbering;
pub mod title;

use crate::text::extract_text;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;

pub use keywords::{is_content_start, skip_keyword_count};
pub use numbering::chapter_number;
pub use title::extract_title;

/// Sections with a single skip keyword need at least this many words to stay.
pub const WEAK_SKIP_MIN_WORDS: usize = 50;

/// Default minimum word count for an untitled section.
pub const DEFAULT_MIN_WORDS: usize = 100;

/// One document-internal unit, usually one XHTML file of the spine.
///
/// Text and title are derived on first use and memoised.
#[derive(Debug)]
pub struct Section {
    /// Position in reading order.
    pub index: usize,
    /// Raw XHTML markup.
    pub raw_markup: String,
    text: OnceCell<String>,
    title: OnceCell<String>,
}

impl Section {
    pub fn new(index: usize, raw_markup: impl Into<String>) -> Self {
        Self {
            index,
            raw_markup: raw_markup.into(),
            text: OnceCell::new(),
            title: OnceCell::new(),
        }
    }

    /// Plain text of the section.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| extract_text(&self.raw_markup))
    }

    /// Human-readable title, never empty.
    pub fn title(&self) -> &str {
        self.title
            .get_or_init(|| extract_title(&self.raw_markup, self.index))
    }

    /// Whitespace-delimited token count of the text.
    pub fn word_count(&self) -> usize {
        self.text().split_whitespace().count()
    }
}

/// An accepted, numbered section destined for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Unique within one classification run ("ch003").
    pub chapter_id: String,
    pub display_title: String,
    pub source_markup: String,
    /// Extracted plain text.
    pub text: String,
    pub word_count: usize,
    /// Position among accepted chapters, from 0 without gaps.
    pub ordinal: usize,
    /// Index of the section this chapter came from.
    pub section_index: usize,
}

/// Options for one classification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Sections without a content-start title need this many words.
    pub min_words: usize,
    /// Drop everything before the first content-start title.
    pub skip_metadata: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            min_words: DEFAULT_MIN_WORDS,
            skip_metadata: true,
        }
    }
}

/// Why a section was not turned into a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Seen before any content-start title.
    BeforeContent,
    /// Two or more skip keywords in the title.
    MatterKeywords(usize),
    /// One skip keyword and fewer than [`WEAK_SKIP_MIN_WORDS`] words.
    ShortMatter,
    /// Fewer words than the configured minimum.
    TooShort,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BeforeContent => write!(f, "front matter"),
            SkipReason::MatterKeywords(n) => write!(f, "{} matter keywords", n),
            SkipReason::ShortMatter => write!(f, "short matter section"),
            SkipReason::TooShort => write!(f, "too short"),
        }
    }
}

/// Outcome for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(Chapter),
    Skipped {
        section_index: usize,
        title: String,
        word_count: usize,
        reason: SkipReason,
    },
}

impl Verdict {
    pub fn chapter(&self) -> Option<&Chapter> {
        match self {
            Verdict::Accepted(chapter) => Some(chapter),
            Verdict::Skipped { .. } => None,
        }
    }
}

/// State carried across one pass. Never shared between runs.
#[derive(Debug, Default)]
struct ClassificationState {
    content_started: bool,
    unnumbered_counter: usize,
    next_ordinal: usize,
    /// How many times each base id has been handed out.
    issued_ids: HashMap<String, usize>,
}

impl ClassificationState {
    /// Reserve `base`, suffixing it ("ch003-2") if it was already issued.
    fn claim_id(&mut self, base: String) -> String {
        let seen = self.issued_ids.entry(base.clone()).or_insert(0);
        *seen += 1;

        if *seen == 1 {
            base
        } else {
            let id = format!("{}-{}", base, seen);
            log::warn!("Chapter id {} already assigned, using {}", base, id);
            id
        }
    }
}

/// Classify sections into chapters, in reading order.
pub fn classify(sections: &[Section], options: ClassifyOptions) -> Vec<Chapter> {
    classify_sections(sections, options)
        .into_iter()
        .filter_map(|verdict| match verdict {
            Verdict::Accepted(chapter) => Some(chapter),
            Verdict::Skipped { .. } => None,
        })
        .collect()
}

/// Classify sections, keeping a verdict for every one of them.
pub fn classify_sections(sections: &[Section], options: ClassifyOptions) -> Vec<Verdict> {
    let (_, verdicts) = sections.iter().fold(
        (
            ClassificationState::default(),
            Vec::with_capacity(sections.len()),
        ),
        |(state, mut verdicts), section| {
            let (state, verdict) = step(state, section, options);
            verdicts.push(verdict);
            (state, verdicts)
        },
    );
    verdicts
}

fn step(
    mut state: ClassificationState,
    section: &Section,
    options: ClassifyOptions,
) -> (ClassificationState, Verdict) {
    let title = section.title();
    let content_start = is_content_start(title);

    if !state.content_started && content_start {
        log::debug!("Content starts at section {} ({})", section.index, title);
        state.content_started = true;
    }

    if options.skip_metadata && !state.content_started {
        return (state, skipped(section, SkipReason::BeforeContent));
    }

    let word_count = section.word_count();
    if let Some(reason) = rejection(title, word_count, content_start, options.min_words) {
        return (state, skipped(section, reason));
    }

    let (base_id, display_title) = match chapter_number(title) {
        Some(n) => (format!("ch{:03}", n), title.to_string()),
        None => {
            state.unnumbered_counter += 1;
            let n = state.unnumbered_counter;
            (format!("ch{:03}", n), format!("Chapter {}: {}", n, title))
        }
    };
    let chapter_id = state.claim_id(base_id);

    let ordinal = state.next_ordinal;
    state.next_ordinal += 1;

    log::debug!(
        "Accepted section {} as {} ({}, {} words)",
        section.index,
        chapter_id,
        display_title,
        word_count
    );

    let chapter = Chapter {
        chapter_id,
        display_title,
        source_markup: section.raw_markup.clone(),
        text: section.text().to_string(),
        word_count,
        ordinal,
        section_index: section.index,
    };
    (state, Verdict::Accepted(chapter))
}

/// Accept/reject rule for a section inside the content.
fn rejection(
    title: &str,
    word_count: usize,
    content_start: bool,
    min_words: usize,
) -> Option<SkipReason> {
    match skip_keyword_count(title) {
        0 if word_count < min_words && !content_start => Some(SkipReason::TooShort),
        0 => None,
        1 if word_count < WEAK_SKIP_MIN_WORDS => Some(SkipReason::ShortMatter),
        1 => None,
        n => Some(SkipReason::MatterKeywords(n)),
    }
}

fn skipped(section: &Section, reason: SkipReason) -> Verdict {
    log::debug!(
        "Skipped section {} ({}): {}",
        section.index,
        section.title(),
        reason
    );
    Verdict::Skipped {
        section_index: section.index,
        title: section.title().to_string(),
        word_count: section.word_count(),
        reason,
    }
}
