//! Text processing for TTS: markup extraction, cleaning, and chunking.

pub mod chunker;
pub mod cleaner;
pub mod extract;

pub use chunker::process_chapter;
pub use cleaner::{clean_for_tts, estimate_reading_minutes};
pub use extract::{extract_text, fragment_text};

/// Narration pace used for duration estimates.
pub const WORDS_PER_MINUTE: usize = 150;

/// A chunk of text ready for TTS processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chapter this chunk belongs to
    pub chapter_id: String,
    /// The chunk index within the chapter
    pub chunk_id: usize,
    /// The text content
    pub text: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(chapter_id: impl Into<String>, chunk_id: usize, text: String) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            chunk_id,
            text,
        }
    }

    /// Length of the text in characters.
    pub fn size(&self) -> usize {
        self.text.chars().count()
    }
}
