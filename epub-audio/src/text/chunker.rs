//! Sentence-aligned text chunking for TTS processing.

use super::TextChunk;
use once_cell::sync::Lazy;
use regex::Regex;

/// Default chunk bound in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// Sentence punctuation followed by the whitespace the split happens in.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Split text into sentences.
///
/// A break occurs after any `.`, `!` or `?` followed by whitespace; the
/// punctuation stays with the sentence it ends. Empty sentences are dropped.
pub fn split_into_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_END.find_iter(text) {
        // The punctuation mark is a single ASCII byte.
        let end = boundary.start() + 1;
        sentences.push(text[start..end].trim());
        start = boundary.end();
    }
    sentences.push(text[start..].trim());

    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Split text into chunks of at most `chunk_size` characters.
///
/// Sentences are accumulated greedily and joined with single spaces. A chunk
/// is closed when the next sentence would push it past the bound. A single
/// sentence longer than the bound is never subdivided: it becomes a chunk of
/// its own, oversized.
pub fn split_into_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_into_sentences(text) {
        let sentence_len = sentence.chars().count();

        if !current.is_empty() && current_len + 1 + sentence_len > chunk_size {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += sentence_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Process a chapter's text into TTS-ready chunks.
pub fn process_chapter(chapter_id: &str, text: &str, chunk_size: usize) -> Vec<TextChunk> {
    split_into_chunks(text, chunk_size)
        .into_iter()
        .enumerate()
        .map(|(chunk_id, text)| TextChunk::new(chapter_id, chunk_id, text))
        .collect()
}
