//! FFmpeg metadata generation for combined-book chapter markers.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A chapter marker inside a combined file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterMarker {
    pub title: String,
    /// Start position in milliseconds
    pub start_ms: u64,
    /// End position in milliseconds
    pub end_ms: u64,
}

impl ChapterMarker {
    pub fn new(title: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            title: title.into(),
            start_ms,
            end_ms,
        }
    }
}

/// Book-level tags written alongside the markers.
#[derive(Debug, Clone, Default)]
pub struct BookTags {
    pub title: String,
    pub author: Option<String>,
    pub language: Option<String>,
}

/// Lay chapters end to end with `gap_ms` of silence between them.
///
/// A chapter's marker covers its own audio; the gap that follows belongs to
/// no chapter, so the next one starts `gap_ms` after the previous end.
pub fn chapter_markers(chapters: &[(String, u64)], gap_ms: u64) -> Vec<ChapterMarker> {
    chapters
        .iter()
        .scan(0u64, |cursor, (title, duration_ms)| {
            let start = *cursor;
            let end = start + duration_ms;
            *cursor = end + gap_ms;
            Some(ChapterMarker::new(title.clone(), start, end))
        })
        .collect()
}

/// Write an FFMETADATA1 file with book tags and chapter markers.
pub fn write_ffmetadata(tags: &BookTags, chapters: &[ChapterMarker], output_path: &Path) -> Result<()> {
    let mut file = File::create(output_path).context("Failed to create metadata file")?;

    writeln!(file, ";FFMETADATA1")?;
    writeln!(file, "title={}", escape_metadata_value(&tags.title))?;
    writeln!(file, "album={}", escape_metadata_value(&tags.title))?;
    if let Some(author) = &tags.author {
        writeln!(file, "artist={}", escape_metadata_value(author))?;
    }
    if let Some(language) = &tags.language {
        writeln!(file, "language={}", escape_metadata_value(language))?;
    }
    writeln!(file, "genre=Audiobook")?;
    writeln!(file)?;

    for chapter in chapters {
        writeln!(file, "[CHAPTER]")?;
        writeln!(file, "TIMEBASE=1/1000")?;
        writeln!(file, "START={}", chapter.start_ms)?;
        writeln!(file, "END={}", chapter.end_ms)?;
        writeln!(file, "title={}", escape_metadata_value(&chapter.title))?;
        writeln!(file)?;
    }

    Ok(())
}

/// Escape `=`, `;`, `#`, `\` and newlines for FFMETADATA values.
fn escape_metadata_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '=' | ';' | '#' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => {}
            _ => escaped.push(c),
        }
    }

    escaped
}
