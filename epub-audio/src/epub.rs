// EPUB container reading

use crate::classify::Section;
use anyhow::{Context, Result};
use std::path::Path;

/// A document opened from disk: metadata plus spine-ordered sections.
#[derive(Debug)]
pub struct Document {
    /// Book title
    pub title: String,
    /// Book author(s)
    pub author: Option<String>,
    /// Language tag from the package metadata
    pub language: Option<String>,
    /// Sections in reading order
    pub sections: Vec<Section>,
}

impl Document {
    /// Build a document from markup strings, indexed in order.
    pub fn from_markup<I, S>(title: impl Into<String>, markup: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sections = markup
            .into_iter()
            .enumerate()
            .map(|(index, m)| Section::new(index, m))
            .collect();

        Self {
            title: title.into(),
            author: None,
            language: None,
            sections,
        }
    }

    /// Total word count across all sections (approximate)
    pub fn total_words(&self) -> usize {
        self.sections.iter().map(Section::word_count).sum()
    }
}

/// Open an EPUB file and read its spine.
///
/// Spine items whose resource cannot be loaded are skipped with a warning;
/// section indices stay contiguous over the items that were read.
pub fn read_document(path: &Path) -> Result<Document> {
    let mut doc = epub::doc::EpubDoc::new(path)
        .map_err(|e| anyhow::anyhow!("Failed to open EPUB: {}", e))
        .with_context(|| format!("Reading {}", path.display()))?;

    let title = doc
        .mdata("title")
        .map(|m| m.value.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| fallback_title(path));
    let author = doc.mdata("creator").map(|m| m.value.clone());
    let language = doc.mdata("language").map(|m| m.value.clone());

    let spine = doc.spine.clone();
    let mut markup = Vec::with_capacity(spine.len());

    for spine_item in spine.iter() {
        match doc.get_resource(&spine_item.idref) {
            Some((content_bytes, _mime)) => {
                markup.push(String::from_utf8_lossy(&content_bytes).into_owned());
            }
            None => {
                log::warn!(
                    "{}: spine item {} could not be read, skipping",
                    path.display(),
                    spine_item.idref
                );
            }
        }
    }

    let mut document = Document::from_markup(title, markup);
    document.author = author;
    document.language = language;

    log::debug!(
        "{}: {} spine items, {} sections read, ~{} words",
        path.display(),
        spine.len(),
        document.sections.len(),
        document.total_words()
    );
    Ok(document)
}

/// Title used when the package metadata has none: the file stem.
fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_markup_indexes_in_order() {
        let doc = Document::from_markup(
            "Le livre",
            vec!["<h1>Un</h1><p>a b c</p>", "<h1>Deux</h1><p>d e</p>"],
        );

        assert_eq!(doc.title, "Le livre");
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[1].index, 1);
        assert_eq!(doc.sections[1].title(), "Deux");
        assert_eq!(doc.total_words(), 7);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_document(&dir.path().join("absent.epub"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_container_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        std::fs::write(&path, b"not a zip archive").unwrap();
        assert!(read_document(&path).is_err());
    }

    #[test]
    fn test_fallback_title_uses_stem() {
        assert_eq!(fallback_title(Path::new("/books/mon_roman.epub")), "mon_roman");
    }
}
