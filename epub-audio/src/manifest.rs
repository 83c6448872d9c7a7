//! Per-book run manifest written next to the audio files.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Outcome of one chapter in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChapterStatus {
    Converted,
    /// Output was already present and `--force` was not given
    Existing,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestChapter {
    pub chapter_id: String,
    pub title: String,
    /// File name inside the output directory
    pub file: String,
    pub words: usize,
    pub chunks: usize,
    #[serde(flatten)]
    pub status: ChapterStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source: PathBuf,
    pub title: String,
    pub author: Option<String>,
    pub language: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub backend: String,
    pub voice: String,
    pub format: String,
    pub chapters: Vec<ManifestChapter>,
    /// Combined file name, when one was produced
    pub combined: Option<String>,
    pub total_words: usize,
    pub estimated_minutes: f64,
}

impl Manifest {
    /// Manifest location for a book: `{stem}_manifest.json`.
    pub fn path_for(output_dir: &Path, stem: &str) -> PathBuf {
        output_dir.join(format!("{}_manifest.json", stem))
    }

    pub fn failed_count(&self) -> usize {
        self.chapters
            .iter()
            .filter(|c| matches!(c.status, ChapterStatus::Failed { .. }))
            .count()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write manifest {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse manifest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            source: PathBuf::from("books/roman.epub"),
            title: "Le Roman".to_string(),
            author: Some("A. Auteur".to_string()),
            language: Some("fr".to_string()),
            generated_at: Utc::now(),
            backend: "piper".to_string(),
            voice: "upmc".to_string(),
            format: "wav".to_string(),
            chapters: vec![
                ManifestChapter {
                    chapter_id: "ch001".to_string(),
                    title: "Chapitre 1".to_string(),
                    file: "roman_ch001_Chapitre_1.wav".to_string(),
                    words: 1200,
                    chunks: 2,
                    status: ChapterStatus::Converted,
                },
                ManifestChapter {
                    chapter_id: "ch002".to_string(),
                    title: "Chapitre 2".to_string(),
                    file: "roman_ch002_Chapitre_2.wav".to_string(),
                    words: 900,
                    chunks: 1,
                    status: ChapterStatus::Failed {
                        error: "piper failed".to_string(),
                    },
                },
            ],
            combined: None,
            total_words: 2100,
            estimated_minutes: 14.0,
        }
    }

    #[test]
    fn test_path_for() {
        assert_eq!(
            Manifest::path_for(Path::new("out"), "roman"),
            PathBuf::from("out/roman_manifest.json")
        );
    }

    #[test]
    fn test_status_is_flattened() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["chapters"][0]["status"], "converted");
        assert_eq!(json["chapters"][1]["status"], "failed");
        assert_eq!(json["chapters"][1]["error"], "piper failed");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = Manifest::path_for(dir.path(), "roman");
        let manifest = sample();

        manifest.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();

        assert_eq!(loaded, manifest);
        assert_eq!(loaded.failed_count(), 1);
    }
}
