//! Book-level orchestration: classify, clean, chunk, name, and render.
//!
//! Planning is synchronous and pure given a [`Document`]; conversion renders
//! the planned chapters concurrently, bounded by `max_workers`, while the
//! chunks of any one chapter stay sequential inside the [`SynthesisDriver`].

use crate::audio::metadata::{BookTags, chapter_markers, write_ffmetadata};
use crate::audio::{AudioAssembler, CHAPTER_GAP_MS, partial_output_path};
use crate::classify::{Chapter, Verdict, classify_sections};
use crate::config::RunConfig;
use crate::epub::{Document, read_document};
use crate::manifest::{ChapterStatus, Manifest, ManifestChapter};
use crate::synthesis::SynthesisDriver;
use crate::text::{TextChunk, WORDS_PER_MINUTE, clean_for_tts, estimate_reading_minutes, process_chapter};
use crate::tts::TtsBackend;
use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Longest title fragment kept in a file name, in characters.
const MAX_TITLE_IN_FILE_NAME: usize = 50;

/// Make a title safe for a file name.
///
/// Keeps alphanumerics, spaces, `-` and `_`; trims; truncates to 50
/// characters; collapses whitespace runs to a single `_`.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let truncated: String = kept.trim().chars().take(MAX_TITLE_IN_FILE_NAME).collect();
    let joined = truncated.split_whitespace().collect::<Vec<_>>().join("_");

    if joined.is_empty() {
        "untitled".to_string()
    } else {
        joined
    }
}

/// `{stem}_{chapter_id}_{sanitized_title}.{ext}`
pub fn output_file_name(stem: &str, chapter_id: &str, title: &str, extension: &str) -> String {
    format!("{}_{}_{}.{}", stem, chapter_id, sanitize_title(title), extension)
}

/// File stem of a source document.
pub fn document_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string())
}

/// A chapter ready for synthesis.
#[derive(Debug, Clone)]
pub struct PlannedChapter {
    pub chapter: Chapter,
    pub chunks: Vec<TextChunk>,
    /// Output file name inside the output directory
    pub file_name: String,
}

/// Everything decided about one document before any audio is produced.
#[derive(Debug, Clone)]
pub struct DocumentPlan {
    pub source: PathBuf,
    pub stem: String,
    pub title: String,
    pub author: Option<String>,
    pub language: Option<String>,
    /// One verdict per section, in reading order
    pub verdicts: Vec<Verdict>,
    pub chapters: Vec<PlannedChapter>,
}

impl DocumentPlan {
    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(|c| c.chapter.word_count).sum()
    }

    pub fn total_chunks(&self) -> usize {
        self.chapters.iter().map(|c| c.chunks.len()).sum()
    }

    pub fn skipped_sections(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| matches!(v, Verdict::Skipped { .. }))
            .count()
    }

    pub fn estimated_minutes(&self) -> f64 {
        estimate_reading_minutes(self.total_words(), WORDS_PER_MINUTE)
    }

    /// `{stem}_full.{ext}`
    pub fn combined_file_name(&self, extension: &str) -> String {
        format!("{}_full.{}", self.stem, extension)
    }
}

/// Classify, clean and chunk a document.
pub fn plan_document(source: &Path, document: &Document, config: &RunConfig) -> DocumentPlan {
    let stem = document_stem(source);
    let extension = config.format.extension();
    let verdicts = classify_sections(&document.sections, config.classify);

    let chapters = verdicts
        .iter()
        .filter_map(Verdict::chapter)
        .filter_map(|chapter| {
            let cleaned = clean_for_tts(&chapter.text, config.expand_abbreviations);
            let chunks = process_chapter(&chapter.chapter_id, &cleaned, config.chunk_size);
            if chunks.is_empty() {
                log::warn!(
                    "{}: {} has no speakable text, skipping",
                    stem,
                    chapter.chapter_id
                );
                return None;
            }

            Some(PlannedChapter {
                file_name: output_file_name(
                    &stem,
                    &chapter.chapter_id,
                    &chapter.display_title,
                    extension,
                ),
                chapter: chapter.clone(),
                chunks,
            })
        })
        .collect();

    DocumentPlan {
        source: source.to_path_buf(),
        stem,
        title: document.title.clone(),
        author: document.author.clone(),
        language: document.language.clone(),
        verdicts,
        chapters,
    }
}

/// Read and plan a document from disk.
pub fn load_plan(source: &Path, config: &RunConfig) -> Result<DocumentPlan> {
    let document = read_document(source)?;
    Ok(plan_document(source, &document, config))
}

/// Remove audio files (wav, mp3) directly inside `dir`. Returns how many.
pub fn clean_output_dir(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_audio = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("mp3"))
            .unwrap_or(false);
        if path.is_file() && is_audio {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// What happened to one document.
#[derive(Debug, Clone)]
pub struct DocumentReport {
    pub source: PathBuf,
    pub title: String,
    pub converted: usize,
    pub existing: usize,
    pub failed: usize,
    pub skipped_sections: usize,
    pub words: usize,
    pub combined: Option<PathBuf>,
    pub manifest: PathBuf,
}

/// Totals over a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub documents: usize,
    /// Documents that could not be processed at all, with the reason
    pub failed_documents: Vec<(PathBuf, String)>,
    pub converted: usize,
    pub existing: usize,
    pub failed: usize,
    pub skipped_sections: usize,
    pub total_words: usize,
}

impl RunSummary {
    pub fn record(&mut self, report: &DocumentReport) {
        self.documents += 1;
        self.converted += report.converted;
        self.existing += report.existing;
        self.failed += report.failed;
        self.skipped_sections += report.skipped_sections;
        self.total_words += report.words;
    }

    pub fn estimated_minutes(&self) -> f64 {
        estimate_reading_minutes(self.total_words, WORDS_PER_MINUTE)
    }

    /// No chapter and no document failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.failed_documents.is_empty()
    }
}

/// Converts documents with one backend and one assembler.
pub struct Converter {
    config: Arc<RunConfig>,
    backend: Arc<dyn TtsBackend>,
    assembler: Arc<dyn AudioAssembler>,
    limiter: Arc<Semaphore>,
    progress: MultiProgress,
}

impl Converter {
    pub fn new(
        config: RunConfig,
        backend: Arc<dyn TtsBackend>,
        assembler: Arc<dyn AudioAssembler>,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_workers));
        Self {
            config: Arc::new(config),
            backend,
            assembler,
            limiter,
            progress: MultiProgress::new(),
        }
    }

    /// Hide progress bars (tests, non-interactive use).
    pub fn without_progress(mut self) -> Self {
        self.progress = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        self
    }

    /// Convert every document in order. A failing document is logged and
    /// counted; the others still run.
    pub async fn convert_all(&self, sources: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::default();

        for source in sources {
            match self.convert_document(source).await {
                Ok(report) => {
                    log::info!(
                        "{} ({}): {} written, {} kept, {} failed",
                        report.title,
                        report.source.display(),
                        report.converted,
                        report.existing,
                        report.failed
                    );
                    summary.record(&report);
                }
                Err(e) => {
                    log::error!("{}: {:#}", source.display(), e);
                    summary
                        .failed_documents
                        .push((source.clone(), format!("{:#}", e)));
                }
            }
        }

        summary
    }

    /// Read, plan and convert one document.
    pub async fn convert_document(&self, source: &Path) -> Result<DocumentReport> {
        let plan = {
            let source = source.to_path_buf();
            let config = Arc::clone(&self.config);
            tokio::task::spawn_blocking(move || load_plan(&source, &config))
                .await
                .context("Task join error")??
        };
        self.convert_plan(plan).await
    }

    /// Render a planned document, then combine and write its manifest.
    pub async fn convert_plan(&self, plan: DocumentPlan) -> Result<DocumentReport> {
        let config = &self.config;
        log::info!(
            "{}: {} chapters, {} sections skipped, ~{:.0} min",
            plan.title,
            plan.chapters.len(),
            plan.skipped_sections(),
            plan.estimated_minutes()
        );

        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;

        let pb = self.progress_bar(&plan);
        let driver = Arc::new(
            SynthesisDriver::new(
                Arc::clone(&self.backend),
                Arc::clone(&self.assembler),
                config.tts_options(),
            )
            .with_timeout(config.synthesis_timeout)
            .with_progress(pb.clone()),
        );

        let mut statuses: Vec<Option<ChapterStatus>> = vec![None; plan.chapters.len()];
        let mut tasks = JoinSet::new();

        for (i, planned) in plan.chapters.iter().enumerate() {
            let output = config.output_dir.join(&planned.file_name);
            if output.exists() && !config.force {
                log::info!("Keeping existing {}", output.display());
                statuses[i] = Some(ChapterStatus::Existing);
                pb.inc(planned.chunks.len() as u64);
                continue;
            }

            let driver = Arc::clone(&driver);
            let limiter = Arc::clone(&self.limiter);
            let unit = format!("{}/{}", plan.stem, planned.chapter.chapter_id);
            let chunks = planned.chunks.clone();

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await;
                (i, driver.render(&unit, &chunks, &output).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (i, result) = joined.context("Chapter task failed")?;
            statuses[i] = Some(match result {
                Ok(path) => {
                    log::info!("Wrote {}", path.display());
                    ChapterStatus::Converted
                }
                Err(e) => {
                    log::error!("{}: {}", plan.source.display(), e);
                    ChapterStatus::Failed {
                        error: e.to_string(),
                    }
                }
            });
        }
        pb.finish_and_clear();

        let chapters: Vec<ManifestChapter> = plan
            .chapters
            .iter()
            .zip(statuses)
            .map(|(planned, status)| ManifestChapter {
                chapter_id: planned.chapter.chapter_id.clone(),
                title: planned.chapter.display_title.clone(),
                file: planned.file_name.clone(),
                words: planned.chapter.word_count,
                chunks: planned.chunks.len(),
                status: status.unwrap_or(ChapterStatus::Failed {
                    error: "not rendered".to_string(),
                }),
            })
            .collect();

        let count = |wanted: fn(&ChapterStatus) -> bool| {
            chapters.iter().filter(|c| wanted(&c.status)).count()
        };
        let converted = count(|s| matches!(s, ChapterStatus::Converted));
        let existing = count(|s| matches!(s, ChapterStatus::Existing));
        let failed = count(|s| matches!(s, ChapterStatus::Failed { .. }));

        let combined = if !config.combine || plan.chapters.is_empty() {
            None
        } else if failed > 0 {
            log::warn!(
                "{}: {} chapters failed, not writing a combined file",
                plan.title,
                failed
            );
            None
        } else {
            match self.combine(&plan).await {
                Ok(path) => {
                    log::info!("Wrote {}", path.display());
                    Some(path)
                }
                Err(e) => {
                    log::error!("{}: combining failed: {:#}", plan.source.display(), e);
                    None
                }
            }
        };

        let manifest_path = Manifest::path_for(&config.output_dir, &plan.stem);
        let manifest = Manifest {
            source: plan.source.clone(),
            title: plan.title.clone(),
            author: plan.author.clone(),
            language: plan.language.clone(),
            generated_at: chrono::Utc::now(),
            backend: self.backend.name().to_string(),
            voice: config.voice.clone(),
            format: config.format.to_string(),
            chapters,
            combined: combined
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            total_words: plan.total_words(),
            estimated_minutes: plan.estimated_minutes(),
        };
        manifest.save(&manifest_path)?;

        Ok(DocumentReport {
            source: plan.source.clone(),
            title: plan.title.clone(),
            converted,
            existing,
            failed,
            skipped_sections: plan.skipped_sections(),
            words: plan.total_words(),
            combined,
            manifest: manifest_path,
        })
    }

    fn progress_bar(&self, plan: &DocumentPlan) -> ProgressBar {
        let pb = self
            .progress
            .add(ProgressBar::new(plan.total_chunks() as u64));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {msg} {bar:40.cyan/blue} {pos}/{len} chunks ({elapsed})")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.set_message(plan.stem.clone());
        pb
    }

    async fn combine(&self, plan: &DocumentPlan) -> Result<PathBuf> {
        let extension = self.config.format.extension();
        let chapters: Vec<(String, PathBuf)> = plan
            .chapters
            .iter()
            .map(|c| {
                (
                    c.chapter.display_title.clone(),
                    self.config.output_dir.join(&c.file_name),
                )
            })
            .collect();
        let output = self
            .config
            .output_dir
            .join(plan.combined_file_name(extension));
        let tags = BookTags {
            title: plan.title.clone(),
            author: plan.author.clone(),
            language: plan.language.clone(),
        };

        let assembler = Arc::clone(&self.assembler);
        let target = output.clone();
        tokio::task::spawn_blocking(move || {
            combine_files(assembler.as_ref(), &chapters, &tags, extension, &target)
        })
        .await
        .context("Task join error")??;

        Ok(output)
    }
}

/// Join chapter files with [`CHAPTER_GAP_MS`] of silence and tag the result
/// with book metadata and one chapter marker per file.
pub fn combine_files(
    assembler: &dyn AudioAssembler,
    chapters: &[(String, PathBuf)],
    tags: &BookTags,
    extension: &str,
    output: &Path,
) -> Result<()> {
    let scratch = TempDir::new()?;

    let durations = chapters
        .iter()
        .map(|(title, path)| Ok((title.clone(), assembler.duration_ms(path)?)))
        .collect::<Result<Vec<_>>>()?;
    let markers = chapter_markers(&durations, CHAPTER_GAP_MS);

    let files: Vec<PathBuf> = chapters.iter().map(|(_, path)| path.clone()).collect();
    let joined = scratch.path().join(format!("joined.{}", extension));
    assembler.concat(&files, CHAPTER_GAP_MS, &joined)?;

    let metadata = scratch.path().join("metadata.txt");
    write_ffmetadata(tags, &markers, &metadata)?;
    let partial = partial_output_path(output);
    let tagged = assembler
        .apply_metadata(&joined, &metadata, &partial)
        .and_then(|()| {
            std::fs::rename(&partial, output)
                .with_context(|| format!("Failed to move output to {}", output.display()))
        });
    if tagged.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    tagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{MemoryAssembler, gap_marker};
    use crate::config::{AppConfig, RunOverrides};
    use crate::tts::mock::MockBackend;
    use std::time::Duration;

    fn run_config(output_dir: &Path, overrides: RunOverrides) -> RunConfig {
        AppConfig::default()
            .resolve(RunOverrides {
                output_dir: Some(output_dir.to_path_buf()),
                voices_dir: Some(output_dir.join("voices")),
                ..overrides
            })
            .unwrap()
    }

    fn chapter_markup(heading: &str, sentences: &[&str]) -> String {
        format!(
            "<html><body><h1>{}</h1><p>{}</p></body></html>",
            heading,
            sentences.join(" ")
        )
    }

    fn filler(n: usize) -> String {
        format!("{}.", vec!["mot"; n].join(" "))
    }

    /// Copyright page, then three chapters of ~120 words each.
    fn book() -> Document {
        let long = filler(120);
        Document::from_markup(
            "Le Roman",
            vec![
                chapter_markup("Copyright", &["Tous droits réservés."]),
                chapter_markup("Chapitre 1", &["Il était une fois.", &long]),
                chapter_markup("Chapitre 2", &["La suite arrive.", &long]),
                chapter_markup("Chapitre 3", &["Et la fin.", &long]),
            ],
        )
    }

    fn converter(config: RunConfig, backend: Arc<MockBackend>, assembler: Arc<MemoryAssembler>) -> Converter {
        Converter::new(config, backend, assembler).without_progress()
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Chapitre 1 : L'orage!"), "Chapitre_1_Lorage");
        assert_eq!(sanitize_title("  Partie   deux  "), "Partie_deux");
        assert_eq!(sanitize_title("???"), "untitled");
        assert_eq!(sanitize_title("Chapter 1: Préface"), "Chapter_1_Préface");

        let long = "a".repeat(80);
        assert_eq!(sanitize_title(&long).chars().count(), 50);
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("roman", "ch004", "Chapter IV: The End", "mp3"),
            "roman_ch004_Chapter_IV_The_End.mp3"
        );
    }

    #[test]
    fn test_plan_document() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(dir.path(), RunOverrides::default());

        let plan = plan_document(Path::new("/books/roman.epub"), &book(), &config);

        assert_eq!(plan.stem, "roman");
        assert_eq!(plan.verdicts.len(), 4);
        assert_eq!(plan.skipped_sections(), 1);
        let names: Vec<&str> = plan.chapters.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "roman_ch001_Chapitre_1.wav",
                "roman_ch002_Chapitre_2.wav",
                "roman_ch003_Chapitre_3.wav",
            ]
        );
        assert_eq!(plan.total_chunks(), 3);
        assert_eq!(plan.combined_file_name("wav"), "roman_full.wav");
    }

    #[test]
    fn test_plan_cleans_text_before_chunking() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(
            dir.path(),
            RunOverrides {
                chunk_size: Some(40),
                min_words: Some(1),
                ..Default::default()
            },
        );
        let doc = Document::from_markup(
            "Court",
            vec![chapter_markup(
                "Chapitre 1",
                &["M. Dupont arrive.", "Le Dr Martin attend.", "Fin."],
            )],
        );

        let plan = plan_document(Path::new("court.epub"), &doc, &config);
        let texts: Vec<&str> = plan.chapters[0]
            .chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect();

        assert!(texts.iter().all(|t| t.chars().count() <= 40));
        assert!(texts.join(" ").contains("Monsieur Dupont"));
        assert!(texts.join(" ").contains("Docteur Martin"));
    }

    #[tokio::test]
    async fn test_convert_plan_writes_chapters_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(dir.path(), RunOverrides::default());
        let plan = plan_document(Path::new("roman.epub"), &book(), &config);
        let backend = Arc::new(MockBackend::always_succeeds());

        let report = converter(config, backend.clone(), Arc::new(MemoryAssembler::new()))
            .convert_plan(plan)
            .await
            .unwrap();

        assert_eq!(report.source, PathBuf::from("roman.epub"));
        assert_eq!(report.title, "Le Roman");
        assert_eq!(report.converted, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped_sections, 1);
        assert!(dir.path().join("roman_ch002_Chapitre_2.wav").is_file());
        assert!(report.combined.is_none());
        assert_eq!(backend.call_count(), 3);

        let manifest = Manifest::load(&report.manifest).unwrap();
        assert_eq!(manifest.title, "Le Roman");
        assert_eq!(manifest.backend, "mock");
        assert_eq!(manifest.chapters.len(), 3);
        assert!(manifest.chapters.iter().all(|c| c.status == ChapterStatus::Converted));
    }

    #[tokio::test]
    async fn test_failed_chapter_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(
            dir.path(),
            RunOverrides {
                combine: true,
                ..Default::default()
            },
        );
        let plan = plan_document(Path::new("roman.epub"), &book(), &config);
        let backend = Arc::new(MockBackend::fails_on("La suite", "engine crashed"));

        let report = converter(config, backend, Arc::new(MemoryAssembler::new()))
            .convert_plan(plan)
            .await
            .unwrap();

        assert_eq!(report.converted, 2);
        assert_eq!(report.failed, 1);
        assert!(report.combined.is_none());
        assert!(!dir.path().join("roman_ch002_Chapitre_2.wav").exists());

        let manifest = Manifest::load(&report.manifest).unwrap();
        match &manifest.chapters[1].status {
            ChapterStatus::Failed { error } => {
                assert!(error.contains("roman/ch002"));
                assert!(error.contains("engine crashed"));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_existing_outputs_are_kept_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roman_ch001_Chapitre_1.wav"), b"old").unwrap();

        let config = run_config(dir.path(), RunOverrides::default());
        let plan = plan_document(Path::new("roman.epub"), &book(), &config);
        let backend = Arc::new(MockBackend::always_succeeds());
        let report = converter(config, backend.clone(), Arc::new(MemoryAssembler::new()))
            .convert_plan(plan)
            .await
            .unwrap();

        assert_eq!(report.existing, 1);
        assert_eq!(report.converted, 2);
        assert_eq!(backend.call_count(), 2);
        assert_eq!(std::fs::read(dir.path().join("roman_ch001_Chapitre_1.wav")).unwrap(), b"old");

        let config = run_config(
            dir.path(),
            RunOverrides {
                force: true,
                ..Default::default()
            },
        );
        let plan = plan_document(Path::new("roman.epub"), &book(), &config);
        let report = converter(config, backend.clone(), Arc::new(MemoryAssembler::new()))
            .convert_plan(plan)
            .await
            .unwrap();
        assert_eq!(report.converted, 3);
        assert_ne!(std::fs::read(dir.path().join("roman_ch001_Chapitre_1.wav")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_chapters_run_concurrently_up_to_worker_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(
            dir.path(),
            RunOverrides {
                max_workers: Some(2),
                ..Default::default()
            },
        );
        let plan = plan_document(Path::new("roman.epub"), &book(), &config);
        let backend =
            Arc::new(MockBackend::always_succeeds().with_delay(Duration::from_millis(50)));

        converter(config, backend.clone(), Arc::new(MemoryAssembler::new()))
            .convert_plan(plan)
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 3);
        assert!(backend.peak_concurrency() <= 2);
    }

    #[tokio::test]
    async fn test_combine_writes_full_file_with_markers() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(
            dir.path(),
            RunOverrides {
                combine: true,
                ..Default::default()
            },
        );
        let plan = plan_document(Path::new("roman.epub"), &book(), &config);
        let assembler = Arc::new(MemoryAssembler::new());

        let report = converter(config, Arc::new(MockBackend::always_succeeds()), assembler.clone())
            .convert_plan(plan)
            .await
            .unwrap();

        let combined = report.combined.unwrap();
        assert_eq!(combined, dir.path().join("roman_full.wav"));
        let content = std::fs::read_to_string(&combined).unwrap();
        assert_eq!(content.matches(&gap_marker(CHAPTER_GAP_MS)).count(), 2);

        let metadata = assembler.applied_metadata().unwrap();
        assert!(metadata.contains("title=Le Roman"));
        assert_eq!(metadata.matches("[CHAPTER]").count(), 3);
        assert!(metadata.contains("title=Chapitre 3"));

        let manifest = Manifest::load(&report.manifest).unwrap();
        assert_eq!(manifest.combined.as_deref(), Some("roman_full.wav"));
        assert!(!dir.path().join("roman_full.part.wav").exists());
    }

    #[tokio::test]
    async fn test_unreadable_document_is_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_config(dir.path(), RunOverrides::default());
        let broken = dir.path().join("broken.epub");
        std::fs::write(&broken, b"not an epub").unwrap();

        let summary = converter(
            config,
            Arc::new(MockBackend::always_succeeds()),
            Arc::new(MemoryAssembler::new()),
        )
        .convert_all(&[broken.clone()])
        .await;

        assert_eq!(summary.documents, 0);
        assert_eq!(summary.failed_documents.len(), 1);
        assert_eq!(summary.failed_documents[0].0, broken);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_clean_output_dir_only_removes_audio() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("b.MP3"), b"").unwrap();
        std::fs::write(dir.path().join("roman_manifest.json"), b"{}").unwrap();

        assert_eq!(clean_output_dir(dir.path()).unwrap(), 2);
        assert!(dir.path().join("roman_manifest.json").exists());
        assert_eq!(clean_output_dir(&dir.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn test_run_summary() {
        let mut summary = RunSummary::default();
        summary.record(&DocumentReport {
            source: PathBuf::from("a.epub"),
            title: "A".to_string(),
            converted: 3,
            existing: 1,
            failed: 0,
            skipped_sections: 2,
            words: 1500,
            combined: None,
            manifest: PathBuf::from("a_manifest.json"),
        });

        assert_eq!(summary.documents, 1);
        assert_eq!(summary.converted, 3);
        assert_eq!(summary.estimated_minutes(), 10.0);
        assert!(summary.is_success());
    }
}
