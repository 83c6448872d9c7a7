//! epub-audio configuration management.
//!
//! [`AppConfig`] is the persisted file; [`RunConfig`] is the immutable value a
//! conversion run works from, built by layering command-line overrides on top.

use crate::audio::AudioFormat;
use crate::bootstrap;
use crate::classify::ClassifyOptions;
use crate::text::chunker::DEFAULT_CHUNK_SIZE;
use crate::tts::voices::default_voice;
use crate::tts::{BackendKind, MAX_SPEED, MIN_SPEED, TtsOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SPEED: f32 = 1.0;
const DEFAULT_BITRATE: &str = "192k";
const DEFAULT_MIN_CHAPTER_WORDS: usize = 100;
const DEFAULT_MAX_WORKERS: usize = 4;
const DEFAULT_OUTPUT_DIR: &str = "output/audio";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Synthesis engine
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Voice short name, model path or id. None means the backend's default.
    #[serde(default)]
    pub voice: Option<String>,

    /// Speaking rate (0.5-2.0)
    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default = "default_audio_format")]
    pub audio_format: AudioFormat,

    /// MP3 bitrate passed to the encoder
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// Maximum characters per synthesis call
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum words for a section without a content-start title
    #[serde(default = "default_min_chapter_words")]
    pub min_chapter_words: usize,

    /// Drop everything before the first chapter-like title
    #[serde(default = "default_true")]
    pub skip_metadata: bool,

    /// Also produce a single file with chapter markers
    #[serde(default)]
    pub combine: bool,

    /// Expand French abbreviations (M., Mme, Dr, etc.) before synthesis
    #[serde(default = "default_true")]
    pub expand_abbreviations: bool,

    /// Chapters synthesized concurrently
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Upper bound on a single synthesis call
    #[serde(default)]
    pub synthesis_timeout_secs: Option<u64>,

    /// Where Piper voices live. None means the data directory.
    #[serde(default)]
    pub voices_dir: Option<PathBuf>,

    /// Explicit Piper binary
    #[serde(default)]
    pub piper_binary: Option<PathBuf>,

    /// Virtualenv providing torch/transformers for the huggingface backend
    #[serde(default)]
    pub python_venv: Option<PathBuf>,

    /// Device for the huggingface backend (cuda, mps, cpu). None means auto-detect.
    #[serde(default)]
    pub device: Option<String>,
}

fn default_backend() -> BackendKind {
    BackendKind::Piper
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

fn default_audio_format() -> AudioFormat {
    AudioFormat::Wav
}

fn default_bitrate() -> String {
    DEFAULT_BITRATE.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_min_chapter_words() -> usize {
    DEFAULT_MIN_CHAPTER_WORDS
}

fn default_true() -> bool {
    true
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            voice: None,
            speed: default_speed(),
            audio_format: default_audio_format(),
            bitrate: default_bitrate(),
            chunk_size: default_chunk_size(),
            min_chapter_words: default_min_chapter_words(),
            skip_metadata: true,
            combine: false,
            expand_abbreviations: true,
            max_workers: default_max_workers(),
            output_dir: default_output_dir(),
            synthesis_timeout_secs: None,
            voices_dir: None,
            piper_binary: None,
            python_venv: None,
            device: None,
        }
    }
}

/// Keys accepted by `config set`.
pub const SETTABLE_KEYS: &[&str] = &[
    "backend",
    "voice",
    "speed",
    "audio_format",
    "bitrate",
    "chunk_size",
    "min_chapter_words",
    "skip_metadata",
    "combine",
    "expand_abbreviations",
    "max_workers",
    "output_dir",
    "synthesis_timeout_secs",
    "voices_dir",
    "piper_binary",
    "python_venv",
    "device",
];

/// "none" or an empty value clears an optional setting.
fn optional(value: &str) -> Option<String> {
    match value.trim() {
        "" | "none" => None,
        v => Some(v.to_string()),
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", value, key, e))
}

impl AppConfig {
    /// Get the config file path: ~/.config/cli-programs/epub-audio.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("epub-audio.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Update one setting from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "backend" => self.backend = parse(key, value)?,
            "voice" => self.voice = optional(value),
            "speed" => self.speed = parse(key, value)?,
            "audio_format" | "format" => self.audio_format = parse(key, value)?,
            "bitrate" => self.bitrate = value.trim().to_string(),
            "chunk_size" => self.chunk_size = parse(key, value)?,
            "min_chapter_words" => self.min_chapter_words = parse(key, value)?,
            "skip_metadata" => self.skip_metadata = parse(key, value)?,
            "combine" => self.combine = parse(key, value)?,
            "expand_abbreviations" => self.expand_abbreviations = parse(key, value)?,
            "max_workers" => self.max_workers = parse(key, value)?,
            "output_dir" => self.output_dir = PathBuf::from(value.trim()),
            "synthesis_timeout_secs" => {
                self.synthesis_timeout_secs =
                    optional(value).map(|v| parse(key, &v)).transpose()?
            }
            "voices_dir" => self.voices_dir = optional(value).map(PathBuf::from),
            "piper_binary" => self.piper_binary = optional(value).map(PathBuf::from),
            "python_venv" => self.python_venv = optional(value).map(PathBuf::from),
            "device" => self.device = optional(value),
            other => anyhow::bail!(
                "Unknown setting '{}'. Settable keys: {}",
                other,
                SETTABLE_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    /// Voices directory, falling back to the data directory.
    pub fn resolved_voices_dir(&self) -> Result<PathBuf> {
        match &self.voices_dir {
            Some(dir) => Ok(dir.clone()),
            None => bootstrap::default_voices_dir(),
        }
    }

    /// Apply command-line overrides and validate, producing a run's settings.
    pub fn resolve(&self, overrides: RunOverrides) -> Result<RunConfig> {
        let backend = overrides.backend.unwrap_or(self.backend);

        // A voice saved for one backend means nothing to another.
        let voice = match (overrides.voice, overrides.backend) {
            (Some(v), _) => v,
            (None, Some(b)) if b != self.backend => default_voice(b).to_string(),
            (None, _) => self
                .voice
                .clone()
                .unwrap_or_else(|| default_voice(backend).to_string()),
        };

        let speed = overrides.speed.unwrap_or(self.speed);
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            anyhow::bail!(
                "Speed {} is out of range ({}-{})",
                speed,
                MIN_SPEED,
                MAX_SPEED
            );
        }

        let chunk_size = overrides.chunk_size.unwrap_or(self.chunk_size);
        if chunk_size == 0 {
            anyhow::bail!("Chunk size must be at least 1 character");
        }

        let max_workers = overrides.max_workers.unwrap_or(self.max_workers).max(1);

        let voices_dir = match overrides.voices_dir {
            Some(dir) => dir,
            None => self.resolved_voices_dir()?,
        };

        Ok(RunConfig {
            backend,
            voice,
            speed,
            format: overrides.format.unwrap_or(self.audio_format),
            bitrate: self.bitrate.clone(),
            chunk_size,
            classify: ClassifyOptions {
                min_words: overrides.min_words.unwrap_or(self.min_chapter_words),
                skip_metadata: self.skip_metadata && !overrides.keep_metadata,
            },
            expand_abbreviations: self.expand_abbreviations && !overrides.no_abbreviations,
            combine: self.combine || overrides.combine,
            max_workers,
            output_dir: overrides
                .output_dir
                .unwrap_or_else(|| self.output_dir.clone()),
            synthesis_timeout: overrides
                .timeout_secs
                .or(self.synthesis_timeout_secs)
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            force: overrides.force,
            dry_run: overrides.dry_run,
            voices_dir,
            piper_binary: self.piper_binary.clone(),
            python_venv: self.python_venv.clone(),
            device: overrides.device.or_else(|| self.device.clone()),
        })
    }
}

/// Values given on the command line for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub backend: Option<BackendKind>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    pub format: Option<AudioFormat>,
    pub chunk_size: Option<usize>,
    pub min_words: Option<usize>,
    pub max_workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub voices_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub device: Option<String>,
    pub keep_metadata: bool,
    pub no_abbreviations: bool,
    pub combine: bool,
    pub force: bool,
    pub dry_run: bool,
}

/// Settings for one conversion run. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub backend: BackendKind,
    pub voice: String,
    pub speed: f32,
    pub format: AudioFormat,
    pub bitrate: String,
    pub chunk_size: usize,
    pub classify: ClassifyOptions,
    pub expand_abbreviations: bool,
    pub combine: bool,
    pub max_workers: usize,
    pub output_dir: PathBuf,
    pub synthesis_timeout: Option<Duration>,
    /// Overwrite outputs that already exist
    pub force: bool,
    /// Classify and chunk only
    pub dry_run: bool,
    pub voices_dir: PathBuf,
    pub piper_binary: Option<PathBuf>,
    pub python_venv: Option<PathBuf>,
    pub device: Option<String>,
}

impl RunConfig {
    pub fn tts_options(&self) -> TtsOptions {
        TtsOptions::new().with_speed(self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides() -> RunOverrides {
        RunOverrides {
            voices_dir: Some(PathBuf::from("/tmp/voices")),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend, BackendKind::Piper);
        assert_eq!(config.audio_format, AudioFormat::Wav);
        assert_eq!(config.bitrate, "192k");
        assert_eq!(config.chunk_size, 5000);
        assert_eq!(config.min_chapter_words, 100);
        assert_eq!(config.max_workers, 4);
        assert!(config.skip_metadata);
        assert!(!config.combine);
        assert_eq!(config.output_dir, PathBuf::from("output/audio"));
    }

    #[test]
    fn test_config_path() {
        let path = AppConfig::config_path().unwrap();
        assert!(path.ends_with("cli-programs/epub-audio.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
backend = "edge"
voice = "denise"
speed = 1.2
audio_format = "mp3"
chunk_size = 3000
skip_metadata = false
synthesis_timeout_secs = 120
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend, BackendKind::Edge);
        assert_eq!(config.voice, Some("denise".to_string()));
        assert_eq!(config.speed, 1.2);
        assert_eq!(config.audio_format, AudioFormat::Mp3);
        assert_eq!(config.chunk_size, 3000);
        assert!(!config.skip_metadata);
        assert_eq!(config.synthesis_timeout_secs, Some(120));
        assert_eq!(config.max_workers, 4);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_serialized_config_parses_back() {
        let mut config = AppConfig::default();
        config.set("voice", "tom").unwrap();
        config.set("synthesis_timeout_secs", "90").unwrap();

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_set() {
        let mut config = AppConfig::default();
        config.set("backend", "huggingface").unwrap();
        config.set("format", "mp3").unwrap();
        config.set("combine", "true").unwrap();
        config.set("device", "cpu").unwrap();
        config.set("device", "none").unwrap();

        assert_eq!(config.backend, BackendKind::Huggingface);
        assert_eq!(config.audio_format, AudioFormat::Mp3);
        assert!(config.combine);
        assert!(config.device.is_none());

        assert!(config.set("speed", "fast").is_err());
        assert!(config.set("colour", "blue").is_err());
    }

    #[test]
    fn test_resolve_defaults() {
        let run = AppConfig::default().resolve(overrides()).unwrap();

        assert_eq!(run.voice, "upmc");
        assert_eq!(run.classify, ClassifyOptions::default());
        assert!(run.expand_abbreviations);
        assert!(run.synthesis_timeout.is_none());
        assert_eq!(run.tts_options().speed, 1.0);
    }

    #[test]
    fn test_resolve_overrides() {
        let run = AppConfig::default()
            .resolve(RunOverrides {
                min_words: Some(20),
                keep_metadata: true,
                combine: true,
                max_workers: Some(0),
                timeout_secs: Some(30),
                ..overrides()
            })
            .unwrap();

        assert_eq!(run.classify.min_words, 20);
        assert!(!run.classify.skip_metadata);
        assert!(run.combine);
        assert_eq!(run.max_workers, 1);
        assert_eq!(run.synthesis_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_switching_backend_picks_its_default_voice() {
        let mut config = AppConfig::default();
        config.voice = Some("tom".to_string());

        let run = config
            .resolve(RunOverrides {
                backend: Some(BackendKind::Edge),
                ..overrides()
            })
            .unwrap();
        assert_eq!(run.voice, "henri");

        let run = config.resolve(overrides()).unwrap();
        assert_eq!(run.voice, "tom");
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        let config = AppConfig::default();
        assert!(
            config
                .resolve(RunOverrides {
                    speed: Some(3.0),
                    ..overrides()
                })
                .is_err()
        );
        assert!(
            config
                .resolve(RunOverrides {
                    chunk_size: Some(0),
                    ..overrides()
                })
                .is_err()
        );
    }
}
