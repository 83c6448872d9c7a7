//! TTS backend trait and types.

pub mod edge;
pub mod huggingface;
#[cfg(test)]
pub mod mock;
pub mod piper;
pub mod voices;

use crate::config::RunConfig;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Which synthesis engine drives a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Piper binary with ONNX voice models
    Piper,
    /// Microsoft Edge neural voices through the `edge-tts` client
    Edge,
    /// HuggingFace VITS model run through embedded Python
    Huggingface,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Piper => "piper",
            BackendKind::Edge => "edge",
            BackendKind::Huggingface => "huggingface",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "piper" => Ok(BackendKind::Piper),
            "edge" => Ok(BackendKind::Edge),
            "huggingface" | "hf" => Ok(BackendKind::Huggingface),
            other => anyhow::bail!("Unknown backend '{}' (piper, edge, huggingface)", other),
        }
    }
}

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Options for one synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct TtsOptions {
    /// Speaking rate, 1.0 is the voice's natural pace (0.5-2.0)
    pub speed: f32,
}

impl Default for TtsOptions {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

impl TtsOptions {
    /// Create new TTS options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the speaking rate.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self
    }
}

/// TTS backend trait - all TTS engines implement this.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Extension of the files `synthesize` writes ("wav", "mp3").
    fn output_extension(&self) -> &'static str;

    /// Synthesize text to an audio file.
    ///
    /// Errors carry the engine's own message unchanged.
    async fn synthesize(
        &self,
        text: &str,
        output_path: &Path,
        options: &TtsOptions,
    ) -> Result<()>;
}

/// Create the backend selected by the run configuration.
///
/// Construction checks that the engine is usable (binary found, voice model
/// present, Python modules importable) so a broken setup fails the run
/// before any document is touched.
pub fn create_backend(config: &RunConfig) -> Result<Arc<dyn TtsBackend>> {
    let backend: Arc<dyn TtsBackend> = match config.backend {
        BackendKind::Piper => Arc::new(piper::PiperBackend::new(
            &config.voice,
            &config.voices_dir,
            config.piper_binary.as_deref(),
        )?),
        BackendKind::Edge => Arc::new(edge::EdgeBackend::new(&config.voice)?),
        BackendKind::Huggingface => Arc::new(huggingface::HuggingFaceBackend::new(
            &config.voice,
            config.device.as_deref(),
            config.python_venv.as_deref(),
        )?),
    };

    log::info!("Using {} backend, voice {}", backend.name(), config.voice);
    Ok(backend)
}

/// Format a speed multiplier as a signed percentage rate ("+25%", "-10%").
pub fn rate_percent(speed: f32) -> String {
    let percent = ((speed - 1.0) * 100.0).round() as i32;
    if percent >= 0 {
        format!("+{}%", percent)
    } else {
        format!("{}%", percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tts_options_default() {
        let opts = TtsOptions::default();
        assert_eq!(opts.speed, 1.0);
    }

    #[test]
    fn test_tts_options_clamping() {
        assert_eq!(TtsOptions::new().with_speed(10.0).speed, 2.0);
        assert_eq!(TtsOptions::new().with_speed(0.1).speed, 0.5);
        assert_eq!(TtsOptions::new().with_speed(1.25).speed, 1.25);
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("Piper".parse::<BackendKind>().unwrap(), BackendKind::Piper);
        assert_eq!("hf".parse::<BackendKind>().unwrap(), BackendKind::Huggingface);
        assert!("espeak".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Edge.to_string(), "edge");
    }

    #[test]
    fn test_rate_percent() {
        assert_eq!(rate_percent(1.0), "+0%");
        assert_eq!(rate_percent(1.25), "+25%");
        assert_eq!(rate_percent(0.8), "-20%");
        assert_eq!(rate_percent(2.0), "+100%");
    }
}
