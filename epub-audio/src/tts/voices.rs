//! Voice catalogue: short names for the voices each backend ships with.

use super::BackendKind;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// A Piper voice published in the rhasspy/piper-voices repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PiperVoice {
    pub name: &'static str,
    pub quality: &'static str,
    pub description: &'static str,
}

pub const PIPER_VOICES: &[PiperVoice] = &[
    PiperVoice {
        name: "upmc",
        quality: "medium",
        description: "Female voice, clear diction",
    },
    PiperVoice {
        name: "siwis",
        quality: "medium",
        description: "Female voice, expressive",
    },
    PiperVoice {
        name: "tom",
        quality: "medium",
        description: "Male voice",
    },
    PiperVoice {
        name: "gilles",
        quality: "low",
        description: "Male voice, low quality model",
    },
    PiperVoice {
        name: "mls",
        quality: "medium",
        description: "Multi-speaker French model",
    },
];

/// Edge neural voices, short name to service voice id.
pub const EDGE_VOICES: &[(&str, &str)] = &[
    ("henri", "fr-FR-HenriNeural"),
    ("denise", "fr-FR-DeniseNeural"),
    ("brigitte", "fr-FR-BrigitteNeural"),
    ("alain", "fr-FR-AlainNeural"),
    ("claude", "fr-FR-ClaudeNeural"),
    ("celine", "fr-FR-CelineNeural"),
];

/// HuggingFace VITS models, short name to hub id.
pub const HF_MODELS: &[(&str, &str)] = &[
    ("mms-fra", "facebook/mms-tts-fra"),
    ("vits-fr", "facebook/mms-tts-fra"),
];

/// Voice used when none is configured.
pub fn default_voice(backend: BackendKind) -> &'static str {
    match backend {
        BackendKind::Piper => "upmc",
        BackendKind::Edge => "henri",
        BackendKind::Huggingface => "mms-fra",
    }
}

impl PiperVoice {
    /// Find a catalogue voice by short name.
    pub fn find(name: &str) -> Option<&'static PiperVoice> {
        PIPER_VOICES.iter().find(|v| v.name == name)
    }

    /// Model file name, e.g. `fr_FR-upmc-medium.onnx`.
    pub fn model_file_name(&self) -> String {
        format!("fr_FR-{}-{}.onnx", self.name, self.quality)
    }

    /// Path of the model below a voices directory.
    pub fn model_path(&self, voices_dir: &Path) -> PathBuf {
        voices_dir
            .join("fr_FR")
            .join(self.name)
            .join(self.quality)
            .join(self.model_file_name())
    }

    /// Download URL of the model; the sidecar config is the same URL plus `.json`.
    pub fn model_url(&self) -> String {
        format!(
            "https://huggingface.co/rhasspy/piper-voices/resolve/main/fr/fr_FR/{}/{}/{}",
            self.name,
            self.quality,
            self.model_file_name()
        )
    }
}

/// Sidecar config for a model: `voice.onnx` -> `voice.onnx.json`.
pub fn sidecar_path(model: &Path) -> PathBuf {
    let mut name = model.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// A Piper model located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPiperVoice {
    pub model: PathBuf,
    /// `None` when the sidecar is missing; synthesis runs without it.
    pub config: Option<PathBuf>,
}

/// Resolve a Piper voice given as a short name or a model path.
///
/// A missing model is an error; a missing sidecar config only warns.
pub fn resolve_piper_voice(voice: &str, voices_dir: &Path) -> Result<ResolvedPiperVoice> {
    let model = match PiperVoice::find(voice) {
        Some(v) => v.model_path(voices_dir),
        None => PathBuf::from(voice),
    };

    if !model.exists() {
        let known: Vec<&str> = PIPER_VOICES.iter().map(|v| v.name).collect();
        anyhow::bail!(
            "Voice model not found: {}\nKnown voices: {} (install with 'epub-audio voices download <name>')",
            model.display(),
            known.join(", ")
        );
    }

    let sidecar = sidecar_path(&model);
    let config = if sidecar.exists() {
        Some(sidecar)
    } else {
        log::warn!("Voice config not found: {}", sidecar.display());
        None
    };

    Ok(ResolvedPiperVoice { model, config })
}

/// Resolve an Edge voice given as a short name or a full `fr-` voice id.
pub fn resolve_edge_voice(voice: &str) -> Result<String> {
    if let Some((_, id)) = EDGE_VOICES.iter().find(|(name, _)| *name == voice) {
        return Ok(id.to_string());
    }
    if voice.starts_with("fr-") {
        return Ok(voice.to_string());
    }

    let known: Vec<&str> = EDGE_VOICES.iter().map(|(name, _)| *name).collect();
    anyhow::bail!(
        "Unknown Edge voice '{}'. Known voices: {}",
        voice,
        known.join(", ")
    )
}

/// Resolve a HuggingFace model given as a short name or a hub id.
pub fn resolve_hf_model(model: &str) -> String {
    HF_MODELS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, id)| id.to_string())
        .unwrap_or_else(|| model.to_string())
}
