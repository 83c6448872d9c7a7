//! Piper voice model downloads.

use super::download::download_file;
use crate::tts::voices::{PiperVoice, sidecar_path};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Whether a catalogue voice's model is present under `voices_dir`.
pub fn is_voice_installed(voice: &PiperVoice, voices_dir: &Path) -> bool {
    voice.model_path(voices_dir).is_file()
}

/// Download a catalogue voice (model and sidecar config).
///
/// Files already present are kept unless `force` is set. Returns the model path.
pub async fn download_voice(voice: &PiperVoice, voices_dir: &Path, force: bool) -> Result<PathBuf> {
    let model = voice.model_path(voices_dir);
    let model_url = voice.model_url();
    let config = sidecar_path(&model);
    let config_url = format!("{}.json", model_url);

    if force || !model.is_file() {
        download_file(
            &model_url,
            &model,
            &format!("Downloading voice {} ({})...", voice.name, voice.quality),
        )
        .await?;
    } else {
        log::info!("Voice model already present: {}", model.display());
    }

    if force || !config.is_file() {
        download_file(&config_url, &config, &format!("Downloading {} config...", voice.name))
            .await?;
    }

    Ok(model)
}
