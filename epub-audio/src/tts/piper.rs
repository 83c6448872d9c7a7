//! Piper TTS backend driving the local `piper` binary.
//!
//! Text goes in on stdin, a WAV file comes out at `--output_file`.

use super::voices::{ResolvedPiperVoice, resolve_piper_voice};
use super::{TtsBackend, TtsOptions};
use crate::bootstrap::piper::find_piper;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct PiperBackend {
    binary: PathBuf,
    voice: ResolvedPiperVoice,
}

impl PiperBackend {
    /// Locate the binary and the voice model; either missing is an error.
    pub fn new(voice: &str, voices_dir: &Path, binary: Option<&Path>) -> Result<Self> {
        let binary = find_piper(binary)?;
        let voice = resolve_piper_voice(voice, voices_dir)?;

        log::debug!(
            "Piper binary {}, model {}",
            binary.display(),
            voice.model.display()
        );
        Ok(Self { binary, voice })
    }

    fn command_args(&self, output_path: &Path, options: &TtsOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--model".into(), self.voice.model.clone().into()];
        if let Some(config) = &self.voice.config {
            args.push("--config".into());
            args.push(config.clone().into());
        }
        // Piper's length scale is a duration factor: faster speech is a smaller scale.
        args.push("--length-scale".into());
        args.push(format!("{:.3}", 1.0 / options.speed).into());
        args.push("--output_file".into());
        args.push(output_path.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl TtsBackend for PiperBackend {
    fn name(&self) -> &str {
        "piper"
    }

    fn output_extension(&self) -> &'static str {
        "wav"
    }

    async fn synthesize(
        &self,
        text: &str,
        output_path: &Path,
        options: &TtsOptions,
    ) -> Result<()> {
        let mut child = Command::new(&self.binary)
            .args(self.command_args(output_path, options))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.binary.display()))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A write error means piper exited early; its stderr says why.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                log::debug!("piper closed stdin early: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for piper")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("piper failed ({}): {}", output.status, stderr.trim());
        }
        if !output_path.exists() {
            anyhow::bail!("piper produced no output at {}", output_path.display());
        }

        Ok(())
    }
}
