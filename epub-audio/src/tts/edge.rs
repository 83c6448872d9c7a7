//! Edge neural voices through the `edge-tts` command-line client.

use super::voices::resolve_edge_voice;
use super::{TtsBackend, TtsOptions, rate_percent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub struct EdgeBackend {
    binary: PathBuf,
    /// Service voice id, e.g. "fr-FR-HenriNeural"
    voice: String,
}

impl EdgeBackend {
    pub fn new(voice: &str) -> Result<Self> {
        let voice = resolve_edge_voice(voice)?;
        let binary = which::which("edge-tts")
            .context("edge-tts not found in PATH (install it with 'pip install edge-tts')")?;

        Ok(Self { binary, voice })
    }

    fn command_args(&self, text_file: &Path, output_path: &Path, options: &TtsOptions) -> Vec<OsString> {
        vec![
            "--voice".into(),
            self.voice.clone().into(),
            format!("--rate={}", rate_percent(options.speed)).into(),
            "--file".into(),
            text_file.as_os_str().to_os_string(),
            "--write-media".into(),
            output_path.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl TtsBackend for EdgeBackend {
    fn name(&self) -> &str {
        "edge"
    }

    fn output_extension(&self) -> &'static str {
        "mp3"
    }

    async fn synthesize(
        &self,
        text: &str,
        output_path: &Path,
        options: &TtsOptions,
    ) -> Result<()> {
        // Text goes through a file; chunks can exceed argument length limits.
        let text_file = output_path.with_extension("txt");
        tokio::fs::write(&text_file, text)
            .await
            .with_context(|| format!("Failed to write {}", text_file.display()))?;

        let result = Command::new(&self.binary)
            .args(self.command_args(&text_file, output_path, options))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;
        let _ = tokio::fs::remove_file(&text_file).await;

        let output = result.with_context(|| format!("Failed to start {}", self.binary.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("edge-tts failed ({}): {}", output.status, stderr.trim());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        let backend = EdgeBackend {
            binary: PathBuf::from("edge-tts"),
            voice: "fr-FR-DeniseNeural".to_string(),
        };
        let args = backend.command_args(
            Path::new("/tmp/c.txt"),
            Path::new("/tmp/c.mp3"),
            &TtsOptions::new().with_speed(0.9),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            vec![
                "--voice",
                "fr-FR-DeniseNeural",
                "--rate=-10%",
                "--file",
                "/tmp/c.txt",
                "--write-media",
                "/tmp/c.mp3",
            ]
        );
    }

    #[test]
    fn test_unknown_voice_rejected_before_lookup() {
        let err = EdgeBackend::new("nobody").err().unwrap();
        assert!(err.to_string().contains("Unknown Edge voice"));
    }
}
