//! Pinned versions and install tracking for downloaded components.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Piper release the installer downloads.
/// From: https://github.com/rhasspy/piper/releases
pub const PIPER_RELEASE_TAG: &str = "2023.11.14-2";

/// What has been installed under the data directory (persisted to versions.json).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstalledVersions {
    /// Piper release tag (e.g., "2023.11.14-2").
    pub piper_release: Option<String>,

    /// Platform string when Piper was installed (e.g., "Linux-x86_64").
    pub platform: Option<String>,

    /// Voice short names downloaded through the catalogue.
    #[serde(default)]
    pub voices: Vec<String>,

    /// When the last installation occurred.
    pub installed_at: Option<DateTime<Utc>>,
}

impl InstalledVersions {
    /// Load from `<data_dir>/versions.json`, defaulting when absent.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let versions_file = data_dir.join("versions.json");

        if !versions_file.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&versions_file).context("Failed to read versions.json")?;

        serde_json::from_str(&content).context("Failed to parse versions.json")
    }

    /// Save to `<data_dir>/versions.json`.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(data_dir.join("versions.json"), content)
            .context("Failed to write versions.json")
    }

    /// Whether the installed Piper is the pinned release.
    pub fn is_piper_current(&self) -> bool {
        self.piper_release.as_deref() == Some(PIPER_RELEASE_TAG)
    }

    /// Check if the platform has changed (e.g., Intel to Apple Silicon).
    pub fn platform_matches(&self, current_platform: &str) -> bool {
        self.platform.as_deref() == Some(current_platform)
    }

    /// Record a Piper installation.
    pub fn set_piper(&mut self, release: &str, platform: &str) {
        self.piper_release = Some(release.to_string());
        self.platform = Some(platform.to_string());
        self.installed_at = Some(Utc::now());
    }

    /// Record a downloaded voice (idempotent).
    pub fn add_voice(&mut self, name: &str) {
        if !self.voices.iter().any(|v| v == name) {
            self.voices.push(name.to_string());
        }
        self.installed_at = Some(Utc::now());
    }
}
