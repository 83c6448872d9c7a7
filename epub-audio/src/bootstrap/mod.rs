//! Bootstrap module for the Piper engine and its voice models.
//!
//! Everything lives under the user data directory
//! (`~/.local/share/epub-audio/` on Linux):
//! - `piper/` holds the unpacked Piper release
//! - `voices/fr_FR/<name>/<quality>/` holds downloaded voice models
//! - `versions.json` records what was installed and when

pub mod download;
pub mod piper;
pub mod platform;
pub mod versions;
pub mod voices;

use crate::tts::voices::{PIPER_VOICES, PiperVoice};
use anyhow::Result;
use platform::Platform;
use std::path::{Path, PathBuf};
use versions::{InstalledVersions, PIPER_RELEASE_TAG};

/// Get the data directory for epub-audio, creating it if needed.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|d| d.join("epub-audio"))
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

    std::fs::create_dir_all(&data_dir)?;
    Ok(data_dir)
}

/// Get the Piper installation directory.
pub fn get_piper_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("piper"))
}

/// Default voices directory.
pub fn default_voices_dir() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("voices"))
}

/// Install Piper (unless a current copy is found) and a voice.
pub async fn run_setup(voice: &PiperVoice, voices_dir: &Path, force: bool) -> Result<()> {
    let platform = Platform::detect()?;
    let data_dir = get_data_dir()?;
    let mut installed = InstalledVersions::load(&data_dir)?;

    let piper_current = installed.is_piper_current()
        && installed.platform_matches(&platform.to_version_string())
        && piper::find_piper(None).is_ok();

    eprintln!();
    if piper_current && !force {
        eprintln!("[1/2] Piper {} already installed", PIPER_RELEASE_TAG);
    } else {
        eprintln!("[1/2] Installing Piper {} for {}...", PIPER_RELEASE_TAG, platform);
        let binary = piper::install_piper(&platform).await?;
        installed.set_piper(PIPER_RELEASE_TAG, &platform.to_version_string());
        installed.save(&data_dir)?;
        eprintln!("  Installed {}", binary.display());
    }

    eprintln!();
    eprintln!("[2/2] Installing voice {}...", voice.name);
    let model = voices::download_voice(voice, voices_dir, force).await?;
    installed.add_voice(voice.name);
    installed.save(&data_dir)?;
    eprintln!("  Installed {}", model.display());

    eprintln!();
    eprintln!("Setup complete!");
    Ok(())
}

/// Human-readable report of what is installed.
pub fn get_info(voices_dir: &Path) -> Result<String> {
    let platform = Platform::detect()?;
    let data_dir = get_data_dir()?;
    let installed = InstalledVersions::load(&data_dir)?;

    let mut info = String::new();
    info.push_str(&format!("Platform: {}\n", platform));
    info.push_str(&format!("Data directory: {}\n", data_dir.display()));
    info.push_str(&format!("Voices directory: {}\n\n", voices_dir.display()));

    match piper::find_piper(None) {
        Ok(path) => info.push_str(&format!("Piper: {}\n", path.display())),
        Err(_) => info.push_str("Piper: not installed\n"),
    }
    if let Some(release) = &installed.piper_release {
        info.push_str(&format!("Piper release: {}\n", release));
    }

    let ffmpeg = which::which("ffmpeg")
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "not found".to_string());
    info.push_str(&format!("FFmpeg: {}\n", ffmpeg));

    let edge = which::which("edge-tts")
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "not found".to_string());
    info.push_str(&format!("edge-tts: {}\n\n", edge));

    info.push_str("Piper voices:\n");
    for voice in PIPER_VOICES {
        let mark = if voices::is_voice_installed(voice, voices_dir) {
            "installed"
        } else {
            "missing"
        };
        info.push_str(&format!("  {:<8} {:<7} {}\n", voice.name, voice.quality, mark));
    }

    if let Some(at) = installed.installed_at {
        info.push_str(&format!("\nLast install: {}\n", at.format("%Y-%m-%d %H:%M UTC")));
    }

    Ok(info)
}
