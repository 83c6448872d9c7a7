//! Locating and installing the Piper binary.

use super::download::download_file;
use super::get_piper_dir;
use super::platform::Platform;
use super::versions::PIPER_RELEASE_TAG;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use tar::Archive;

/// System locations checked before the installed copy and `$PATH`.
const SYSTEM_CANDIDATES: &[&str] = &["/usr/local/bin/piper-bin", "/usr/local/bin/piper"];

/// Download URL of the pinned Piper release for a platform.
pub fn get_piper_download_url(platform: &Platform) -> String {
    format!(
        "https://github.com/rhasspy/piper/releases/download/{}/{}",
        PIPER_RELEASE_TAG,
        platform.piper_asset_name()
    )
}

/// Path of the binary inside an install directory (the archive unpacks to `piper/`).
pub fn installed_binary(piper_dir: &Path) -> PathBuf {
    piper_dir.join("piper").join("piper")
}

/// Find a usable Piper binary.
///
/// Order: the configured path, the system locations, the copy installed by
/// `epub-audio setup`, then `piper` on `$PATH`.
pub fn find_piper(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        anyhow::bail!("Configured Piper binary not found: {}", path.display());
    }

    let installed = get_piper_dir().ok().map(|dir| installed_binary(&dir));

    SYSTEM_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .chain(installed)
        .find(|p| p.is_file())
        .or_else(|| which::which("piper").ok())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Piper not found. Run 'epub-audio setup' to install it, or set piper_binary in the config"
            )
        })
}

/// Download and unpack the Piper release for this platform.
pub async fn install_piper(platform: &Platform) -> Result<PathBuf> {
    let piper_dir = get_piper_dir()?;
    let url = get_piper_download_url(platform);

    let temp_dir = tempfile::tempdir()?;
    let archive_path = temp_dir.path().join(platform.piper_asset_name());

    download_file(
        &url,
        &archive_path,
        &format!("Downloading Piper {}...", PIPER_RELEASE_TAG),
    )
    .await?;

    log::info!("Extracting Piper into {}", piper_dir.display());
    extract_tar_gz(&archive_path, &piper_dir)?;

    let binary = installed_binary(&piper_dir);
    if !binary.is_file() {
        anyhow::bail!(
            "Piper installation failed: executable not found at {}",
            binary.display()
        );
    }

    let output = std::process::Command::new(&binary)
        .arg("--help")
        .output()
        .context("Failed to run installed Piper")?;
    if !output.status.success() {
        anyhow::bail!(
            "Piper installation verification failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(binary)
}

/// Extract a .tar.gz archive.
fn extract_tar_gz(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));

    std::fs::create_dir_all(destination)?;
    archive
        .unpack(destination)
        .context("Failed to extract tar.gz archive")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::platform::{Arch, Os};
    use flate2::Compression;
    use flate2::write::GzEncoder;

    #[test]
    fn test_piper_download_url() {
        let platform = Platform {
            os: Os::Linux,
            arch: Arch::Aarch64,
        };
        assert_eq!(
            get_piper_download_url(&platform),
            "https://github.com/rhasspy/piper/releases/download/2023.11.14-2/piper_linux_aarch64.tar.gz"
        );
    }

    #[test]
    fn test_configured_binary_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("piper");
        assert!(find_piper(Some(&missing)).is_err());

        std::fs::write(&missing, b"#!/bin/sh\n").unwrap();
        assert_eq!(find_piper(Some(&missing)).unwrap(), missing);
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("piper.tar.gz");

        {
            let file = std::fs::File::create(&archive_path).unwrap();
            let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
            let data = b"binary";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "piper/piper", &data[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let target = dir.path().join("out");
        extract_tar_gz(&archive_path, &target).unwrap();
        assert!(installed_binary(&target).is_file());
    }
}
