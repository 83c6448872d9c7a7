//! Streamed HTTP download with progress reporting and retry.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Download-related errors.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Download of {url} failed after {attempts} attempts: {message}")]
    Failed {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP error: {status} for {url}")]
    HttpError { status: u16, url: String },
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the attempt following one that waited `delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f32(
            (delay.as_secs_f32() * self.backoff_factor).min(self.max_delay.as_secs_f32()),
        )
    }
}

/// Download a file with progress bar display and the default retry policy.
pub async fn download_file(url: &str, destination: &Path, description: &str) -> Result<()> {
    download_file_with_retry(url, destination, description, &RetryConfig::default()).await
}

/// Download a file with progress bar and retry logic.
///
/// Data is streamed into `<destination>.part` and renamed once complete, so
/// an interrupted download never leaves a truncated file at `destination`.
/// A 4xx response is not retried.
pub async fn download_file_with_retry(
    url: &str,
    destination: &Path,
    description: &str,
    config: &RetryConfig,
) -> Result<()> {
    let partial = partial_path(destination);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match download_file_once(url, &partial, description).await {
            Ok(()) => {
                std::fs::rename(&partial, destination).with_context(|| {
                    format!("Failed to move download into {}", destination.display())
                })?;
                return Ok(());
            }
            Err(e) => {
                let _ = std::fs::remove_file(&partial);

                let client_error = matches!(
                    e.downcast_ref::<DownloadError>(),
                    Some(DownloadError::HttpError { status, .. }) if (400..500).contains(status)
                );
                if client_error || attempt >= config.max_attempts {
                    return Err(DownloadError::Failed {
                        url: url.to_string(),
                        attempts: attempt,
                        message: format!("{:#}", e),
                    }
                    .into());
                }

                log::warn!(
                    "Download failed (attempt {}/{}): {:#}; retrying in {:?}",
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name: OsString = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Perform a single download attempt.
async fn download_file_once(url: &str, destination: &Path, description: &str) -> Result<()> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(600))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to connect")?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::HttpError {
            status: status.as_u16(),
            url: url.to_string(),
        }
        .into());
    }

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {msg}\n  {bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
                    .progress_chars("=>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner().template("  {msg} {bytes} ({bytes_per_sec})")?,
            );
            pb
        }
    };
    pb.set_message(description.to_string());

    let mut file =
        std::fs::File::create(destination).context("Failed to create destination file")?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading response")?;
        file.write_all(&chunk).context("Failed to write to file")?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    pb.finish_and_clear();
    log::debug!("Downloaded {} ({})", url, format_bytes(downloaded));

    Ok(())
}

/// Format bytes for human-readable display.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(63 * 1024 * 1024), "63.0 MB");
        assert_eq!(format_bytes(1536 * 1024), "1.5 MB");
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        assert_eq!(config.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(config.next_delay(Duration::from_secs(20)), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/v/fr_FR-tom-medium.onnx")),
            PathBuf::from("/v/fr_FR-tom-medium.onnx.part")
        );
    }
}
