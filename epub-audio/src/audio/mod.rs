//! Audio assembly: joining synthesized segments and tagging combined books.

pub mod assembler;
pub mod metadata;
#[cfg(test)]
pub mod mock;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use assembler::FfmpegAssembler;

/// Silence inserted between the chunks of one chapter.
pub const CHUNK_GAP_MS: u64 = 500;

/// Silence inserted between chapters in a combined file.
pub const CHAPTER_GAP_MS: u64 = 1000;

/// Sibling path an output is assembled into before being renamed into place.
///
/// `book_ch001.wav` becomes `book_ch001.part.wav`: the real extension stays
/// last so FFmpeg still picks the muxer from it.
pub fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match output.extension() {
        Some(ext) => format!("{}.part.{}", stem, ext.to_string_lossy()),
        None => format!("{}.part", stem),
    };
    output.with_file_name(name)
}

/// Container/codec of the files a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            other => anyhow::bail!("Unknown audio format '{}' (wav, mp3)", other),
        }
    }
}

/// Joins audio segments into finished files.
///
/// Calls block; async callers run them on the blocking pool.
pub trait AudioAssembler: Send + Sync {
    /// Concatenate `segments` in order with `gap_ms` of silence between
    /// consecutive segments, encoding the result to `output`.
    fn concat(&self, segments: &[PathBuf], gap_ms: u64, output: &Path) -> Result<()>;

    /// Re-encode a single file to the output format.
    fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        self.concat(&[input.to_path_buf()], 0, output)
    }

    /// Duration of an audio file in milliseconds.
    fn duration_ms(&self, path: &Path) -> Result<u64>;

    /// Copy `input` to `output` with an FFMETADATA file applied.
    fn apply_metadata(&self, input: &Path, metadata_file: &Path, output: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_output_path() {
        assert_eq!(
            partial_output_path(Path::new("out/book_ch001_Un.wav")),
            PathBuf::from("out/book_ch001_Un.part.wav")
        );
        assert_eq!(
            partial_output_path(Path::new("book_full")),
            PathBuf::from("book_full.part")
        );
    }

    #[test]
    fn test_audio_format() {
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("ogg".parse::<AudioFormat>().is_err());
    }
}
