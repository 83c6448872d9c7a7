//! Audio file assembly using FFmpeg.

use super::{AudioAssembler, AudioFormat};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Sample rate every segment is resampled to before joining.
pub const OUTPUT_SAMPLE_RATE: u32 = 22050;

/// Assembler backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    format: AudioFormat,
    bitrate: String,
}

impl FfmpegAssembler {
    /// Locate ffmpeg/ffprobe on `$PATH`; fails if either is missing.
    pub fn new(format: AudioFormat, bitrate: impl Into<String>) -> Result<Self> {
        let ffmpeg = which::which("ffmpeg")
            .context("ffmpeg not found in PATH; install FFmpeg to assemble audio")?;
        let ffprobe = which::which("ffprobe")
            .context("ffprobe not found in PATH; install FFmpeg to assemble audio")?;

        Ok(Self {
            ffmpeg,
            ffprobe,
            format,
            bitrate: bitrate.into(),
        })
    }

    fn codec_args(&self) -> Vec<String> {
        match self.format {
            AudioFormat::Wav => vec!["-c:a".into(), "pcm_s16le".into()],
            AudioFormat::Mp3 => vec![
                "-c:a".into(),
                "libmp3lame".into(),
                "-b:a".into(),
                self.bitrate.clone(),
            ],
        }
    }

    fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"]);
        cmd
    }
}

/// Build the filter graph joining `count` inputs with `gap_ms` of silence
/// after every input but the last.
///
/// Each input is normalised to mono 16-bit at [`OUTPUT_SAMPLE_RATE`] so
/// segments from different engines can be joined.
pub fn concat_filter(count: usize, gap_ms: u64) -> String {
    let mut graph = String::new();

    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:a]aresample={rate},aformat=sample_fmts=s16:channel_layouts=mono",
            rate = OUTPUT_SAMPLE_RATE
        ));
        if gap_ms > 0 && i + 1 < count {
            graph.push_str(&format!(",apad=pad_dur={:.3}", gap_ms as f64 / 1000.0));
        }
        graph.push_str(&format!("[a{i}];"));
    }

    for i in 0..count {
        graph.push_str(&format!("[a{i}]"));
    }
    graph.push_str(&format!("concat=n={count}:v=0:a=1[out]"));

    graph
}

fn check_output(output: Output, what: &str) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} failed: {}", what, stderr.trim());
    }
    Ok(output)
}

impl AudioAssembler for FfmpegAssembler {
    fn concat(&self, segments: &[PathBuf], gap_ms: u64, output_path: &Path) -> Result<()> {
        if segments.is_empty() {
            anyhow::bail!("No audio files provided");
        }

        let mut cmd = self.ffmpeg_command();
        for segment in segments {
            cmd.arg("-i").arg(segment);
        }
        cmd.arg("-filter_complex")
            .arg(concat_filter(segments.len(), gap_ms))
            .args(["-map", "[out]"])
            .args(self.codec_args())
            .arg(output_path);

        log::debug!(
            "Joining {} segments into {}",
            segments.len(),
            output_path.display()
        );
        let output = cmd.output().context("Failed to run ffmpeg")?;
        check_output(output, "ffmpeg concat")?;
        Ok(())
    }

    fn duration_ms(&self, audio_path: &Path) -> Result<u64> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(audio_path)
            .output()
            .context("Failed to run ffprobe")?;
        let output = check_output(output, "ffprobe")?;

        let duration_secs: f64 = String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .context("Failed to parse duration")?;

        Ok((duration_secs * 1000.0).round() as u64)
    }

    fn apply_metadata(&self, input: &Path, metadata_file: &Path, output_path: &Path) -> Result<()> {
        let output = self
            .ffmpeg_command()
            .arg("-i")
            .arg(input)
            .arg("-i")
            .arg(metadata_file)
            .args(["-map", "0:a", "-map_metadata", "1", "-c", "copy"])
            .arg(output_path)
            .output()
            .context("Failed to run ffmpeg")?;
        check_output(output, "ffmpeg metadata")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_filter_pads_all_but_last() {
        let graph = concat_filter(3, 500);

        assert_eq!(graph.matches("apad=pad_dur=0.500").count(), 2);
        assert!(graph.contains("[2:a]aresample=22050,aformat=sample_fmts=s16:channel_layouts=mono[a2];"));
        assert!(graph.ends_with("[a0][a1][a2]concat=n=3:v=0:a=1[out]"));
    }

    #[test]
    fn test_concat_filter_without_gap() {
        let graph = concat_filter(1, 0);
        assert!(!graph.contains("apad"));
        assert!(graph.ends_with("[a0]concat=n=1:v=0:a=1[out]"));
    }

    #[test]
    fn test_codec_args() {
        let assembler = FfmpegAssembler {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            format: AudioFormat::Mp3,
            bitrate: "192k".to_string(),
        };
        assert_eq!(assembler.codec_args(), vec!["-c:a", "libmp3lame", "-b:a", "192k"]);
    }
}
