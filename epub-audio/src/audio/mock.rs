//! In-memory assembler for testing
//!
//! Segments are joined as text with a visible gap marker, and durations are
//! file sizes, so tests can assert on order and spacing without FFmpeg.

use super::AudioAssembler;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MemoryAssembler {
    fail_concat: bool,
    concat_calls: AtomicUsize,
    /// Paths concat was asked to write, in call order
    outputs: Mutex<Vec<PathBuf>>,
    /// Contents of the last metadata file applied
    metadata: Mutex<Option<String>>,
}

/// Separator written between joined segments.
pub fn gap_marker(gap_ms: u64) -> String {
    format!("|{}ms|", gap_ms)
}

impl MemoryAssembler {
    pub fn new() -> Self {
        Self {
            fail_concat: false,
            concat_calls: AtomicUsize::new(0),
            outputs: Mutex::new(Vec::new()),
            metadata: Mutex::new(None),
        }
    }

    /// An assembler whose concat always fails
    pub fn failing() -> Self {
        Self {
            fail_concat: true,
            ..Self::new()
        }
    }

    pub fn concat_calls(&self) -> usize {
        self.concat_calls.load(Ordering::SeqCst)
    }

    pub fn concat_outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().unwrap().clone()
    }

    pub fn applied_metadata(&self) -> Option<String> {
        self.metadata.lock().unwrap().clone()
    }
}

impl AudioAssembler for MemoryAssembler {
    fn concat(&self, segments: &[PathBuf], gap_ms: u64, output: &Path) -> Result<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        self.outputs.lock().unwrap().push(output.to_path_buf());
        if self.fail_concat {
            anyhow::bail!("ffmpeg concat failed: simulated");
        }
        if segments.is_empty() {
            anyhow::bail!("No audio files provided");
        }

        let parts = segments
            .iter()
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;
        std::fs::write(output, parts.join(&gap_marker(gap_ms)))?;
        Ok(())
    }

    fn duration_ms(&self, path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn apply_metadata(&self, input: &Path, metadata_file: &Path, output: &Path) -> Result<()> {
        *self.metadata.lock().unwrap() = Some(std::fs::read_to_string(metadata_file)?);
        std::fs::copy(input, output)?;
        Ok(())
    }
}
