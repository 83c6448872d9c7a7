//! Rendering one unit of text (a chapter) to a finished audio file.

use crate::audio::{AudioAssembler, CHUNK_GAP_MS, partial_output_path};
use crate::text::TextChunk;
use crate::tts::{TtsBackend, TtsOptions};
use anyhow::Context;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;

/// Why a unit could not be rendered. Messages from the engine or assembler
/// are kept verbatim.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("{unit}: nothing to synthesize")]
    Empty { unit: String },

    #[error("{unit}: could not create scratch directory: {message}")]
    Scratch { unit: String, message: String },

    #[error("{unit}: chunk {chunk}/{total} failed: {message}")]
    Chunk {
        unit: String,
        /// 1-based position of the failed chunk
        chunk: usize,
        total: usize,
        message: String,
    },

    #[error("{unit}: chunk {chunk}/{total} timed out after {limit:?}")]
    Timeout {
        unit: String,
        chunk: usize,
        total: usize,
        limit: Duration,
    },

    #[error("{unit}: assembling {output} failed: {message}")]
    Assembly {
        unit: String,
        output: String,
        message: String,
    },
}

/// Drives a backend over a unit's chunks and joins the results.
///
/// Chunks of one unit are synthesized strictly in order into a scoped
/// temporary directory; the first failure stops the unit and nothing is
/// retried. The directory is removed on every exit path, including when the
/// render future is dropped.
pub struct SynthesisDriver {
    backend: Arc<dyn TtsBackend>,
    assembler: Arc<dyn AudioAssembler>,
    options: TtsOptions,
    timeout: Option<Duration>,
    progress: Option<ProgressBar>,
}

impl SynthesisDriver {
    pub fn new(
        backend: Arc<dyn TtsBackend>,
        assembler: Arc<dyn AudioAssembler>,
        options: TtsOptions,
    ) -> Self {
        Self {
            backend,
            assembler,
            options,
            timeout: None,
            progress: None,
        }
    }

    /// Bound every synthesis call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Advance this bar once per synthesized chunk.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Synthesize `chunks` in order and write the joined audio to `output`.
    ///
    /// Consecutive chunks are separated by [`CHUNK_GAP_MS`] of silence. The
    /// audio is assembled next to `output` and renamed into place, so `output`
    /// only ever holds a complete file.
    pub async fn render(
        &self,
        unit: &str,
        chunks: &[TextChunk],
        output: &Path,
    ) -> Result<PathBuf, SynthesisError> {
        if chunks.is_empty() {
            return Err(SynthesisError::Empty {
                unit: unit.to_string(),
            });
        }

        let scratch = TempDir::new().map_err(|e| SynthesisError::Scratch {
            unit: unit.to_string(),
            message: e.to_string(),
        })?;

        let total = chunks.len();
        let mut segments = Vec::with_capacity(total);

        for (i, chunk) in chunks.iter().enumerate() {
            let segment = scratch.path().join(format!(
                "chunk_{:04}.{}",
                i,
                self.backend.output_extension()
            ));
            log::debug!(
                "{}: chunk {}/{} ({} chars)",
                unit,
                i + 1,
                total,
                chunk.size()
            );

            let call = self.backend.synthesize(&chunk.text, &segment, &self.options);
            let result = match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(SynthesisError::Timeout {
                            unit: unit.to_string(),
                            chunk: i + 1,
                            total,
                            limit,
                        });
                    }
                },
                None => call.await,
            };

            result.map_err(|e| SynthesisError::Chunk {
                unit: unit.to_string(),
                chunk: i + 1,
                total,
                message: format!("{:#}", e),
            })?;

            segments.push(segment);
            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        let assembler = Arc::clone(&self.assembler);
        let target = output.to_path_buf();
        let joined = tokio::task::spawn_blocking(move || {
            let partial = partial_output_path(&target);
            let result = match segments.as_slice() {
                [single] => assembler.transcode(single, &partial),
                _ => assembler.concat(&segments, CHUNK_GAP_MS, &partial),
            }
            .and_then(|()| {
                std::fs::rename(&partial, &target)
                    .with_context(|| format!("Failed to move output to {}", target.display()))
            });
            if result.is_err() {
                let _ = std::fs::remove_file(&partial);
            }
            result
        })
        .await;

        let assembly_error = |message: String| SynthesisError::Assembly {
            unit: unit.to_string(),
            output: output.display().to_string(),
            message,
        };
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(assembly_error(format!("{:#}", e))),
            Err(e) => return Err(assembly_error(e.to_string())),
        }

        drop(scratch);
        Ok(output.to_path_buf())
    }
}
