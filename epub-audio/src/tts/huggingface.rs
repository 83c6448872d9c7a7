//! HuggingFace VITS backend using PyO3 to embed Python.
//!
//! Loads a `transformers` VitsModel and its tokenizer once, then runs every
//! synthesis call on the blocking pool while holding the GIL. The Python
//! environment needs `torch`, `transformers` and `scipy`.

use super::voices::resolve_hf_model;
use super::{TtsBackend, TtsOptions};
use anyhow::{Context, Result};
use async_trait::async_trait;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

/// Initialize Python runtime once.
static PYTHON_INIT: Once = Once::new();

/// Python modules the backend imports.
const REQUIRED_MODULES: &[&str] = &["torch", "transformers", "scipy.io.wavfile"];

/// Tokenizer and model kept alive across calls.
struct LoadedModel {
    tokenizer: Py<PyAny>,
    model: Py<PyAny>,
    device: String,
}

pub struct HuggingFaceBackend {
    model_id: String,
    loaded: Arc<LoadedModel>,
}

impl HuggingFaceBackend {
    /// Load the model (a short name or a hub id).
    ///
    /// Missing modules or an unloadable model fail here, before any chapter
    /// is processed.
    pub fn new(model: &str, device: Option<&str>, venv: Option<&Path>) -> Result<Self> {
        init_python(venv);

        let model_id = resolve_hf_model(model);
        log::info!("Loading model {}...", model_id);

        let loaded = Python::with_gil(|py| -> Result<LoadedModel> {
            for module in REQUIRED_MODULES {
                py.import(*module).with_context(|| {
                    format!(
                        "Python module '{}' is not available; install torch, transformers and scipy",
                        module
                    )
                })?;
            }

            let device = match device {
                Some(d) => d.to_string(),
                None => detect_device(py)?,
            };

            let transformers = py.import("transformers")?;
            let tokenizer = transformers
                .getattr("VitsTokenizer")?
                .call_method1("from_pretrained", (model_id.as_str(),))
                .with_context(|| format!("Failed to load tokenizer for {}", model_id))?;
            let model = transformers
                .getattr("VitsModel")?
                .call_method1("from_pretrained", (model_id.as_str(),))
                .with_context(|| format!("Failed to load model {}", model_id))?
                .call_method1("to", (device.as_str(),))?;
            model.call_method0("eval")?;

            Ok(LoadedModel {
                tokenizer: tokenizer.unbind(),
                model: model.unbind(),
                device,
            })
        })?;

        log::info!("Model loaded on {}", loaded.device);
        Ok(Self {
            model_id,
            loaded: Arc::new(loaded),
        })
    }
}

/// Start the interpreter, adding a virtualenv's site-packages to `sys.path`.
fn init_python(venv: Option<&Path>) {
    let site_packages = venv.and_then(find_site_packages);

    PYTHON_INIT.call_once(|| {
        pyo3::prepare_freethreaded_python();

        if let Some(site_packages) = site_packages {
            let inserted = Python::with_gil(|py| -> PyResult<()> {
                let path = py.import("sys")?.getattr("path")?;
                path.call_method1("insert", (0, site_packages.to_string_lossy().as_ref()))?;
                Ok(())
            });
            if let Err(e) = inserted {
                log::warn!("Could not add {} to sys.path: {}", site_packages.display(), e);
            }
        }
    });
}

/// `<venv>/lib/python3.X/site-packages`, whichever Python version it holds.
fn find_site_packages(venv: &Path) -> Option<PathBuf> {
    std::fs::read_dir(venv.join("lib"))
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("python"))
        .map(|entry| entry.path().join("site-packages"))
        .find(|path| path.is_dir())
}

/// Auto-detect the best available device.
fn detect_device(py: Python<'_>) -> Result<String> {
    let torch = py.import("torch").context("Failed to import torch")?;

    if torch
        .getattr("cuda")?
        .call_method0("is_available")?
        .extract::<bool>()?
    {
        return Ok("cuda".to_string());
    }

    let mps = torch.getattr("backends")?.getattr("mps")?;
    if mps.call_method0("is_available")?.extract::<bool>()? {
        return Ok("mps".to_string());
    }

    Ok("cpu".to_string())
}

fn generate_wav(
    loaded: &LoadedModel,
    text: &str,
    output_path: &Path,
    speed: f32,
) -> PyResult<()> {
    Python::with_gil(|py| {
        let torch = py.import("torch")?;
        let model = loaded.model.bind(py);
        let tokenizer = loaded.tokenizer.bind(py);

        model.setattr("speaking_rate", speed)?;

        let tokenizer_kwargs = PyDict::new(py);
        tokenizer_kwargs.set_item("return_tensors", "pt")?;
        let inputs = tokenizer
            .call((text,), Some(&tokenizer_kwargs))?
            .call_method1("to", (loaded.device.as_str(),))?;

        // BatchEncoding is a mapping but not a dict; model(**inputs) needs one.
        let inputs = py
            .import("builtins")?
            .getattr("dict")?
            .call1((inputs,))?
            .downcast_into::<PyDict>()?;

        let no_grad = torch.call_method0("no_grad")?;
        no_grad.call_method0("__enter__")?;
        let forward = model.call((), Some(&inputs));
        no_grad.call_method1("__exit__", (py.None(), py.None(), py.None()))?;

        let waveform = forward?
            .getattr("waveform")?
            .call_method0("squeeze")?
            .call_method0("cpu")?
            .call_method0("numpy")?;
        let sample_rate: u32 = model
            .getattr("config")?
            .getattr("sampling_rate")?
            .extract()?;

        py.import("scipy.io.wavfile")?.call_method1(
            "write",
            (output_path.to_string_lossy().as_ref(), sample_rate, waveform),
        )?;

        py.import("gc")?.call_method0("collect")?;
        Ok(())
    })
}

#[async_trait]
impl TtsBackend for HuggingFaceBackend {
    fn name(&self) -> &str {
        "huggingface"
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
        let text = text.to_string();
        let output_path = output_path.to_path_buf();
        let speed = options.speed;
        let loaded = Arc::clone(&self.loaded);

        log::debug!("{}: synthesizing {} chars", self.model_id, text.chars().count());

        tokio::task::spawn_blocking(move || generate_wav(&loaded, &text, &output_path, speed))
            .await
            .context("Task join error")?
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_site_packages() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_site_packages(dir.path()).is_none());

        let site = dir.path().join("lib").join("python3.12").join("site-packages");
        std::fs::create_dir_all(&site).unwrap();
        assert_eq!(find_site_packages(dir.path()), Some(site));
    }
}
