//! Mock TTS backend for testing
//!
//! Writes the text it receives as the "audio" so assembled outputs can be
//! inspected, and can be told to fail, stall, or report its concurrency.

use super::{TtsBackend, TtsOptions};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct MockBackend {
    /// Fail any call whose text contains this marker
    fail_on: Option<String>,
    /// Message returned on failure
    fail_message: String,
    /// Per-call delay
    delay: Duration,
    call_count: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    /// Texts received, in call order
    texts: Mutex<Vec<String>>,
    /// Speeds received, in call order
    speeds: Mutex<Vec<f32>>,
}

impl MockBackend {
    /// Create a backend that always succeeds
    pub fn always_succeeds() -> Self {
        Self {
            fail_on: None,
            fail_message: String::new(),
            delay: Duration::ZERO,
            call_count: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            speeds: Mutex::new(Vec::new()),
        }
    }

    /// Create a backend that fails on texts containing `marker`
    pub fn fails_on(marker: &str, message: &str) -> Self {
        Self {
            fail_on: Some(marker.to_string()),
            fail_message: message.to_string(),
            ..Self::always_succeeds()
        }
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get the number of times synthesize() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn speeds(&self) -> Vec<f32> {
        self.speeds.lock().unwrap().clone()
    }
}

#[async_trait]
impl TtsBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
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
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        self.speeds.lock().unwrap().push(options.speed);

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                anyhow::bail!("{}", self.fail_message);
            }
        }

        tokio::fs::write(output_path, text.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds_writes_text() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::always_succeeds();
        let out = dir.path().join("a.wav");

        backend
            .synthesize("Bonjour.", &out, &TtsOptions::default())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "Bonjour.");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_fails_on_marker() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::fails_on("BOOM", "engine exploded");
        let out = dir.path().join("a.wav");

        let err = backend
            .synthesize("un BOOM", &out, &TtsOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "engine exploded");
        assert!(!out.exists());
    }
}
