use async_trait::async_trait;
use mnemos_rs_memory::{EmbeddingProvider, MemoryError};
use parking_lot::Mutex;
use std::time::Duration;

pub const KEYWORDS: [&str; 8] = [
    "rust", "python", "database", "memory", "search", "network", "cooking", "music",
];

/// One dimension per keyword, 1.0 when the text mentions it.
pub fn keyword_embedding(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .map(|keyword| if lower.contains(keyword) { 1.0 } else { 0.0 })
        .collect()
}

/// Deterministic 8-dimension embedder keyed on [`KEYWORDS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        Ok(keyword_embedding(text))
    }

    fn model_name(&self) -> &str {
        "keyword-mock"
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }
}

#[derive(Debug, Clone)]
enum Fault {
    Fail,
    Hang,
    Delay(Duration),
    WrongDimensions(usize),
}

/// Keyword embedder that misbehaves on texts containing a marker.
#[derive(Debug, Default)]
pub struct FlakyEmbedder {
    faults: Vec<(String, Fault)>,
    calls: Mutex<Vec<String>>,
}

impl FlakyEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return an error for texts containing `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.faults.push((marker.into(), Fault::Fail));
        self
    }

    /// Never answer for texts containing `marker`.
    pub fn hanging_on(mut self, marker: impl Into<String>) -> Self {
        self.faults.push((marker.into(), Fault::Hang));
        self
    }

    /// Answer late for texts containing `marker`.
    pub fn delaying(mut self, marker: impl Into<String>, delay: Duration) -> Self {
        self.faults.push((marker.into(), Fault::Delay(delay)));
        self
    }

    /// Return a vector of the wrong length for texts containing `marker`.
    pub fn wrong_dimensions_on(mut self, marker: impl Into<String>, dims: usize) -> Self {
        self.faults.push((marker.into(), Fault::WrongDimensions(dims)));
        self
    }

    /// Texts passed to `embed`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn fault_for(&self, text: &str) -> Option<Fault> {
        self.faults
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, fault)| fault.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        self.calls.lock().push(text.to_string());
        match self.fault_for(text) {
            None => Ok(keyword_embedding(text)),
            Some(Fault::Fail) => Err(MemoryError::embedding("injected embedding failure")),
            Some(Fault::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(keyword_embedding(text))
            }
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(keyword_embedding(text))
            }
            Some(Fault::WrongDimensions(dims)) => Ok(vec![0.0; dims]),
        }
    }

    fn model_name(&self) -> &str {
        "flaky-mock"
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }
}
