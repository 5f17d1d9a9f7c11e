//! Embedding provider interface and the OpenAI-compatible HTTP client.

use crate::error::MemoryError;
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maps text to a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Length of every returned vector.
    fn dimensions(&self) -> usize;
}

/// Run `embed` under `timeout`, surfacing expiry as a retryable error.
pub(crate) async fn embed_with_timeout(
    embedder: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<Vec<f32>, MemoryError> {
    tokio::time::timeout(timeout, embedder.embed(text))
        .await
        .unwrap_or_else(|_| {
            Err(MemoryError::EmbeddingUnavailable {
                message: format!("embedding timed out after {}ms", timeout.as_millis()),
                timed_out: true,
            })
        })
}

/// Vector length for well-known OpenAI embedding models.
pub fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Client for `/v1/embeddings` on OpenAI or a compatible server.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dims: usize,
}

impl std::fmt::Debug for OpenAiEmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dims", &self.dims)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddingProvider {
    /// Create a provider for `text-embedding-3-small` with a per-request timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, MemoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| MemoryError::configuration("embedding", err.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: normalize_base_url(DEFAULT_BASE_URL),
            model: DEFAULT_MODEL.to_string(),
            dims: 1536,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>, dims: usize) -> Self {
        self.model = model.into();
        self.dims = dims;
        self
    }

    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(url.as_ref());
        self
    }

    /// Only the v3 models accept a `dimensions` parameter.
    fn request_dimensions(&self) -> Option<usize> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dims)
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn embeddings_endpoint(base_url: &str) -> String {
    let normalized = normalize_base_url(base_url);
    if normalized.ends_with("/embeddings") {
        return normalized;
    }
    if has_version_suffix(&normalized) {
        return format!("{normalized}/embeddings");
    }
    format!("{normalized}/v1/embeddings")
}

fn request_error(err: reqwest::Error) -> MemoryError {
    MemoryError::EmbeddingUnavailable {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        debug!(
            "requesting embedding (model={}, chars={})",
            self.model,
            text.chars().count()
        );
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.request_dimensions(),
        };
        let response = self
            .client
            .post(embeddings_endpoint(&self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::embedding(format!(
                "provider returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let payload: EmbeddingResponse = response.json().await.map_err(request_error)?;
        payload
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| MemoryError::embedding("empty embedding response"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn endpoint_from_host_base_uses_v1_embeddings() {
        assert_eq!(
            embeddings_endpoint("https://api.openai.com/"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn endpoint_keeps_version_suffix() {
        assert_eq!(
            embeddings_endpoint("http://localhost:11434/v1"),
            "http://localhost:11434/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("https://open.bigmodel.cn/api/paas/v4"),
            "https://open.bigmodel.cn/api/paas/v4/embeddings"
        );
    }

    #[test]
    fn endpoint_preserves_explicit_embeddings_url() {
        assert_eq!(
            embeddings_endpoint("https://proxy.internal/v1/embeddings"),
            "https://proxy.internal/v1/embeddings"
        );
    }

    #[test]
    fn dimensions_sent_only_for_v3_models() {
        let provider = OpenAiEmbeddingProvider::new("key", Duration::from_secs(1)).expect("client");
        assert_eq!(provider.request_dimensions(), Some(1536));
        let provider = provider.with_model("text-embedding-ada-002", 1536);
        assert_eq!(provider.request_dimensions(), None);
    }

    #[test]
    fn request_omits_missing_dimensions() {
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-ada-002",
            input: "hello",
            dimensions: None,
        })
        .expect("encode");
        assert_eq!(
            body,
            serde_json::json!({ "model": "text-embedding-ada-002", "input": "hello" })
        );
    }

    #[test]
    fn known_model_dimensions() {
        assert_eq!(known_dimensions("text-embedding-3-large"), Some(3072));
        assert_eq!(known_dimensions("text-embedding-ada-002"), Some(1536));
        assert_eq!(known_dimensions("custom"), None);
    }
}
