//! Configuration schema for Mnemos.

use serde::{Deserialize, Serialize};

/// Root config for the Mnemos memory service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemosConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl MnemosConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemosConfigBuilder {
        MnemosConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemosConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemosConfigBuilder {
    config: MnemosConfig,
}

impl MnemosConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemosConfig::default(),
        }
    }

    /// Replace the HTTP server configuration.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Replace the embedding provider configuration.
    pub fn embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.config.embedding = embedding;
        self
    }

    /// Replace the vector store configuration.
    pub fn vector_store(mut self, vector_store: VectorStoreConfig) -> Self {
        self.config.vector_store = vector_store;
        self
    }

    /// Replace the chunking configuration.
    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.chunking = chunking;
        self
    }

    /// Replace the search configuration.
    pub fn search(mut self, search: SearchConfig) -> Self {
        self.config.search = search;
        self
    }

    /// Finalize and return the built `MnemosConfig`.
    pub fn build(self) -> MnemosConfig {
        self.config
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    /// Optional OpenAI-compatible base URL (defaults to api.openai.com).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum in-flight embedding calls per write.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_ms: default_embedding_timeout_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    4
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Store backend: `qdrant` or `memory`.
    #[serde(default = "default_store_provider")]
    pub provider: String,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// Optional cap on records per upsert call.
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: default_store_url(),
            collection: default_collection(),
            api_key: None,
            timeout_ms: default_store_timeout_ms(),
            max_batch_size: None,
        }
    }
}

fn default_store_provider() -> String {
    "qdrant".to_string()
}

fn default_store_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "mnemos-memories".to_string()
}

fn default_store_timeout_ms() -> u64 {
    10_000
}

/// Chunking settings, in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    /// Fraction of `chunk_size` searched backward for a natural boundary.
    #[serde(default = "default_lookback_ratio")]
    pub lookback_ratio: f32,
    #[serde(default = "default_true")]
    pub boundary_aware: bool,
    #[serde(default = "default_true")]
    pub preserve_long_tokens: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
            lookback_ratio: default_lookback_ratio(),
            boundary_aware: true,
            preserve_long_tokens: true,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_min_chunk_size() -> usize {
    50
}

fn default_lookback_ratio() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

/// Search defaults and limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    /// Score cutoff applied when a request does not carry one.
    #[serde(default)]
    pub score_threshold: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            score_threshold: None,
        }
    }
}

fn default_top_k() -> usize {
    10
}

fn default_max_top_k() -> usize {
    100
}
