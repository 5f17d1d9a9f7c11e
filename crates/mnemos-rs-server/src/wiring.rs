//! Maps loaded configuration onto memory core constructors.

use mnemos_rs_config::MnemosConfig;
use mnemos_rs_memory::{
    ChunkerConfig, EmbeddingProvider, InMemoryVectorStore, MemoryError, OpenAiEmbeddingProvider,
    QdrantConfig, QdrantVectorStore, SearcherConfig, ServiceConfig, VectorStore, WriterConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// Core component settings derived from the config file.
pub fn service_config(config: &MnemosConfig) -> ServiceConfig {
    let chunking = &config.chunking;
    let embedding_timeout = Duration::from_millis(config.embedding.timeout_ms);
    let store_timeout = Duration::from_millis(config.vector_store.timeout_ms);
    ServiceConfig {
        chunker: ChunkerConfig {
            max_size: chunking.chunk_size,
            overlap: chunking.chunk_overlap,
            min_chunk_size: chunking.min_chunk_size,
            lookback_ratio: chunking.lookback_ratio,
            boundary_aware: chunking.boundary_aware,
            preserve_long_tokens: chunking.preserve_long_tokens,
        },
        writer: WriterConfig {
            dimensions: config.embedding.dimensions,
            max_concurrency: config.embedding.max_concurrency,
            upsert_batch_size: config.vector_store.max_batch_size,
            embedding_timeout,
            store_timeout,
        },
        searcher: SearcherConfig {
            max_top_k: config.search.max_top_k,
            default_score_threshold: config.search.score_threshold,
            embedding_timeout,
            store_timeout,
        },
    }
}

/// Build the configured embedding provider with an already-resolved API key.
pub fn build_embedder(
    config: &MnemosConfig,
    api_key: &str,
) -> Result<Arc<dyn EmbeddingProvider>, MemoryError> {
    let embedding = &config.embedding;
    let mut provider =
        OpenAiEmbeddingProvider::new(api_key, Duration::from_millis(embedding.timeout_ms))?
            .with_model(&embedding.model, embedding.dimensions);
    if let Some(base_url) = &embedding.base_url {
        provider = provider.with_base_url(base_url);
    }
    Ok(Arc::new(provider))
}

/// Build the configured vector store.
pub fn build_store(config: &MnemosConfig) -> Result<Arc<dyn VectorStore>, MemoryError> {
    let store = &config.vector_store;
    let dimensions = config.embedding.dimensions;
    match store.provider.as_str() {
        "memory" => {
            let mut memory = InMemoryVectorStore::new(dimensions);
            if let Some(limit) = store.max_batch_size {
                memory = memory.with_max_batch_size(limit);
            }
            Ok(Arc::new(memory))
        }
        "qdrant" => Ok(Arc::new(QdrantVectorStore::new(QdrantConfig {
            url: store.url.clone(),
            collection: store.collection.clone(),
            api_key: store.api_key.clone(),
            dimensions,
            timeout: Duration::from_millis(store.timeout_ms),
            max_batch_size: store.max_batch_size,
        })?)),
        other => Err(MemoryError::configuration(
            "vector_store.provider",
            format!("unsupported provider {other:?}"),
        )),
    }
}
