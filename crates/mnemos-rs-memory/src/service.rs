//! Memory service facade used by the HTTP layer.

use crate::chunker::{Chunker, ChunkerConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, require_present};
use crate::filter::build_filter;
use crate::model::{AddMemoryResult, MetadataValue, NewMemory, SearchHit, SearchQuery};
use crate::searcher::{MemorySearcher, SearcherConfig};
use crate::session::extract_session_text;
use crate::store::{VectorStore, with_store_timeout};
use crate::writer::{MemoryWriter, WriterConfig};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;

/// Settings for every component behind [`MemoryService`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ServiceConfig {
    pub chunker: ChunkerConfig,
    pub writer: WriterConfig,
    pub searcher: SearcherConfig,
}

/// Write, search, purge and health operations over one store.
pub struct MemoryService {
    writer: MemoryWriter,
    searcher: MemorySearcher,
    store: Arc<dyn VectorStore>,
    config: ServiceConfig,
}

impl MemoryService {
    /// Wire the components, checking that the embedder and writer agree on dimensions.
    pub fn new(
        config: ServiceConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, MemoryError> {
        if embedder.dimensions() != config.writer.dimensions {
            return Err(MemoryError::configuration(
                "dimensions",
                format!(
                    "embedder {} produces {} dimensions, expected {}",
                    embedder.model_name(),
                    embedder.dimensions(),
                    config.writer.dimensions
                ),
            ));
        }
        let chunker = Chunker::new(config.chunker)?;
        let writer = MemoryWriter::new(chunker, embedder.clone(), store.clone(), config.writer)?;
        let searcher = MemorySearcher::new(embedder, store.clone(), config.searcher)?;
        Ok(Self {
            writer,
            searcher,
            store,
            config,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Prepare the backing collection.
    pub async fn initialize(&self) -> Result<(), MemoryError> {
        with_store_timeout(
            self.config.writer.store_timeout,
            "initialize",
            self.store.initialize(),
        )
        .await?;
        info!("memory service initialized");
        Ok(())
    }

    pub async fn add_memory(&self, request: NewMemory) -> Result<AddMemoryResult, MemoryError> {
        self.writer.add_memory(request).await
    }

    pub async fn search_memory(&self, query: SearchQuery) -> Result<Vec<SearchHit>, MemoryError> {
        self.searcher.search_memory(query).await
    }

    /// Store the text of a session's events as one memory tagged `source = "session"`.
    pub async fn add_session_to_memory(
        &self,
        session_id: &str,
        user_id: &str,
        events: &[Value],
        app_name: Option<&str>,
    ) -> Result<AddMemoryResult, MemoryError> {
        require_present("user_id", user_id)?;
        let Some(content) = extract_session_text(events) else {
            debug!(
                "no text content in session events (session_id={}, events={})",
                session_id,
                events.len()
            );
            return Ok(AddMemoryResult::default());
        };
        let mut request = NewMemory::new(user_id, content)
            .with_metadata("source", MetadataValue::from("session"));
        if !session_id.trim().is_empty() {
            request = request.with_session(session_id);
        }
        if let Some(app_name) = app_name.filter(|name| !name.trim().is_empty()) {
            request = request.with_agent(app_name);
        }
        self.writer.add_memory(request).await
    }

    /// Delete a tenant's memories, optionally narrowed to a session or agent.
    pub async fn delete_memories(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        agent_name: Option<&str>,
    ) -> Result<usize, MemoryError> {
        require_present("user_id", user_id)?;
        let filter = build_filter(Some(user_id), session_id, agent_name, None);
        let deleted = with_store_timeout(
            self.config.writer.store_timeout,
            "delete",
            self.store.delete(&filter),
        )
        .await?;
        info!(
            "deleted memories (user_id={}, session_id={:?}, agent_name={:?}, count={})",
            user_id, session_id, agent_name, deleted
        );
        Ok(deleted)
    }

    /// Whether the store answered within the store timeout.
    pub async fn health_check(&self) -> bool {
        let timeout = self.config.writer.store_timeout;
        match tokio::time::timeout(timeout, self.store.health_check()).await {
            Ok(healthy) => healthy,
            Err(_) => {
                warn!("store health check timed out (timeout_ms={})", timeout.as_millis());
                false
            }
        }
    }
}
