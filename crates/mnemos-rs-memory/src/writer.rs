//! Write path: chunk, embed, persist.

use crate::chunker::Chunker;
use crate::embedding::{EmbeddingProvider, embed_with_timeout};
use crate::error::{MemoryError, require_present};
use crate::model::{AddMemoryResult, Chunk, MemoryRecord, NewMemory};
use crate::store::{VectorStore, with_store_timeout};
use chrono::Utc;
use futures_util::{StreamExt, stream};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Writer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Expected embedding length.
    pub dimensions: usize,
    /// Embedding calls in flight per write.
    pub max_concurrency: usize,
    /// Records per upsert; `None` writes everything in one call.
    pub upsert_batch_size: Option<usize>,
    pub embedding_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            max_concurrency: 4,
            upsert_batch_size: None,
            embedding_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
        }
    }
}

/// First 16 hex chars of the SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(16);
    encoded
}

/// Turns submitted content into persisted, embedded chunks.
pub struct MemoryWriter {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: WriterConfig,
}

impl MemoryWriter {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: WriterConfig,
    ) -> Result<Self, MemoryError> {
        if config.dimensions == 0 {
            return Err(MemoryError::configuration(
                "dimensions",
                "must be greater than zero",
            ));
        }
        if config.max_concurrency == 0 {
            return Err(MemoryError::configuration(
                "max_concurrency",
                "must be greater than zero",
            ));
        }
        if config.upsert_batch_size == Some(0) {
            return Err(MemoryError::configuration(
                "upsert_batch_size",
                "must be greater than zero",
            ));
        }
        Ok(Self {
            chunker,
            embedder,
            store,
            config,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Records per upsert after applying the store's own cap.
    fn batch_size(&self) -> Option<usize> {
        let store_cap = self.store.max_batch_size().map(|cap| cap.max(1));
        match (self.config.upsert_batch_size, store_cap) {
            (Some(configured), Some(cap)) => Some(configured.min(cap)),
            (configured, cap) => configured.or(cap),
        }
    }

    /// Chunk, embed and persist `request`, returning ids in chunk order.
    ///
    /// Blank content stores nothing. A failure after at least one batch was
    /// persisted is reported as [`MemoryError::PartialWrite`]; nothing is
    /// rolled back.
    pub async fn add_memory(&self, request: NewMemory) -> Result<AddMemoryResult, MemoryError> {
        require_present("user_id", &request.user_id)?;
        if request.content.trim().is_empty() {
            warn!(
                "skipping blank memory content (user_id={})",
                request.user_id
            );
            return Ok(AddMemoryResult::default());
        }

        let chunks: Vec<Chunk<'_>> = self.chunker.chunk(&request.content).collect();
        let total_chunks = chunks.len();
        let source_length = request.content.chars().count();
        let hash = content_hash(&request.content);
        let created_at = Utc::now();
        let batch_size = self.batch_size();
        debug!(
            "writing memory (user_id={}, chars={}, chunks={}, batch_size={:?})",
            request.user_id, source_length, total_chunks, batch_size
        );

        let embedder = &*self.embedder;
        let timeout = self.config.embedding_timeout;
        let embed_futures: Vec<_> = chunks
            .iter()
            .map(|chunk| embed_with_timeout(embedder, chunk.text, timeout))
            .collect();
        let mut embeddings =
            pin!(stream::iter(embed_futures).buffered(self.config.max_concurrency));

        let mut persisted: Vec<Uuid> = Vec::with_capacity(total_chunks);
        let mut pending: Vec<MemoryRecord> = Vec::new();
        let mut index = 0;
        while let Some(embedded) = embeddings.next().await {
            let chunk = &chunks[index];
            let vector = match embedded.and_then(|vector| self.check_dimensions(vector)) {
                Ok(vector) => vector,
                Err(err) => {
                    if !pending.is_empty() {
                        debug!(
                            "dropping unflushed records after failure (count={})",
                            pending.len()
                        );
                    }
                    return Err(failure(persisted, chunk.index, err));
                }
            };
            pending.push(MemoryRecord {
                id: Uuid::new_v4(),
                vector,
                content: chunk.text.to_string(),
                user_id: request.user_id.clone(),
                session_id: request.session_id.clone(),
                agent_name: request.agent_name.clone(),
                metadata: request.metadata.clone(),
                chunk_index: chunk.index,
                chunk_start: chunk.start,
                chunk_end: chunk.end,
                total_chunks,
                source_length,
                content_hash: hash.clone(),
                created_at,
            });
            index += 1;

            if batch_size.is_some_and(|size| pending.len() >= size) {
                self.flush(&mut pending, &mut persisted).await?;
            }
        }
        if !pending.is_empty() {
            self.flush(&mut pending, &mut persisted).await?;
        }

        info!(
            "stored memory (user_id={}, chunks={}, hash={})",
            request.user_id, total_chunks, hash
        );
        Ok(AddMemoryResult {
            chunks_created: persisted.len(),
            memory_ids: persisted,
        })
    }

    fn check_dimensions(&self, vector: Vec<f32>) -> Result<Vec<f32>, MemoryError> {
        if vector.len() == self.config.dimensions {
            Ok(vector)
        } else {
            Err(MemoryError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: vector.len(),
            })
        }
    }

    /// Upsert `pending` and move its ids into `persisted`.
    async fn flush(
        &self,
        pending: &mut Vec<MemoryRecord>,
        persisted: &mut Vec<Uuid>,
    ) -> Result<(), MemoryError> {
        let first_chunk = pending.first().map_or(0, |record| record.chunk_index);
        let result = with_store_timeout(
            self.config.store_timeout,
            "upsert",
            self.store.upsert(pending),
        )
        .await;
        match result {
            Ok(()) => {
                debug!(
                    "flushed batch (first_chunk={}, count={})",
                    first_chunk,
                    pending.len()
                );
                persisted.extend(pending.drain(..).map(|record| record.id));
                Ok(())
            }
            Err(err) => Err(failure(std::mem::take(persisted), first_chunk, err)),
        }
    }
}

/// Wrap `err` as a partial write when anything was already persisted.
fn failure(persisted: Vec<Uuid>, failed_chunk: usize, err: MemoryError) -> MemoryError {
    if persisted.is_empty() {
        return err;
    }
    warn!(
        "write failed after partial persistence (persisted={}, failed_chunk={}, error={})",
        persisted.len(),
        failed_chunk,
        err
    );
    MemoryError::PartialWrite {
        persisted_ids: persisted,
        failed_chunk,
        source: Box::new(err),
    }
}
