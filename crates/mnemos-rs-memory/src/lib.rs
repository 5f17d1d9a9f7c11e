//! Long-term memory core: chunking, embedding, tenant-scoped storage and search.

pub mod chunker;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod model;
pub mod qdrant;
pub mod searcher;
pub mod service;
pub mod session;
pub mod store;
pub mod writer;

/// Chunking.
pub use chunker::{Chunker, ChunkerConfig, Chunks, chunk};
/// Embedding providers.
pub use embedding::{EmbeddingProvider, OpenAiEmbeddingProvider, known_dimensions};
/// Memory error types.
pub use error::{ErrorKind, MemoryError};
/// Search filters.
pub use filter::{FilterField, RangeBounds, SearchFilter, build_filter};
/// Records and request models.
pub use model::{
    AddMemoryResult, Chunk, MemoryRecord, Metadata, MetadataValue, NewMemory, ScoredRecord,
    SearchHit, SearchQuery,
};
/// Qdrant-backed store.
pub use qdrant::{QdrantConfig, QdrantVectorStore};
/// Read path.
pub use searcher::{MemorySearcher, SearcherConfig};
/// Service facade.
pub use service::{MemoryService, ServiceConfig};
/// Session flattening.
pub use session::extract_session_text;
/// Vector store interface and in-process store.
pub use store::{InMemoryVectorStore, VectorStore, cosine_similarity};
/// Write path.
pub use writer::{MemoryWriter, WriterConfig, content_hash};
