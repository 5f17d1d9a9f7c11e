//! Error types for memory operations.

use uuid::Uuid;

/// Coarse classification used by outer layers to map errors to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid component setup; fatal at startup.
    Configuration,
    /// Client fault, rejected before any external call.
    Validation,
    /// Embedding provider failed or timed out.
    EmbeddingUnavailable,
    /// Vector store failed or timed out.
    StoreUnavailable,
    /// A vector did not have the configured dimensionality.
    DimensionMismatch,
    /// Some chunks were persisted before a failure.
    PartialWrite,
}

/// Errors returned by the chunker, writer, searcher and providers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Invalid chunking or component configuration.
    #[error("invalid configuration for {field}: {message}")]
    Configuration { field: &'static str, message: String },
    /// Request failed validation.
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    /// Embedding provider error or timeout.
    #[error("embedding unavailable: {message}")]
    EmbeddingUnavailable { message: String, timed_out: bool },
    /// Vector store error or timeout.
    #[error("vector store unavailable: {message}")]
    StoreUnavailable { message: String, timed_out: bool },
    /// Vector length differs from the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A write persisted a prefix of its chunks before failing.
    #[error(
        "partial write: {} chunk(s) persisted before chunk {failed_chunk} failed: {source}",
        persisted_ids.len()
    )]
    PartialWrite {
        persisted_ids: Vec<Uuid>,
        failed_chunk: usize,
        #[source]
        source: Box<MemoryError>,
    },
}

impl MemoryError {
    /// Build a validation error for a request field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Build a configuration error for a setting.
    pub fn configuration(field: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            message: message.into(),
        }
    }

    /// Build a non-timeout embedding failure.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Build a non-timeout store failure.
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::EmbeddingUnavailable { .. } => ErrorKind::EmbeddingUnavailable,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::PartialWrite { .. } => ErrorKind::PartialWrite,
        }
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingUnavailable { .. } | Self::StoreUnavailable { .. } => true,
            Self::PartialWrite { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Ids persisted before the failure, empty unless this is a partial write.
    pub fn persisted_ids(&self) -> &[Uuid] {
        match self {
            Self::PartialWrite { persisted_ids, .. } => persisted_ids,
            _ => &[],
        }
    }
}

/// Reject a missing or blank required field.
pub(crate) fn require_present(field: &'static str, value: &str) -> Result<(), MemoryError> {
    if value.trim().is_empty() {
        return Err(MemoryError::validation(field, "must not be empty"));
    }
    Ok(())
}
