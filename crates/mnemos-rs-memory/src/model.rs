//! Memory records, chunks and request/response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Scalar metadata value attached to a memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    /// Convert a JSON value, returning `None` for arrays, objects and null.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(flag) => Some(Self::Bool(*flag)),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float)),
            serde_json::Value::String(text) => Some(Self::String(text.clone())),
            _ => None,
        }
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(flag) => serde_json::Value::Bool(*flag),
            Self::Integer(number) => serde_json::Value::from(*number),
            Self::Float(number) => serde_json::Number::from_f64(*number)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(text) => serde_json::Value::String(text.clone()),
        }
    }

    /// Numeric view used by range comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(number) => Some(*number as f64),
            Self::Float(number) => Some(*number),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Float(number) => write!(f, "{number}"),
            Self::String(text) => f.write_str(text),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered metadata map.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// One contiguous slice of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Chunk text, borrowed from the source.
    pub text: &'a str,
    /// Start offset in characters.
    pub start: usize,
    /// End offset in characters (exclusive).
    pub end: usize,
    /// Zero-based position among the document's chunks.
    pub index: usize,
}

impl Chunk<'_> {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Chunks produced by the chunker are never empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One embedded chunk as persisted in the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Chunk text.
    pub content: String,
    /// Owning user.
    pub user_id: String,
    /// Optional session scope.
    pub session_id: Option<String>,
    /// Optional agent scope.
    pub agent_name: Option<String>,
    /// Caller supplied metadata.
    pub metadata: Metadata,
    pub chunk_index: usize,
    pub chunk_start: usize,
    pub chunk_end: usize,
    pub total_chunks: usize,
    /// Length of the source document in characters.
    pub source_length: usize,
    /// Truncated SHA-256 of the source document, shared by sibling chunks.
    pub content_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Metadata exposed on search hits: caller metadata plus bookkeeping keys.
    pub fn hit_metadata(&self) -> Metadata {
        let mut metadata = self.metadata.clone();
        metadata.insert("user_id".to_string(), self.user_id.clone().into());
        if let Some(session_id) = &self.session_id {
            metadata.insert("session_id".to_string(), session_id.clone().into());
        }
        if let Some(agent_name) = &self.agent_name {
            metadata.insert("agent_name".to_string(), agent_name.clone().into());
        }
        metadata.insert("chunk_index".to_string(), self.chunk_index.into());
        metadata.insert("chunk_start".to_string(), self.chunk_start.into());
        metadata.insert("chunk_end".to_string(), self.chunk_end.into());
        metadata.insert("total_chunks".to_string(), self.total_chunks.into());
        metadata.insert("content_hash".to_string(), self.content_hash.clone().into());
        metadata.insert(
            "timestamp".to_string(),
            self.created_at.to_rfc3339().into(),
        );
        metadata
    }
}

/// A stored record with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f32,
}

/// Search result returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub memory_id: Uuid,
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}

impl From<ScoredRecord> for SearchHit {
    fn from(scored: ScoredRecord) -> Self {
        let metadata = scored.record.hit_metadata();
        Self {
            memory_id: scored.record.id,
            content: scored.record.content,
            score: scored.score,
            metadata,
        }
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMemoryResult {
    /// Ids in chunk order.
    pub memory_ids: Vec<Uuid>,
    pub chunks_created: usize,
}

/// Write request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMemory {
    pub content: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub agent_name: Option<String>,
    pub metadata: Metadata,
}

impl NewMemory {
    /// Create a request with no optional scopes.
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub agent_name: Option<String>,
    /// Maximum hits to return.
    pub top_k: usize,
    /// Minimum score; falls back to the searcher default, then 0.0.
    pub score_threshold: Option<f32>,
    /// Exact-match metadata constraints.
    pub filters: Metadata,
}

impl SearchQuery {
    /// Create a query with `top_k = 10` and no extra scoping.
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            user_id: user_id.into(),
            session_id: None,
            agent_name: None,
            top_k: 10,
            score_threshold: None,
            filters: Metadata::new(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_agent(mut self, agent_name: impl Into<String>) -> Self {
        self.agent_name = Some(agent_name.into());
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn metadata_value_is_untagged_scalar() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"a":"x","b":3,"c":1.5,"d":true}"#).expect("metadata");
        assert_eq!(metadata["a"], MetadataValue::String("x".to_string()));
        assert_eq!(metadata["b"], MetadataValue::Integer(3));
        assert_eq!(metadata["c"], MetadataValue::Float(1.5));
        assert_eq!(metadata["d"], MetadataValue::Bool(true));
        let encoded = serde_json::to_string(&metadata).expect("encode");
        assert_eq!(encoded, r#"{"a":"x","b":3,"c":1.5,"d":true}"#);
    }

    #[test]
    fn from_json_skips_non_scalars() {
        assert_eq!(MetadataValue::from_json(&serde_json::json!([1, 2])), None);
        assert_eq!(MetadataValue::from_json(&serde_json::Value::Null), None);
        assert_eq!(
            MetadataValue::from_json(&serde_json::json!(7)),
            Some(MetadataValue::Integer(7))
        );
    }

    #[test]
    fn hit_metadata_overrides_reserved_keys() {
        let record = MemoryRecord {
            id: Uuid::new_v4(),
            vector: vec![1.0],
            content: "text".to_string(),
            user_id: "u1".to_string(),
            session_id: None,
            agent_name: Some("planner".to_string()),
            metadata: Metadata::from([
                ("user_id".to_string(), MetadataValue::from("spoofed")),
                ("topic".to_string(), MetadataValue::from("rust")),
            ]),
            chunk_index: 1,
            chunk_start: 800,
            chunk_end: 1800,
            total_chunks: 3,
            source_length: 2500,
            content_hash: "abcd".to_string(),
            created_at: Utc::now(),
        };
        let metadata = record.hit_metadata();
        assert_eq!(metadata["user_id"], MetadataValue::from("u1"));
        assert_eq!(metadata["topic"], MetadataValue::from("rust"));
        assert_eq!(metadata["agent_name"], MetadataValue::from("planner"));
        assert_eq!(metadata["chunk_start"], MetadataValue::Integer(800));
        assert!(!metadata.contains_key("session_id"));
    }
}
