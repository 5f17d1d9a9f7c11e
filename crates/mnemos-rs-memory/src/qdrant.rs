//! Qdrant vector store over the REST API.

use crate::error::MemoryError;
use crate::filter::{FilterField, RangeBounds, SearchFilter};
use crate::model::{MemoryRecord, Metadata, MetadataValue, ScoredRecord};
use crate::store::VectorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

/// Payload fields indexed as keywords for tenant filtering.
const INDEXED_FIELDS: [&str; 3] = ["user_id", "session_id", "agent_name"];

/// Connection settings for [`QdrantVectorStore`].
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
    /// Vector size for the collection.
    pub dimensions: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    pub max_batch_size: Option<usize>,
}

/// Vector store backed by a Qdrant collection.
#[derive(Debug)]
pub struct QdrantVectorStore {
    client: reqwest::Client,
    config: QdrantConfig,
    base_url: String,
}

impl QdrantVectorStore {
    pub fn new(config: QdrantConfig) -> Result<Self, MemoryError> {
        if config.collection.trim().is_empty() {
            return Err(MemoryError::configuration(
                "collection",
                "must not be empty",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| MemoryError::configuration("vector_store", err.to_string()))?;
        let base_url = config.url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!(
            "{}/collections/{}{suffix}",
            self.base_url, self.config.collection
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> Result<Value, MemoryError> {
        let response = builder.send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::store(format!(
                "{action} failed with {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        response.json().await.map_err(request_error)
    }

    async fn collection_exists(&self) -> Result<bool, MemoryError> {
        let response = self
            .request(Method::GET, self.collection_url(""))
            .send()
            .await
            .map_err(request_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(MemoryError::store(format!(
                "collection lookup failed with {status}"
            ))),
        }
    }
}

fn request_error(err: reqwest::Error) -> MemoryError {
    MemoryError::StoreUnavailable {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        if self.collection_exists().await? {
            info!(
                "qdrant collection already exists (collection={})",
                self.config.collection
            );
            return Ok(());
        }
        info!(
            "creating qdrant collection (collection={}, dimensions={})",
            self.config.collection, self.config.dimensions
        );
        let body = json!({
            "vectors": { "size": self.config.dimensions, "distance": "Cosine" }
        });
        self.send(
            self.request(Method::PUT, self.collection_url("")).json(&body),
            "create collection",
        )
        .await?;
        for field in INDEXED_FIELDS {
            let body = json!({ "field_name": field, "field_schema": "keyword" });
            self.send(
                self.request(Method::PUT, self.collection_url("/index?wait=true"))
                    .json(&body),
                "create payload index",
            )
            .await?;
        }
        Ok(())
    }

    fn max_batch_size(&self) -> Option<usize> {
        self.config.max_batch_size
    }

    async fn upsert(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        for record in records {
            if record.vector.len() != self.config.dimensions {
                return Err(MemoryError::DimensionMismatch {
                    expected: self.config.dimensions,
                    actual: record.vector.len(),
                });
            }
        }
        let points: Vec<Value> = records.iter().map(record_to_point).collect();
        debug!(
            "upserting points (collection={}, count={})",
            self.config.collection,
            points.len()
        );
        self.send(
            self.request(Method::PUT, self.collection_url("/points?wait=true"))
                .json(&json!({ "points": points })),
            "upsert",
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        let mut body = json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
        });
        if let Some(filter) = filter_to_qdrant(filter) {
            body["filter"] = filter;
        }
        let response = self
            .send(
                self.request(Method::POST, self.collection_url("/points/search"))
                    .json(&body),
                "search",
            )
            .await?;
        let points: Vec<ScoredPoint> = serde_json::from_value(response["result"].clone())
            .map_err(|err| MemoryError::store(format!("malformed search response: {err}")))?;
        points.into_iter().map(ScoredPoint::into_scored).collect()
    }

    async fn delete(&self, filter: &SearchFilter) -> Result<usize, MemoryError> {
        let Some(filter) = filter_to_qdrant(filter) else {
            return Err(MemoryError::validation(
                "filter",
                "refusing to delete without a filter",
            ));
        };
        let counted = self
            .send(
                self.request(Method::POST, self.collection_url("/points/count"))
                    .json(&json!({ "filter": filter, "exact": true })),
                "count",
            )
            .await?;
        let count = counted["result"]["count"].as_u64().unwrap_or(0) as usize;
        self.send(
            self.request(Method::POST, self.collection_url("/points/delete?wait=true"))
                .json(&json!({ "filter": filter })),
            "delete",
        )
        .await?;
        info!(
            "deleted points (collection={}, count={count})",
            self.config.collection
        );
        Ok(count)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/collections", self.base_url);
        match self.send(self.request(Method::GET, url), "health").await {
            Ok(_) => true,
            Err(err) => {
                warn!("qdrant health check failed (error={err})");
                false
            }
        }
    }
}

/// Translate a filter into Qdrant's `must` syntax. `All` has no filter.
pub fn filter_to_qdrant(filter: &SearchFilter) -> Option<Value> {
    match filter {
        SearchFilter::All => None,
        SearchFilter::And(clauses) => Some(json!({
            "must": clauses.iter().filter_map(condition).collect::<Vec<_>>()
        })),
        clause => condition(clause).map(|condition| json!({ "must": [condition] })),
    }
}

fn condition(filter: &SearchFilter) -> Option<Value> {
    match filter {
        SearchFilter::All => None,
        // `match.value` only takes keywords, integers and bools.
        SearchFilter::Match {
            field,
            value: MetadataValue::Float(number),
        } => Some(json!({
            "key": field_key(field),
            "range": { "gte": number, "lte": number }
        })),
        SearchFilter::Match { field, value } => Some(json!({
            "key": field_key(field),
            "match": { "value": value.to_json() }
        })),
        SearchFilter::Range { field, range } => Some(json!({
            "key": field_key(field),
            "range": range_to_json(range)
        })),
        SearchFilter::And(_) => filter_to_qdrant(filter),
    }
}

fn field_key(field: &FilterField) -> String {
    field.path()
}

fn range_to_json(range: &RangeBounds) -> Value {
    let mut out = serde_json::Map::new();
    for (name, bound) in [
        ("gt", range.gt),
        ("gte", range.gte),
        ("lt", range.lt),
        ("lte", range.lte),
    ] {
        if let Some(bound) = bound {
            out.insert(name.to_string(), json!(bound));
        }
    }
    Value::Object(out)
}

/// Stored payload; the record vector lives beside it in the point.
#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    content: String,
    user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_name: Option<String>,
    #[serde(default)]
    metadata: Metadata,
    chunk_index: usize,
    chunk_start: usize,
    chunk_end: usize,
    total_chunks: usize,
    source_length: usize,
    content_hash: String,
    timestamp: DateTime<Utc>,
}

fn record_to_point(record: &MemoryRecord) -> Value {
    let payload = Payload {
        content: record.content.clone(),
        user_id: record.user_id.clone(),
        session_id: record.session_id.clone(),
        agent_name: record.agent_name.clone(),
        metadata: record.metadata.clone(),
        chunk_index: record.chunk_index,
        chunk_start: record.chunk_start,
        chunk_end: record.chunk_end,
        total_chunks: record.total_chunks,
        source_length: record.source_length,
        content_hash: record.content_hash.clone(),
        timestamp: record.created_at,
    };
    json!({
        "id": record.id,
        "vector": record.vector,
        "payload": payload,
    })
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    payload: Option<Payload>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

impl ScoredPoint {
    fn into_scored(self) -> Result<ScoredRecord, MemoryError> {
        let id = self
            .id
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| MemoryError::store(format!("unexpected point id {}", self.id)))?;
        let payload = self
            .payload
            .ok_or_else(|| MemoryError::store(format!("point {id} has no payload")))?;
        Ok(ScoredRecord {
            score: self.score,
            record: MemoryRecord {
                id,
                vector: self.vector.unwrap_or_default(),
                content: payload.content,
                user_id: payload.user_id,
                session_id: payload.session_id,
                agent_name: payload.agent_name,
                metadata: payload.metadata,
                chunk_index: payload.chunk_index,
                chunk_start: payload.chunk_start,
                chunk_end: payload.chunk_end,
                total_chunks: payload.total_chunks,
                source_length: payload.source_length,
                content_hash: payload.content_hash,
                created_at: payload.timestamp,
            },
        })
    }
}
