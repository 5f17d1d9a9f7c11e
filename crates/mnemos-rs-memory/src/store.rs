//! Vector store interface and the in-process implementation.

use crate::error::MemoryError;
use crate::filter::SearchFilter;
use crate::model::{MemoryRecord, ScoredRecord};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::time::Duration;

/// Persists memory records and answers filtered similarity queries.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Prepare the backing collection. Called once at startup.
    async fn initialize(&self) -> Result<(), MemoryError> {
        Ok(())
    }

    /// Largest batch accepted by a single `upsert`, if capped.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Insert or replace records by id.
    async fn upsert(&self, records: &[MemoryRecord]) -> Result<(), MemoryError>;

    /// Up to `top_k` records matching `filter`, most similar first.
    async fn query(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError>;

    /// Delete records matching `filter`, returning how many were removed.
    async fn delete(&self, filter: &SearchFilter) -> Result<usize, MemoryError>;

    /// Whether the store is reachable.
    async fn health_check(&self) -> bool;
}

/// Run a store call under `timeout`, surfacing expiry as a retryable error.
pub(crate) async fn with_store_timeout<T>(
    timeout: Duration,
    action: &str,
    call: impl Future<Output = Result<T, MemoryError>>,
) -> Result<T, MemoryError> {
    tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
        Err(MemoryError::StoreUnavailable {
            message: format!("{action} timed out after {}ms", timeout.as_millis()),
            timed_out: true,
        })
    })
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let mut dot = 0.0_f32;
    let mut left_norm = 0.0_f32;
    let mut right_norm = 0.0_f32;
    for (a, b) in left.iter().zip(right) {
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

/// Vector store kept in process memory.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimensions: usize,
    max_batch_size: Option<usize>,
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            max_batch_size: None,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Cap the number of records accepted per upsert.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of every stored record in insertion order.
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records.read().clone()
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), MemoryError> {
        if vector.len() == self.dimensions {
            Ok(())
        } else {
            Err(MemoryError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            })
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }

    async fn upsert(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        if let Some(limit) = self.max_batch_size
            && records.len() > limit
        {
            return Err(MemoryError::store(format!(
                "batch of {} exceeds limit {limit}",
                records.len()
            )));
        }
        for record in records {
            self.check_dimensions(&record.vector)?;
        }

        let mut stored = self.records.write();
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        debug!(
            "upserted records into memory store (count={}, total={})",
            records.len(),
            stored.len()
        );
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        self.check_dimensions(vector)?;
        let stored = self.records.read();
        let mut ranked: Vec<(f32, &MemoryRecord)> = stored
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| (cosine_similarity(vector, &record.vector), record))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(top_k);
        Ok(ranked
            .into_iter()
            .map(|(score, record)| ScoredRecord {
                score,
                record: record.clone(),
            })
            .collect())
    }

    async fn delete(&self, filter: &SearchFilter) -> Result<usize, MemoryError> {
        let mut stored = self.records.write();
        let before = stored.len();
        stored.retain(|record| !filter.matches(record));
        Ok(before - stored.len())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::build_filter;
    use crate::model::Metadata;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn record(user_id: &str, vector: Vec<f32>) -> MemoryRecord {
        MemoryRecord {
            id: Uuid::new_v4(),
            vector,
            content: format!("memory of {user_id}"),
            user_id: user_id.to_string(),
            session_id: None,
            agent_name: None,
            metadata: Metadata::new(),
            chunk_index: 0,
            chunk_start: 0,
            chunk_end: 1,
            total_chunks: 1,
            source_length: 1,
            content_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn query_ranks_and_filters() {
        let store = InMemoryVectorStore::new(2);
        let close = record("u1", vec![1.0, 0.1]);
        let far = record("u1", vec![0.1, 1.0]);
        let other = record("u2", vec![1.0, 0.0]);
        store
            .upsert(&[far.clone(), close.clone(), other])
            .await
            .expect("upsert");

        let filter = build_filter(Some("u1"), None, None, None);
        let hits = store.query(&[1.0, 0.0], &filter, 10).await.expect("query");
        let ids: Vec<Uuid> = hits.iter().map(|hit| hit.record.id).collect();
        assert_eq!(ids, vec![close.id, far.id]);

        let hits = store.query(&[1.0, 0.0], &filter, 1).await.expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record, close);
    }

    #[tokio::test]
    async fn query_keeps_raw_negative_scores() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[record("u1", vec![1.0, 0.0])])
            .await
            .expect("upsert");
        let filter = build_filter(Some("u1"), None, None, None);
        let hits = store.query(&[-1.0, 0.2], &filter, 5).await.expect("query");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score < -0.9);
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions() {
        let store = InMemoryVectorStore::new(3);
        let err = store.upsert(&[record("u1", vec![1.0])]).await.unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn enforces_batch_limit() {
        let store = InMemoryVectorStore::new(1).with_max_batch_size(1);
        let batch = [record("u1", vec![1.0]), record("u1", vec![1.0])];
        let err = store.upsert(&batch).await.unwrap_err();
        assert!(matches!(err, MemoryError::StoreUnavailable { .. }));
        store.upsert(&batch[..1]).await.expect("single");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_by_id_and_delete_counts() {
        let store = InMemoryVectorStore::new(1);
        let mut first = record("u1", vec![1.0]);
        store.upsert(&[first.clone()]).await.expect("upsert");
        first.content = "updated".to_string();
        store
            .upsert(&[first.clone(), record("u2", vec![1.0])])
            .await
            .expect("upsert");
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].content, "updated");

        let removed = store
            .delete(&build_filter(Some("u1"), None, None, None))
            .await
            .expect("delete");
        assert_eq!(removed, 1);
        assert_eq!(store.records()[0].user_id, "u2");
    }
}
