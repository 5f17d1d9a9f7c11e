use async_trait::async_trait;
use mnemos_rs_memory::{
    InMemoryVectorStore, MemoryError, MemoryRecord, ScoredRecord, SearchFilter, VectorStore,
};
use parking_lot::Mutex;

/// In-memory store that records calls and can fail a chosen upsert.
#[derive(Debug)]
pub struct RecordingStore {
    inner: InMemoryVectorStore,
    max_batch_size: Option<usize>,
    fail_upsert_call: Option<usize>,
    upserts: Mutex<Vec<usize>>,
    filters: Mutex<Vec<SearchFilter>>,
}

impl RecordingStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: InMemoryVectorStore::new(dimensions),
            max_batch_size: None,
            fail_upsert_call: None,
            upserts: Mutex::new(Vec::new()),
            filters: Mutex::new(Vec::new()),
        }
    }

    /// Advertise a batch cap to writers.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(max_batch_size);
        self
    }

    /// Fail the `call`-th upsert (1-based) without storing it.
    pub fn failing_upsert(mut self, call: usize) -> Self {
        self.fail_upsert_call = Some(call);
        self
    }

    /// Batch sizes of every upsert attempt, including failed ones.
    pub fn upsert_batches(&self) -> Vec<usize> {
        self.upserts.lock().clone()
    }

    /// Filters passed to `query` and `delete`.
    pub fn filters(&self) -> Vec<SearchFilter> {
        self.filters.lock().clone()
    }

    pub fn records(&self) -> Vec<MemoryRecord> {
        self.inner.records()
    }
}

#[async_trait]
impl VectorStore for RecordingStore {
    fn max_batch_size(&self) -> Option<usize> {
        self.max_batch_size
    }

    async fn upsert(&self, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        let call = {
            let mut upserts = self.upserts.lock();
            upserts.push(records.len());
            upserts.len()
        };
        if self.fail_upsert_call == Some(call) {
            return Err(MemoryError::store("injected upsert failure"));
        }
        if let Some(limit) = self.max_batch_size
            && records.len() > limit
        {
            return Err(MemoryError::store("batch exceeds advertised limit"));
        }
        self.inner.upsert(records).await
    }

    async fn query(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        self.filters.lock().push(filter.clone());
        self.inner.query(vector, filter, top_k).await
    }

    async fn delete(&self, filter: &SearchFilter) -> Result<usize, MemoryError> {
        self.filters.lock().push(filter.clone());
        self.inner.delete(filter).await
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Store whose every call fails as if the backend were down.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

fn down() -> MemoryError {
    MemoryError::store("connection refused")
}

#[async_trait]
impl VectorStore for UnavailableStore {
    async fn initialize(&self) -> Result<(), MemoryError> {
        Err(down())
    }

    async fn upsert(&self, _records: &[MemoryRecord]) -> Result<(), MemoryError> {
        Err(down())
    }

    async fn query(
        &self,
        _vector: &[f32],
        _filter: &SearchFilter,
        _top_k: usize,
    ) -> Result<Vec<ScoredRecord>, MemoryError> {
        Err(down())
    }

    async fn delete(&self, _filter: &SearchFilter) -> Result<usize, MemoryError> {
        Err(down())
    }

    async fn health_check(&self) -> bool {
        false
    }
}
