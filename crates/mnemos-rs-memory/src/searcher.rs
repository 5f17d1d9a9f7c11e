//! Read path: embed the query, filter by tenant, rank by score.

use crate::embedding::{EmbeddingProvider, embed_with_timeout};
use crate::error::{MemoryError, require_present};
use crate::filter::build_filter;
use crate::model::{SearchHit, SearchQuery};
use crate::store::{VectorStore, with_store_timeout};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

/// Searcher tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearcherConfig {
    /// Largest `top_k` a caller may request.
    pub max_top_k: usize,
    /// Threshold applied when a query does not set one.
    pub default_score_threshold: Option<f32>,
    pub embedding_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            max_top_k: 100,
            default_score_threshold: None,
            embedding_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
        }
    }
}

/// Tenant-scoped semantic search.
pub struct MemorySearcher {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: SearcherConfig,
}

impl MemorySearcher {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: SearcherConfig,
    ) -> Result<Self, MemoryError> {
        if config.max_top_k == 0 {
            return Err(MemoryError::configuration(
                "max_top_k",
                "must be greater than zero",
            ));
        }
        if let Some(threshold) = config.default_score_threshold
            && !valid_threshold(threshold)
        {
            return Err(MemoryError::configuration(
                "score_threshold",
                "must be within [0, 1]",
            ));
        }
        Ok(Self {
            embedder,
            store,
            config,
        })
    }

    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    /// Hits for `query` at or above the effective threshold, best first.
    /// Without a threshold every candidate is kept, including negative scores.
    pub async fn search_memory(&self, query: SearchQuery) -> Result<Vec<SearchHit>, MemoryError> {
        require_present("user_id", &query.user_id)?;
        if query.top_k == 0 || query.top_k > self.config.max_top_k {
            return Err(MemoryError::validation(
                "top_k",
                format!("must be within 1..={}", self.config.max_top_k),
            ));
        }
        if let Some(threshold) = query.score_threshold
            && !valid_threshold(threshold)
        {
            return Err(MemoryError::validation(
                "score_threshold",
                "must be within [0, 1]",
            ));
        }
        require_present("query", &query.query)?;

        let threshold = query
            .score_threshold
            .or(self.config.default_score_threshold);
        let vector =
            embed_with_timeout(&*self.embedder, &query.query, self.config.embedding_timeout)
                .await?;

        let filter = build_filter(
            Some(&query.user_id),
            query.session_id.as_deref(),
            query.agent_name.as_deref(),
            Some(&query.filters),
        );
        debug_assert!(filter.is_tenant_scoped());

        let scored = with_store_timeout(
            self.config.store_timeout,
            "query",
            self.store.query(&vector, &filter, query.top_k),
        )
        .await?;
        let returned = scored.len();

        let mut hits: Vec<SearchHit> = scored
            .into_iter()
            .filter(|scored| threshold.is_none_or(|min| scored.score >= min))
            .map(SearchHit::from)
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(query.top_k);

        debug!(
            "memory search complete (user_id={}, top_k={}, threshold={:?}, returned={}, kept={})",
            query.user_id,
            query.top_k,
            threshold,
            returned,
            hits.len()
        );
        Ok(hits)
    }
}

fn valid_threshold(threshold: f32) -> bool {
    threshold.is_finite() && (0.0..=1.0).contains(&threshold)
}
