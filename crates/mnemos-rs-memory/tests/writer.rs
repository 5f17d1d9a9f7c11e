//! Memory writer integration tests with stub embedders and stores.

use mnemos_rs_memory::{
    Chunker, ChunkerConfig, EmbeddingProvider, ErrorKind, MemoryError, MemoryWriter, NewMemory,
    VectorStore, WriterConfig, content_hash,
};
use mnemos_rs_test_utils::{FlakyEmbedder, KEYWORDS, KeywordEmbedder, RecordingStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn writer_config() -> WriterConfig {
    WriterConfig {
        dimensions: KEYWORDS.len(),
        ..WriterConfig::default()
    }
}

/// Fixed ten-char chunks so each chunk can carry its own marker.
fn ten_char_chunker() -> Chunker {
    Chunker::new(ChunkerConfig {
        max_size: 10,
        overlap: 0,
        min_chunk_size: 1,
        boundary_aware: false,
        ..ChunkerConfig::default()
    })
    .expect("chunker")
}

fn build_writer(
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<RecordingStore>,
    config: WriterConfig,
) -> MemoryWriter {
    let store: Arc<dyn VectorStore> = store;
    MemoryWriter::new(chunker, embedder, store, config).expect("writer")
}

/// A 2500-char document splits into three overlapping chunks written in one batch.
#[tokio::test]
async fn writes_three_chunks_for_long_document() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let chunker = Chunker::new(ChunkerConfig::new(1000, 200)).expect("chunker");
    let writer = build_writer(
        chunker,
        Arc::new(KeywordEmbedder),
        store.clone(),
        writer_config(),
    );
    let content = "rust ".repeat(500);

    let result = writer
        .add_memory(
            NewMemory::new("u1", content.clone())
                .with_session("s1")
                .with_metadata("topic", "lang"),
        )
        .await
        .expect("add memory");

    assert_eq!(result.chunks_created, 3);
    assert_eq!(store.upsert_batches(), vec![3]);
    let records = store.records();
    let ids: Vec<_> = records.iter().map(|record| record.id).collect();
    assert_eq!(ids, result.memory_ids);
    let spans: Vec<_> = records
        .iter()
        .map(|record| (record.chunk_start, record.chunk_end))
        .collect();
    assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 2500)]);
    for (index, record) in records.iter().enumerate() {
        assert_eq!(record.chunk_index, index);
        assert_eq!(record.total_chunks, 3);
        assert_eq!(record.source_length, 2500);
        assert_eq!(record.content_hash, content_hash(&content));
        assert_eq!(record.session_id.as_deref(), Some("s1"));
        assert_eq!(record.metadata["topic"].to_string(), "lang");
    }
}

#[tokio::test]
async fn rejects_blank_user_before_any_call() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let embedder = Arc::new(FlakyEmbedder::new());
    let writer = build_writer(
        ten_char_chunker(),
        embedder.clone(),
        store.clone(),
        writer_config(),
    );

    let err = writer
        .add_memory(NewMemory::new("", "hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, MemoryError::Validation { field: "user_id", .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(embedder.calls().is_empty());
    assert!(store.upsert_batches().is_empty());
}

#[tokio::test]
async fn blank_content_stores_nothing() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let writer = build_writer(
        ten_char_chunker(),
        Arc::new(KeywordEmbedder),
        store.clone(),
        writer_config(),
    );
    let result = writer
        .add_memory(NewMemory::new("u1", "  \n\t "))
        .await
        .expect("add memory");
    assert_eq!(result.chunks_created, 0);
    assert!(result.memory_ids.is_empty());
    assert!(store.upsert_batches().is_empty());
}

/// Store and configured caps both bound upsert batches.
#[tokio::test]
async fn splits_upserts_into_ordered_batches() {
    let content = "a".repeat(30);

    let store = Arc::new(RecordingStore::new(KEYWORDS.len()).with_max_batch_size(2));
    let writer = build_writer(
        ten_char_chunker(),
        Arc::new(KeywordEmbedder),
        store.clone(),
        writer_config(),
    );
    let result = writer
        .add_memory(NewMemory::new("u1", content.clone()))
        .await
        .expect("add memory");
    assert_eq!(store.upsert_batches(), vec![2, 1]);
    let indexes: Vec<_> = store.records().iter().map(|r| r.chunk_index).collect();
    assert_eq!(indexes, vec![0, 1, 2]);
    assert_eq!(result.memory_ids.len(), 3);

    let store = Arc::new(RecordingStore::new(KEYWORDS.len()).with_max_batch_size(2));
    let writer = build_writer(
        ten_char_chunker(),
        Arc::new(KeywordEmbedder),
        store.clone(),
        WriterConfig {
            upsert_batch_size: Some(1),
            ..writer_config()
        },
    );
    writer
        .add_memory(NewMemory::new("u1", content))
        .await
        .expect("add memory");
    assert_eq!(store.upsert_batches(), vec![1, 1, 1]);
}

/// Slow early chunks must not reorder persistence.
#[tokio::test]
async fn concurrent_embedding_preserves_chunk_order() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let embedder = Arc::new(FlakyEmbedder::new().delaying("SLOW", Duration::from_millis(50)));
    let writer = build_writer(
        ten_char_chunker(),
        embedder,
        store.clone(),
        WriterConfig {
            max_concurrency: 3,
            ..writer_config()
        },
    );
    let result = writer
        .add_memory(NewMemory::new("u1", "SLOWaaaaaabbbbbbbbbbcccccccccc"))
        .await
        .expect("add memory");

    let records = store.records();
    let contents: Vec<_> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["SLOWaaaaaa", "bbbbbbbbbb", "cccccccccc"]);
    let ids: Vec<_> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, result.memory_ids);
}

/// Timeout on chunk 2 of 3 after chunk 1 was persisted.
#[tokio::test]
async fn embedding_timeout_mid_write_reports_partial_write() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let embedder = Arc::new(FlakyEmbedder::new().hanging_on("HANG"));
    let writer = build_writer(
        ten_char_chunker(),
        embedder,
        store.clone(),
        WriterConfig {
            max_concurrency: 1,
            upsert_batch_size: Some(1),
            embedding_timeout: Duration::from_millis(50),
            ..writer_config()
        },
    );

    let err = writer
        .add_memory(NewMemory::new("u1", "aaaaaaaaaaHANGbbbbbbcccccccccc"))
        .await
        .unwrap_err();

    let records = store.records();
    assert_eq!(records.len(), 1);
    match &err {
        MemoryError::PartialWrite {
            persisted_ids,
            failed_chunk,
            source,
        } => {
            assert_eq!(persisted_ids, &vec![records[0].id]);
            assert_eq!(*failed_chunk, 1);
            assert!(matches!(
                **source,
                MemoryError::EmbeddingUnavailable {
                    timed_out: true,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

/// Nothing persisted yet: the embedding error surfaces as-is.
#[tokio::test]
async fn embedding_failure_before_persistence_is_unavailable() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let embedder = Arc::new(FlakyEmbedder::new().failing_on("FAIL"));
    let writer = build_writer(
        ten_char_chunker(),
        embedder,
        store.clone(),
        writer_config(),
    );
    let err = writer
        .add_memory(NewMemory::new("u1", "aaaaaaaaaaFAILbbbbbb"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MemoryError::EmbeddingUnavailable {
            timed_out: false,
            ..
        }
    ));
    assert!(store.records().is_empty());
    assert!(store.upsert_batches().is_empty());
}

#[tokio::test]
async fn store_failures_distinguish_first_and_later_batches() {
    let content = "a".repeat(30);
    let config = WriterConfig {
        upsert_batch_size: Some(1),
        ..writer_config()
    };

    let store = Arc::new(RecordingStore::new(KEYWORDS.len()).failing_upsert(1));
    let writer = build_writer(
        ten_char_chunker(),
        Arc::new(KeywordEmbedder),
        store.clone(),
        config,
    );
    let err = writer
        .add_memory(NewMemory::new("u1", content.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

    let store = Arc::new(RecordingStore::new(KEYWORDS.len()).failing_upsert(3));
    let writer = build_writer(
        ten_char_chunker(),
        Arc::new(KeywordEmbedder),
        store.clone(),
        config,
    );
    let err = writer
        .add_memory(NewMemory::new("u1", content))
        .await
        .unwrap_err();
    match err {
        MemoryError::PartialWrite {
            persisted_ids,
            failed_chunk,
            source,
        } => {
            assert_eq!(persisted_ids.len(), 2);
            assert_eq!(failed_chunk, 2);
            assert_eq!(source.kind(), ErrorKind::StoreUnavailable);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.records().len(), 2);
}

#[tokio::test]
async fn wrong_vector_length_is_rejected_before_persistence() {
    let store = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let embedder = Arc::new(FlakyEmbedder::new().wrong_dimensions_on("aaaa", 3));
    let writer = build_writer(
        ten_char_chunker(),
        embedder,
        store.clone(),
        writer_config(),
    );
    let err = writer
        .add_memory(NewMemory::new("u1", "aaaaaaaaaa"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MemoryError::DimensionMismatch {
            expected: 8,
            actual: 3
        }
    ));
    assert!(!err.is_retryable());
    assert!(store.records().is_empty());
}

#[test]
fn invalid_writer_config_is_rejected() {
    let store: Arc<dyn VectorStore> = Arc::new(RecordingStore::new(KEYWORDS.len()));
    let err = MemoryWriter::new(
        ten_char_chunker(),
        Arc::new(KeywordEmbedder),
        store,
        WriterConfig {
            max_concurrency: 0,
            ..writer_config()
        },
    )
    .err()
    .expect("config error");
    assert!(matches!(
        err,
        MemoryError::Configuration {
            field: "max_concurrency",
            ..
        }
    ));
}
