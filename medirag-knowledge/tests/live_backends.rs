//! Tests against real backends. Run with
//! `cargo test -p medirag-knowledge --features live-tests` while Redis Stack
//! and Ollama are reachable at the default settings URLs.
#![cfg(feature = "live-tests")]

use std::sync::Arc;

use medirag_core::{EmbeddingSettings, StoreSettings};
use medirag_knowledge::store::{DistanceMetric, FieldKind, FieldSpec, Fields, connect};
use medirag_knowledge::{
    EmbeddingProvider, IndexDescriptor, IndexStatus, OllamaEmbedder, RedisVectorStore, StoreHandle,
    VectorStore,
};

fn scratch_descriptor() -> IndexDescriptor {
    IndexDescriptor::new(
        "medirag_live_test_idx",
        "medirag:live:test:",
        vec![
            FieldSpec::new("title", FieldKind::Text),
            FieldSpec::new("rank", FieldKind::NumericSortable),
            FieldSpec::new("vec", FieldKind::Vector),
        ],
        4,
        DistanceMetric::Cosine,
    )
    .expect("descriptor")
}

#[tokio::test]
async fn test_ollama_embedding_live() {
    let embedder = OllamaEmbedder::new(&EmbeddingSettings::default());
    let inputs = vec!["hello world".to_string(), "ibuprofen dosage".to_string()];
    let vectors = embedder.embed_batch(&inputs).await.expect("embedding request");
    assert_eq!(vectors.len(), inputs.len());
    for vector in &vectors {
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_redis_index_lifecycle_live() {
    let conn = connect(&StoreSettings::default().url).await.expect("redis");
    let store = RedisVectorStore::new(conn, scratch_descriptor());
    store.drop_index().await.expect("drop");
    store.clear().await.expect("clear");

    assert_eq!(store.create_index().await.expect("create"), IndexStatus::Created);
    assert_eq!(
        store.create_index().await.expect("create again"),
        IndexStatus::AlreadyExists
    );

    let fields = |title: &str, rank: i64| {
        Fields::from([
            ("title".to_string(), title.to_string()),
            ("rank".to_string(), rank.to_string()),
        ])
    };
    store.upsert("a", &fields("alpha", 1), &[1.0, 0.0, 0.0, 0.0]).await.expect("upsert");
    store.upsert("b", &fields("beta", 2), &[0.0, 1.0, 0.0, 0.0]).await.expect("upsert");
    store.upsert("a", &fields("alpha", 1), &[1.0, 0.0, 0.0, 0.0]).await.expect("upsert");

    // Indexing is asynchronous on the server side
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let hits = store.search(&[0.9, 0.1, 0.0, 0.0], 5).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "medirag:live:test:a");
    assert!(hits[0].distance <= hits[1].distance);
    assert_eq!(store.count().await.expect("count"), 2);

    let newest = store
        .filter(&medirag_knowledge::FilterQuery::all(1).sorted_by("rank", true))
        .await
        .expect("filter");
    assert_eq!(newest[0].id, "medirag:live:test:b");

    assert_eq!(store.clear().await.expect("clear"), 2);
    assert!(store.drop_index().await.expect("drop"));
    assert!(!store.drop_index().await.expect("drop again"));
}

#[tokio::test]
async fn test_store_handle_shares_connection_live() {
    let handle = StoreHandle::open(&StoreSettings::default())
        .await
        .expect("redis");
    let a: Arc<dyn VectorStore> = handle.store(scratch_descriptor());
    let b: Arc<dyn VectorStore> = handle.store(scratch_descriptor());
    a.create_index().await.expect("create");
    assert_eq!(b.create_index().await.expect("create"), IndexStatus::AlreadyExists);
    a.drop_index().await.expect("drop");
}

#[tokio::test]
async fn test_existing_index_with_other_dimension_live() {
    let descriptor = |dim: usize| {
        IndexDescriptor::new(
            "medirag_live_dim_idx",
            "medirag:live:dim:",
            vec![FieldSpec::new("vec", FieldKind::Vector)],
            dim,
            DistanceMetric::Cosine,
        )
        .expect("descriptor")
    };
    let conn = connect(&StoreSettings::default().url).await.expect("redis");
    let wide = RedisVectorStore::new(conn.clone(), descriptor(8));
    let narrow = RedisVectorStore::new(conn, descriptor(4));
    wide.drop_index().await.expect("drop");
    wide.create_index().await.expect("create");

    let err = narrow.create_index().await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        medirag_knowledge::KnowledgeError::DimensionMismatch {
            expected: 8,
            actual: 4
        }
    ));

    wide.drop_index().await.expect("drop");
}
