//! Generic ANN-indexed record storage.
//!
//! One `VectorStore` instance serves one corpus, described by an
//! [`IndexDescriptor`]. The knowledge base and the history log are both thin
//! typed wrappers over this trait.

mod descriptor;
mod memory;
mod redisearch;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use medirag_core::{StoreBackend, StoreSettings};

use crate::errors::KnowledgeResult;

pub use descriptor::{DistanceMetric, FieldKind, FieldSpec, IndexDescriptor};
pub use memory::MemoryVectorStore;
pub use redisearch::{RedisVectorStore, connect};

/// Scalar fields of one record, by field name.
pub type Fields = BTreeMap<String, String>;

/// One KNN result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub distance: f32,
    pub fields: Fields,
}

/// One record returned by a filter query.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub fields: Fields,
}

/// Exact predicate on a scalar field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPredicate {
    /// Every word of `value` occurs in the text field
    Text { field: String, value: String },
    /// The tag field equals `value` (case-insensitive)
    Tag { field: String, value: String },
    /// Inclusive numeric range, open on a missing side
    Range {
        field: String,
        min: Option<f64>,
        max: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortBy {
    pub field: String,
    pub descending: bool,
}

/// Predicates are AND-ed; no predicate matches the whole corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterQuery {
    pub predicates: Vec<FieldPredicate>,
    pub sort_by: Option<SortBy>,
    pub limit: usize,
}

impl FilterQuery {
    pub fn all(limit: usize) -> Self {
        Self {
            predicates: Vec::new(),
            sort_by: None,
            limit,
        }
    }

    pub fn with(mut self, predicate: FieldPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_by = Some(SortBy {
            field: field.into(),
            descending,
        });
        self
    }
}

/// Outcome of `create_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn descriptor(&self) -> &IndexDescriptor;

    /// Create the index unless one with the same name exists.
    async fn create_index(&self) -> KnowledgeResult<IndexStatus>;

    /// Drop the index definition (records stay). Returns whether an index
    /// was actually dropped.
    async fn drop_index(&self) -> KnowledgeResult<bool>;

    /// Write scalar fields and vector as one record, replacing any previous
    /// record under the same id.
    async fn upsert(&self, id: &str, fields: &Fields, vector: &[f32]) -> KnowledgeResult<()>;

    /// KNN search, most similar first, at most `k` hits.
    async fn search(&self, vector: &[f32], k: usize) -> KnowledgeResult<Vec<SearchHit>>;

    /// Exact lookup without vector math.
    async fn filter(&self, query: &FilterQuery) -> KnowledgeResult<Vec<StoredRecord>>;

    /// Delete every record under the corpus prefix. Returns the number of
    /// deleted records.
    async fn clear(&self) -> KnowledgeResult<usize>;

    /// Number of indexed records.
    async fn count(&self) -> KnowledgeResult<usize>;
}

/// Backing connection shared by every store of one engine.
#[derive(Clone)]
pub enum StoreHandle {
    Redis(redis::aio::ConnectionManager),
    Memory,
}

impl StoreHandle {
    /// Open the backend selected in settings, once per process.
    pub async fn open(settings: &StoreSettings) -> KnowledgeResult<Self> {
        match settings.backend {
            StoreBackend::Redis => Ok(Self::Redis(connect(&settings.url).await?)),
            StoreBackend::Memory => Ok(Self::Memory),
        }
    }

    /// Instantiate a store for one corpus on this backend.
    pub fn store(&self, descriptor: IndexDescriptor) -> Arc<dyn VectorStore> {
        match self {
            Self::Redis(conn) => Arc::new(RedisVectorStore::new(conn.clone(), descriptor)),
            Self::Memory => Arc::new(MemoryVectorStore::new(descriptor)),
        }
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redis(_) => f.write_str("StoreHandle::Redis"),
            Self::Memory => f.write_str("StoreHandle::Memory"),
        }
    }
}
