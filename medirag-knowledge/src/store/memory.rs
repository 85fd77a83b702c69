//! Process-local store with the same observable contract as the Redis one.
//!
//! Search is exact (brute force), which trivially satisfies the ANN
//! contract. Like RediSearch, records can be written before the index
//! exists, but searching a missing index fails.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;

use super::{
    FieldKind, FieldPredicate, Fields, FilterQuery, IndexDescriptor, IndexStatus, SearchHit,
    StoredRecord, VectorStore,
};
use crate::errors::{KnowledgeError, KnowledgeResult};

#[derive(Debug, Clone)]
struct MemoryRecord {
    fields: Fields,
    vector: Vec<f32>,
}

#[derive(Debug)]
pub struct MemoryVectorStore {
    descriptor: IndexDescriptor,
    records: RwLock<HashMap<String, MemoryRecord>>,
    indexed: AtomicBool,
    available: AtomicBool,
}

impl MemoryVectorStore {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            descriptor,
            records: RwLock::new(HashMap::new()),
            indexed: AtomicBool::new(false),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    fn ensure_available(&self) -> KnowledgeResult<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(KnowledgeError::StoreUnavailable(format!(
                "memory store {} is offline",
                self.descriptor.name()
            )))
        }
    }

    fn ensure_indexed(&self) -> KnowledgeResult<()> {
        self.ensure_available()?;
        if self.indexed.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(KnowledgeError::UnknownIndex(self.descriptor.name().to_string()))
        }
    }

    fn read(&self) -> KnowledgeResult<std::sync::RwLockReadGuard<'_, HashMap<String, MemoryRecord>>> {
        self.records
            .read()
            .map_err(|e| KnowledgeError::StoreUnavailable(format!("lock poisoned: {e}")))
    }

    fn write(
        &self,
    ) -> KnowledgeResult<std::sync::RwLockWriteGuard<'_, HashMap<String, MemoryRecord>>> {
        self.records
            .write()
            .map_err(|e| KnowledgeError::StoreUnavailable(format!("lock poisoned: {e}")))
    }

    fn matches(&self, fields: &Fields, predicate: &FieldPredicate) -> bool {
        match predicate {
            FieldPredicate::Text { field, value } => {
                let Some(text) = fields.get(field) else {
                    return false;
                };
                let haystack = text.to_lowercase();
                value
                    .split_whitespace()
                    .all(|word| haystack.contains(&word.to_lowercase()))
            }
            FieldPredicate::Tag { field, value } => fields
                .get(field)
                .is_some_and(|tag| tag.eq_ignore_ascii_case(value)),
            FieldPredicate::Range { field, min, max } => {
                let Some(number) = fields.get(field).and_then(|v| v.parse::<f64>().ok()) else {
                    return false;
                };
                min.is_none_or(|min| number >= min) && max.is_none_or(|max| number <= max)
            }
        }
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn compare_values(a: Option<&String>, b: Option<&String>, numeric: bool) -> Ordering {
    if numeric {
        let a = a.and_then(|v| v.parse::<f64>().ok());
        let b = b.and_then(|v| v.parse::<f64>().ok());
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    } else {
        a.cmp(&b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    async fn create_index(&self) -> KnowledgeResult<IndexStatus> {
        self.ensure_available()?;
        if self.indexed.swap(true, AtomicOrdering::SeqCst) {
            Ok(IndexStatus::AlreadyExists)
        } else {
            Ok(IndexStatus::Created)
        }
    }

    async fn drop_index(&self) -> KnowledgeResult<bool> {
        self.ensure_available()?;
        Ok(self.indexed.swap(false, AtomicOrdering::SeqCst))
    }

    async fn upsert(&self, id: &str, fields: &Fields, vector: &[f32]) -> KnowledgeResult<()> {
        self.ensure_available()?;
        self.descriptor.check_vector(vector)?;
        let key = self.descriptor.key_for(id);
        self.write()?.insert(
            key,
            MemoryRecord {
                fields: fields.clone(),
                vector: vector.to_vec(),
            },
        );
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> KnowledgeResult<Vec<SearchHit>> {
        self.ensure_indexed()?;
        self.descriptor.check_vector(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let records = self.read()?;
        let mut hits: Vec<SearchHit> = records
            .iter()
            .map(|(id, record)| SearchHit {
                id: id.clone(),
                distance: cosine_distance(vector, &record.vector),
                fields: record.fields.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn filter(&self, query: &FilterQuery) -> KnowledgeResult<Vec<StoredRecord>> {
        self.ensure_indexed()?;
        let records = self.read()?;
        let mut matched: Vec<StoredRecord> = records
            .iter()
            .filter(|(_, record)| {
                query
                    .predicates
                    .iter()
                    .all(|predicate| self.matches(&record.fields, predicate))
            })
            .map(|(id, record)| StoredRecord {
                id: id.clone(),
                fields: record.fields.clone(),
            })
            .collect();

        matched.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(sort) = &query.sort_by {
            let numeric =
                self.descriptor.field_kind(&sort.field) == Some(FieldKind::NumericSortable);
            matched.sort_by(|a, b| {
                let ordering =
                    compare_values(a.fields.get(&sort.field), b.fields.get(&sort.field), numeric);
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        matched.truncate(query.limit);
        Ok(matched)
    }

    async fn clear(&self) -> KnowledgeResult<usize> {
        self.ensure_available()?;
        let mut records = self.write()?;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn count(&self) -> KnowledgeResult<usize> {
        self.ensure_indexed()?;
        Ok(self.read()?.len())
    }
}
