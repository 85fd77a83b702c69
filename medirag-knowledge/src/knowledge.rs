//! Medicine knowledge base: typed view over the `medicine_idx` corpus.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::EmbeddingProvider;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::store::{
    DistanceMetric, FieldKind, FieldSpec, Fields, FilterQuery, IndexDescriptor, VectorStore,
};

pub const MEDICINE_INDEX: &str = "medicine_idx";
pub const MEDICINE_PREFIX: &str = "medicine:";
pub const MEDICINE_VECTOR_FIELD: &str = "content_vector";

/// One medicine entry of the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineRecord {
    pub id: String,
    pub name: String,
    pub composition: String,
    pub uses: String,
    pub side_effects: String,
    pub manufacturer: String,
    /// Free-text summary; defaults to [`MedicineRecord::canonical_text`].
    #[serde(default)]
    pub combined_text: String,
}

impl MedicineRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        composition: impl Into<String>,
        uses: impl Into<String>,
        side_effects: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        let mut record = Self {
            id: id.into(),
            name: name.into(),
            composition: composition.into(),
            uses: uses.into(),
            side_effects: side_effects.into(),
            manufacturer: manufacturer.into(),
            combined_text: String::new(),
        };
        record.combined_text = record.canonical_text();
        record
    }

    /// Concatenation of every field; this is the text that gets embedded.
    pub fn canonical_text(&self) -> String {
        fn or_na(value: &str) -> &str {
            if value.trim().is_empty() { "N/A" } else { value }
        }
        format!(
            "Name: {}. Composition: {}. Uses: {}. Side Effects: {}. Manufacturer: {}.",
            or_na(&self.name),
            or_na(&self.composition),
            or_na(&self.uses),
            or_na(&self.side_effects),
            or_na(&self.manufacturer)
        )
    }

    fn embedding_text(&self) -> String {
        if self.combined_text.trim().is_empty() {
            self.canonical_text()
        } else {
            self.combined_text.clone()
        }
    }

    pub fn to_fields(&self) -> Fields {
        Fields::from([
            ("name".to_string(), self.name.clone()),
            ("composition".to_string(), self.composition.clone()),
            ("uses".to_string(), self.uses.clone()),
            ("side_effects".to_string(), self.side_effects.clone()),
            ("manufacturer".to_string(), self.manufacturer.clone()),
            ("combined_text".to_string(), self.embedding_text()),
        ])
    }

    /// Rebuild a record from stored fields. Only `name` is mandatory;
    /// loaders may leave the other columns out.
    pub fn from_fields(id: &str, fields: &Fields) -> KnowledgeResult<Self> {
        let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
        let name = fields
            .get("name")
            .cloned()
            .ok_or_else(|| KnowledgeError::MissingField(format!("{id}: name")))?;
        Ok(Self {
            id: id.to_string(),
            name,
            composition: get("composition"),
            uses: get("uses"),
            side_effects: get("side_effects"),
            manufacturer: get("manufacturer"),
            combined_text: get("combined_text"),
        })
    }
}

/// Schema of the medicine corpus for a given embedding dimension.
pub fn medicine_descriptor(dimension: usize) -> KnowledgeResult<IndexDescriptor> {
    IndexDescriptor::new(
        MEDICINE_INDEX,
        MEDICINE_PREFIX,
        vec![
            FieldSpec::new("name", FieldKind::Text),
            FieldSpec::new("composition", FieldKind::Text),
            FieldSpec::new("uses", FieldKind::Text),
            FieldSpec::new("side_effects", FieldKind::Text),
            FieldSpec::new("manufacturer", FieldKind::Tag),
            FieldSpec::new("combined_text", FieldKind::Text),
            FieldSpec::new(MEDICINE_VECTOR_FIELD, FieldKind::Vector),
        ],
        dimension,
        DistanceMetric::Cosine,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeHit {
    pub record: MedicineRecord,
    pub distance: f32,
}

#[derive(Clone)]
pub struct KnowledgeBase {
    store: Arc<dyn VectorStore>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub async fn search(&self, vector: &[f32], k: usize) -> KnowledgeResult<Vec<KnowledgeHit>> {
        let hits = self.store.search(vector, k).await?;
        debug!("Knowledge search returned {} hits", hits.len());
        hits.into_iter()
            .map(|hit| {
                Ok(KnowledgeHit {
                    record: MedicineRecord::from_fields(&hit.id, &hit.fields)?,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    pub async fn filter(&self, query: &FilterQuery) -> KnowledgeResult<Vec<MedicineRecord>> {
        self.store
            .filter(query)
            .await?
            .iter()
            .map(|record| MedicineRecord::from_fields(&record.id, &record.fields))
            .collect()
    }

    pub async fn upsert(&self, record: &MedicineRecord, vector: &[f32]) -> KnowledgeResult<()> {
        self.store.upsert(&record.id, &record.to_fields(), vector).await
    }

    /// Embed and store records; one embedding call for the whole batch.
    pub async fn ingest(
        &self,
        embedder: &dyn EmbeddingProvider,
        records: &[MedicineRecord],
    ) -> KnowledgeResult<usize> {
        let texts: Vec<String> = records.iter().map(MedicineRecord::embedding_text).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        for (record, vector) in records.iter().zip(&vectors) {
            self.upsert(record, vector).await?;
        }
        Ok(records.len())
    }
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("index", &self.store.descriptor().name())
            .finish()
    }
}
