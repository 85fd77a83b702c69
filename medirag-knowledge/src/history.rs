//! Conversation log: typed view over the `chat_history_idx` corpus.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::store::{
    DistanceMetric, FieldKind, FieldSpec, Fields, FilterQuery, IndexDescriptor, VectorStore,
};

pub const HISTORY_INDEX: &str = "chat_history_idx";
pub const HISTORY_PREFIX: &str = "chat:history:";
pub const HISTORY_VECTOR_FIELD: &str = "prompt_vector";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// First line of an assembled history block.
pub const HISTORY_HEADER: &str = "Here is our previous conversation that might be relevant:";
/// Separates an assembled history block from the prompt it wraps.
pub const CURRENT_QUERY_MARKER: &str = "Current query: ";

/// One recorded prompt/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: String,
    pub prompt: String,
    pub response: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl Exchange {
    pub fn new(
        timestamp: i64,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("{HISTORY_PREFIX}{timestamp}"),
            prompt: prompt.into(),
            response: response.into(),
            timestamp,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_default()
    }

    /// Timestamp rendered in local time for prompt blocks.
    pub fn local_time_label(&self) -> String {
        self.created_at()
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    pub fn combined_text(&self) -> String {
        format!("User: {}\nAI: {}", self.prompt, self.response)
    }

    pub fn to_fields(&self) -> Fields {
        Fields::from([
            ("prompt".to_string(), self.prompt.clone()),
            ("response".to_string(), self.response.clone()),
            (TIMESTAMP_FIELD.to_string(), self.timestamp.to_string()),
            ("combined_text".to_string(), self.combined_text()),
        ])
    }

    pub fn from_fields(id: &str, fields: &Fields) -> KnowledgeResult<Self> {
        let field = |name: &str| {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| KnowledgeError::MissingField(format!("{id}: {name}")))
        };
        let raw_timestamp = field(TIMESTAMP_FIELD)?;
        let timestamp = raw_timestamp.parse::<i64>().map_err(|e| {
            KnowledgeError::MalformedReply(format!("{id}: bad timestamp {raw_timestamp}: {e}"))
        })?;
        Ok(Self {
            id: id.to_string(),
            prompt: field("prompt")?,
            response: field("response")?,
            timestamp,
        })
    }
}

/// Remove an assembled history block, keeping only the wrapped prompt.
///
/// The block's own marker is the first one that opens a paragraph; any
/// later marker belongs to the wrapped prompt. Nested blocks are unwrapped
/// until none is left. Text without a leading header is returned unchanged.
pub fn strip_history_block(prompt: &str) -> &str {
    let mut current = prompt;
    loop {
        let body = current.trim_start();
        if !body.starts_with(HISTORY_HEADER) {
            break;
        }
        let marker = body
            .match_indices(CURRENT_QUERY_MARKER)
            .map(|(pos, _)| pos)
            .find(|pos| body[..*pos].ends_with("\n\n"));
        match marker {
            Some(pos) => current = &body[pos + CURRENT_QUERY_MARKER.len()..],
            None => break,
        }
    }
    current
}

pub fn history_descriptor(dimension: usize) -> KnowledgeResult<IndexDescriptor> {
    IndexDescriptor::new(
        HISTORY_INDEX,
        HISTORY_PREFIX,
        vec![
            FieldSpec::new("prompt", FieldKind::Text),
            FieldSpec::new("response", FieldKind::Text),
            FieldSpec::new(TIMESTAMP_FIELD, FieldKind::NumericSortable),
            FieldSpec::new("combined_text", FieldKind::Text),
            FieldSpec::new(HISTORY_VECTOR_FIELD, FieldKind::Vector),
        ],
        dimension,
        DistanceMetric::Cosine,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryHit {
    pub exchange: Exchange,
    pub distance: f32,
}

#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn VectorStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Persist one exchange; `vector` is the embedding of its prompt.
    pub async fn append(&self, exchange: &Exchange, vector: &[f32]) -> KnowledgeResult<()> {
        self.store
            .upsert(&exchange.id, &exchange.to_fields(), vector)
            .await
    }

    /// Most similar past exchanges first.
    pub async fn search(&self, vector: &[f32], k: usize) -> KnowledgeResult<Vec<HistoryHit>> {
        let hits = self.store.search(vector, k).await?;
        debug!("History search returned {} hits", hits.len());
        hits.into_iter()
            .map(|hit| {
                Ok(HistoryHit {
                    exchange: Exchange::from_fields(&hit.id, &hit.fields)?,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// Newest exchanges first.
    pub async fn recent(&self, limit: usize) -> KnowledgeResult<Vec<Exchange>> {
        let query = FilterQuery::all(limit).sorted_by(TIMESTAMP_FIELD, true);
        self.store
            .filter(&query)
            .await?
            .iter()
            .map(|record| Exchange::from_fields(&record.id, &record.fields))
            .collect()
    }

    /// Delete the whole log. Returns the number of removed records.
    pub async fn clear(&self) -> KnowledgeResult<usize> {
        self.store.clear().await
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("index", &self.store.descriptor().name())
            .finish()
    }
}
