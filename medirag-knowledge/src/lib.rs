//! Context retrieval and prompt assembly for medirag.
//!
//! Two corpora live in a vector store: a read-only medicine knowledge base
//! and an append-only conversation log. For each prompt the engine decides
//! which of them to consult, folds the results into a system instruction and
//! a user prompt, and records the exchange once the model has answered.

pub mod classifier;
pub mod compose;
pub mod embeddings;
pub mod engine;
pub mod errors;
pub mod history;
pub mod knowledge;
pub mod recorder;
pub mod retrieval;
pub mod store;
pub mod templates;
pub mod translate;

pub use classifier::QueryClassifier;
pub use compose::{InstructionMessage, InstructionPair, MessageRole, PromptComposer};
pub use embeddings::{EmbeddingProvider, HashEmbedder, OllamaEmbedder, provider_from_settings};
#[cfg(feature = "local-embeddings")]
pub use embeddings::LocalEmbedder;
pub use engine::{Corpus, KnowledgeEngine};
pub use errors::{KnowledgeError, KnowledgeResult};
pub use history::{Exchange, HistoryHit, HistoryStore, strip_history_block};
pub use knowledge::{KnowledgeBase, KnowledgeHit, MedicineRecord};
pub use recorder::{ExchangeClock, ExchangeRecorder};
pub use retrieval::{AssembledContext, RetrievalFlags, RetrievalOptions, RetrievalOrchestrator};
pub use store::{
    FilterQuery, IndexDescriptor, IndexStatus, MemoryVectorStore, RedisVectorStore, StoreHandle,
    VectorStore,
};
pub use templates::{FileTemplates, StaticTemplates, TemplateSource};
pub use translate::Translator;
