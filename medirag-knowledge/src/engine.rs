use std::sync::Arc;

use medirag_core::Settings;
use tracing::info;

use crate::classifier::QueryClassifier;
use crate::compose::{InstructionPair, PromptComposer};
use crate::embeddings::{EmbeddingProvider, provider_from_settings};
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::history::{Exchange, HistoryStore, history_descriptor};
use crate::knowledge::{KnowledgeBase, medicine_descriptor};
use crate::recorder::ExchangeRecorder;
use crate::retrieval::{AssembledContext, RetrievalFlags, RetrievalOptions, RetrievalOrchestrator};
use crate::store::{IndexStatus, StoreHandle, VectorStore};
use crate::templates::{FileTemplates, TemplateSource};
use crate::translate::Translator;

/// Which corpora a maintenance command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corpus {
    Knowledge,
    History,
}

/// Fully wired retrieval engine.
///
/// Every shared resource (store connection, embedding model) is owned here
/// and handed to the components that need it. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct KnowledgeEngine {
    orchestrator: RetrievalOrchestrator,
    composer: PromptComposer,
    recorder: ExchangeRecorder,
}

impl KnowledgeEngine {
    /// Connect to the configured backends and wire the engine.
    pub async fn open(settings: &Settings) -> KnowledgeResult<Self> {
        let embedder = provider_from_settings(&settings.embedding)?;
        let handle = StoreHandle::open(&settings.store).await?;
        let dimension = settings.embedding.dimension;
        let knowledge = handle.store(medicine_descriptor(dimension)?);
        let history = handle.store(history_descriptor(dimension)?);
        let templates = Arc::new(FileTemplates::from_settings(&settings.templates));
        info!(
            "Knowledge engine ready (embedder {}, store {:?})",
            embedder.name(),
            handle
        );
        Self::from_parts(settings, embedder, knowledge, history, templates)
    }

    /// Wire an engine from already-built parts.
    ///
    /// Fails when either store was declared with a dimension the embedder
    /// does not produce.
    pub fn from_parts(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        knowledge: Arc<dyn VectorStore>,
        history: Arc<dyn VectorStore>,
        templates: Arc<dyn TemplateSource>,
    ) -> KnowledgeResult<Self> {
        for store in [&knowledge, &history] {
            let declared = store.descriptor().dimension();
            if declared != embedder.dimension() {
                return Err(KnowledgeError::DimensionMismatch {
                    expected: declared,
                    actual: embedder.dimension(),
                });
            }
        }

        let knowledge = KnowledgeBase::new(knowledge);
        let history = HistoryStore::new(history);
        let classifier =
            QueryClassifier::with_extra_terms(&settings.retrieval.extra_domain_terms);
        let recorder = ExchangeRecorder::new(embedder.clone(), history.clone());
        let orchestrator = RetrievalOrchestrator::new(
            embedder,
            knowledge,
            history,
            classifier,
            templates,
            RetrievalOptions::from_settings(&settings.retrieval),
        );

        Ok(Self {
            orchestrator,
            composer: PromptComposer::new(settings.model.default_system.clone()),
            recorder,
        })
    }

    /// Install the translation pre-pass.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.orchestrator = self.orchestrator.with_translator(translator);
        self
    }

    pub fn orchestrator(&self) -> &RetrievalOrchestrator {
        &self.orchestrator
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        self.orchestrator.knowledge()
    }

    pub fn history(&self) -> &HistoryStore {
        self.orchestrator.history()
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        self.orchestrator.embedder()
    }

    pub fn recorder(&self) -> &ExchangeRecorder {
        &self.recorder
    }

    fn corpus_store(&self, corpus: Corpus) -> &Arc<dyn VectorStore> {
        match corpus {
            Corpus::Knowledge => self.knowledge().store(),
            Corpus::History => self.history().store(),
        }
    }

    /// Create the index of `corpus` unless it already exists.
    pub async fn create_index(&self, corpus: Corpus) -> KnowledgeResult<IndexStatus> {
        self.corpus_store(corpus).create_index().await
    }

    /// Drop the index of `corpus`; records stay in place.
    pub async fn drop_index(&self, corpus: Corpus) -> KnowledgeResult<bool> {
        self.corpus_store(corpus).drop_index().await
    }

    /// Create both indexes, skipping existing ones.
    pub async fn ensure_indexes(&self) -> KnowledgeResult<()> {
        for corpus in [Corpus::Knowledge, Corpus::History] {
            let status = self.create_index(corpus).await?;
            info!("Index for {:?}: {:?}", corpus, status);
        }
        Ok(())
    }

    pub async fn assemble_context(
        &self,
        prompt: &str,
        flags: RetrievalFlags,
    ) -> KnowledgeResult<AssembledContext> {
        self.orchestrator.assemble_context(prompt, flags).await
    }

    pub fn compose(&self, context: &AssembledContext) -> InstructionPair {
        self.composer.compose(&context.system, &context.prompt)
    }

    pub async fn record(&self, prompt: &str, response: &str) -> KnowledgeResult<Exchange> {
        self.recorder.record(prompt, response).await
    }
}
