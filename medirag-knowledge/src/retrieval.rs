//! Context assembly: decides which corpora to query for a prompt and folds
//! the results into the system instruction and the user prompt.
//!
//! This is the one place where backend failures are downgraded. Transient
//! errors from embedding or search mean "no augmentation from that source";
//! fatal configuration errors propagate.

use std::fmt::Write as _;
use std::sync::Arc;

use medirag_core::RetrievalSettings;
use tracing::{debug, info, warn};

use crate::classifier::QueryClassifier;
use crate::embeddings::EmbeddingProvider;
use crate::errors::{KnowledgeError, KnowledgeResult};
use crate::history::{CURRENT_QUERY_MARKER, Exchange, HISTORY_HEADER, HistoryStore};
use crate::knowledge::{KnowledgeBase, KnowledgeHit};
use crate::templates::TemplateSource;
use crate::translate::Translator;

pub const KNOWLEDGE_HEADER: &str = "Here is relevant information from my medical database:";
pub const KNOWLEDGE_FOOTER: &str = "Use this information if relevant to answer the query.";

/// Which augmentations a single request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetrievalFlags {
    pub persona: bool,
    pub history_rag: bool,
    pub knowledge_rag: bool,
}

impl RetrievalFlags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            persona: true,
            history_rag: true,
            knowledge_rag: true,
        }
    }

    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            persona: settings.persona,
            history_rag: settings.history,
            knowledge_rag: settings.knowledge,
        }
    }
}

/// Tuning knobs that do not change per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalOptions {
    pub knowledge_results: usize,
    pub history_results: usize,
    /// List the newest exchanges when the history similarity search fails.
    pub recency_fallback: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            knowledge_results: 3,
            history_results: 3,
            recency_fallback: false,
        }
    }
}

impl RetrievalOptions {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            knowledge_results: settings.knowledge_results,
            history_results: settings.history_results,
            recency_fallback: settings.recency_fallback,
        }
    }
}

/// Result of context assembly, ready for the composer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    /// System instruction; empty when nothing applies
    pub system: String,
    /// Effective user prompt
    pub prompt: String,
    pub knowledge_hits: Vec<KnowledgeHit>,
    pub history_hits: Vec<Exchange>,
}

#[derive(Clone)]
pub struct RetrievalOrchestrator {
    embedder: Arc<dyn EmbeddingProvider>,
    knowledge: KnowledgeBase,
    history: HistoryStore,
    classifier: QueryClassifier,
    templates: Arc<dyn TemplateSource>,
    translator: Option<Arc<dyn Translator>>,
    options: RetrievalOptions,
}

impl RetrievalOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        knowledge: KnowledgeBase,
        history: HistoryStore,
        classifier: QueryClassifier,
        templates: Arc<dyn TemplateSource>,
        options: RetrievalOptions,
    ) -> Self {
        Self {
            embedder,
            knowledge,
            history,
            classifier,
            templates,
            translator: None,
            options,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    pub fn options(&self) -> RetrievalOptions {
        self.options
    }

    /// Build the system instruction and effective prompt for `prompt`.
    ///
    /// Only fatal errors (missing template, dimension mismatch, model load)
    /// are returned; every other failure yields an unaugmented result.
    pub async fn assemble_context(
        &self,
        prompt: &str,
        flags: RetrievalFlags,
    ) -> KnowledgeResult<AssembledContext> {
        let mut system = if flags.persona {
            self.templates.persona().await?
        } else {
            String::new()
        };

        let knowledge_query = if flags.knowledge_rag {
            let translated = self.translate(prompt).await;
            let in_domain = self.classifier.is_in_domain(prompt)
                || self.classifier.is_in_domain(&translated);
            debug!(in_domain, "Classified prompt for knowledge retrieval");
            in_domain.then_some(translated)
        } else {
            None
        };
        let history_query = flags.history_rag.then_some(prompt);

        let (knowledge_vector, history_vector) = match self
            .embed_queries(knowledge_query.as_deref(), history_query)
            .await
        {
            Ok(vectors) => vectors,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("Embedding failed, continuing without retrieval: {err}");
                (None, None)
            }
        };

        let knowledge_search = async {
            match &knowledge_vector {
                Some(vector) => degrade(
                    "knowledge",
                    self.knowledge
                        .search(vector, self.options.knowledge_results)
                        .await,
                ),
                None => Ok(Vec::new()),
            }
        };
        let history_search = async {
            match &history_vector {
                Some(vector) => self.search_history(vector).await,
                None if flags.history_rag && self.options.recency_fallback => {
                    self.recent_history().await
                }
                None => Ok(Vec::new()),
            }
        };
        let (knowledge_hits, history_hits) = tokio::join!(knowledge_search, history_search);
        let knowledge_hits = knowledge_hits?;
        let history_hits = history_hits?;

        if !knowledge_hits.is_empty() {
            let template = self.templates.knowledge_rag().await?;
            let block = format_knowledge_block(&knowledge_hits);
            system = if template.trim().is_empty() {
                block
            } else {
                format!("{}\n\n{}", template.trim_end(), block)
            };
        }

        let effective_prompt = if history_hits.is_empty() {
            prompt.to_string()
        } else {
            format_history_block(&history_hits, prompt)
        };

        info!(
            knowledge = knowledge_hits.len(),
            history = history_hits.len(),
            "Assembled context"
        );
        Ok(AssembledContext {
            system,
            prompt: effective_prompt,
            knowledge_hits,
            history_hits,
        })
    }

    async fn translate(&self, prompt: &str) -> String {
        let Some(translator) = &self.translator else {
            return prompt.to_string();
        };
        match translator.translate(prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => prompt.to_string(),
            Err(err) => {
                warn!("Translation failed, using original prompt: {err}");
                prompt.to_string()
            }
        }
    }

    /// Embed the texts the two searches need, once when they coincide.
    async fn embed_queries(
        &self,
        knowledge: Option<&str>,
        history: Option<&str>,
    ) -> KnowledgeResult<(Option<Vec<f32>>, Option<Vec<f32>>)> {
        match (knowledge, history) {
            (None, None) => Ok((None, None)),
            (Some(text), None) => Ok((Some(self.embedder.embed(text).await?), None)),
            (None, Some(text)) => Ok((None, Some(self.embedder.embed(text).await?))),
            (Some(k), Some(h)) if k == h => {
                let vector = self.embedder.embed(k).await?;
                Ok((Some(vector.clone()), Some(vector)))
            }
            (Some(k), Some(h)) => {
                let mut vectors = self
                    .embedder
                    .embed_batch(&[k.to_string(), h.to_string()])
                    .await?
                    .into_iter();
                match (vectors.next(), vectors.next()) {
                    (Some(kv), Some(hv)) => Ok((Some(kv), Some(hv))),
                    _ => Err(KnowledgeError::Embedding(
                        "expected two vectors for two inputs".to_string(),
                    )),
                }
            }
        }
    }

    async fn search_history(&self, vector: &[f32]) -> KnowledgeResult<Vec<Exchange>> {
        match self
            .history
            .search(vector, self.options.history_results)
            .await
        {
            Ok(hits) => Ok(hits.into_iter().map(|hit| hit.exchange).collect()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) if self.options.recency_fallback => {
                warn!("History search failed, falling back to recent exchanges: {err}");
                self.recent_history().await
            }
            Err(err) => degrade("history", Err(err)),
        }
    }

    async fn recent_history(&self) -> KnowledgeResult<Vec<Exchange>> {
        degrade(
            "recent history",
            self.history.recent(self.options.history_results).await,
        )
    }
}

impl std::fmt::Debug for RetrievalOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalOrchestrator")
            .field("embedder", &self.embedder.name())
            .field("knowledge", &self.knowledge)
            .field("history", &self.history)
            .field("translator", &self.translator.is_some())
            .field("options", &self.options)
            .finish()
    }
}

fn degrade<T>(source: &str, result: KnowledgeResult<Vec<T>>) -> KnowledgeResult<Vec<T>> {
    match result {
        Ok(items) => Ok(items),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!("Skipping {source} augmentation: {err}");
            Ok(Vec::new())
        }
    }
}

/// Numbered medicine block appended to the system instruction.
pub fn format_knowledge_block(hits: &[KnowledgeHit]) -> String {
    let mut block = format!("{KNOWLEDGE_HEADER}\n\n");
    for (idx, hit) in hits.iter().enumerate() {
        let record = &hit.record;
        let _ = writeln!(block, "[Item {}]", idx + 1);
        let _ = writeln!(block, "Medicine: {}", record.name);
        let _ = writeln!(block, "Composition: {}", record.composition);
        let _ = writeln!(block, "Uses: {}", record.uses);
        let _ = writeln!(block, "Side Effects: {}", record.side_effects);
        let _ = writeln!(block, "Manufacturer: {}", record.manufacturer);
    }
    block.push_str(KNOWLEDGE_FOOTER);
    block
}

/// Past exchanges, in the given order, followed by the current prompt.
pub fn format_history_block(exchanges: &[Exchange], prompt: &str) -> String {
    let mut block = format!("{HISTORY_HEADER}\n\n");
    for exchange in exchanges {
        let _ = writeln!(block, "[{}]", exchange.local_time_label());
        let _ = writeln!(block, "User: {}", exchange.prompt);
        let _ = writeln!(block, "Assistant: {}\n", exchange.response);
    }
    block.push_str(CURRENT_QUERY_MARKER);
    block.push_str(prompt);
    block
}
