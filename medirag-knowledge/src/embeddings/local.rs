//! In-process embeddings via fastembed.
//!
//! `fastembed::TextEmbedding` is not `Sync`, so the model sits behind a
//! mutex and every call runs on the blocking pool. The model is downloaded
//! and loaded on first use, once per handle.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use medirag_core::EmbeddingSettings;
use tokio::sync::OnceCell;
use tracing::info;

use super::{EmbeddingProvider, check_count, normalize, validate_inputs};
use crate::errors::{KnowledgeError, KnowledgeResult};

fn resolve_model(name: &str) -> KnowledgeResult<fastembed::EmbeddingModel> {
    match name {
        "all-minilm" | "all-minilm-l6-v2" | "AllMiniLML6V2" => {
            Ok(fastembed::EmbeddingModel::AllMiniLML6V2)
        }
        "bge-small-en-v1.5" | "BGESmallENV15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" | "BGEBaseENV15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        other => Err(KnowledgeError::Config(format!(
            "unknown local embedding model '{other}' (supported: all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5)"
        ))),
    }
}

type SharedModel = Arc<Mutex<fastembed::TextEmbedding>>;

pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    cache_dir: Option<PathBuf>,
    dimension: usize,
    handle: OnceCell<SharedModel>,
}

impl LocalEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> KnowledgeResult<Self> {
        Ok(Self {
            model_name: settings.model.clone(),
            model: resolve_model(&settings.model)?,
            cache_dir: settings.cache_dir.clone(),
            dimension: settings.dimension,
            handle: OnceCell::new(),
        })
    }

    async fn model(&self) -> KnowledgeResult<SharedModel> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                info!("Loading local embedding model {}", self.model_name);
                let mut init = fastembed::InitOptions::new(self.model.clone());
                if let Some(dir) = &self.cache_dir {
                    init = init.with_cache_dir(dir.clone());
                }
                let expected = self.dimension;
                let model = tokio::task::spawn_blocking(move || {
                    let mut model = fastembed::TextEmbedding::try_new(init)
                        .map_err(|e| KnowledgeError::ModelLoad(e.to_string()))?;
                    let probe = model
                        .embed(vec!["dimension probe"], None)
                        .map_err(|e| KnowledgeError::ModelLoad(e.to_string()))?;
                    let actual = probe.first().map(Vec::len).unwrap_or(0);
                    if actual != expected {
                        return Err(KnowledgeError::DimensionMismatch { expected, actual });
                    }
                    Ok(model)
                })
                .await
                .map_err(|e| KnowledgeError::ModelLoad(format!("loader task failed: {e}")))??;
                info!("Local embedding model {} ready", self.model_name);
                Ok::<SharedModel, KnowledgeError>(Arc::new(Mutex::new(model)))
            })
            .await?;
        Ok(handle.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        validate_inputs(texts)?;
        let model = self.model().await?;
        let inputs = texts.to_vec();

        let raw = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| KnowledgeError::Embedding(format!("model mutex poisoned: {e}")))?;
            model
                .embed(inputs, None)
                .map_err(|e| KnowledgeError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| KnowledgeError::Embedding(format!("embedding task failed: {e}")))??;

        check_count(texts.len(), &raw)?;
        raw.into_iter()
            .map(|vector| normalize(vector, self.dimension))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for LocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedder")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("loaded", &self.handle.initialized())
            .finish()
    }
}
