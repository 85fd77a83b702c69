use async_trait::async_trait;
use medirag_core::EmbeddingSettings;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::info;

use super::{EmbeddingProvider, check_count, normalize, validate_inputs};
use crate::errors::{KnowledgeError, KnowledgeResult};

const PROBE_TEXT: &str = "dimension probe";

/// Embeddings served by an Ollama-compatible `/api/embed` endpoint.
///
/// The remote model is loaded on first use: the first call sends a probe
/// request, which makes the server load the model and lets us verify the
/// dimension it produces. A failed probe is a fatal model-load error.
#[derive(Debug)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    client: reqwest::Client,
    loaded: OnceCell<()>,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Self {
        Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimension: settings.dimension,
            client: reqwest::Client::new(),
            loaded: OnceCell::new(),
        }
    }

    async fn ensure_loaded(&self) -> KnowledgeResult<()> {
        self.loaded
            .get_or_try_init(|| async {
                info!("Loading embedding model {} from {}", self.model, self.base_url);
                let probe = self
                    .request(&[PROBE_TEXT.to_string()])
                    .await
                    .map_err(|e| KnowledgeError::ModelLoad(format!("{}: {e}", self.model)))?;
                let actual = probe.first().map(Vec::len).unwrap_or(0);
                if actual != self.dimension {
                    return Err(KnowledgeError::DimensionMismatch {
                        expected: self.dimension,
                        actual,
                    });
                }
                info!("Embedding model {} ready ({} dims)", self.model, actual);
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn request(&self, inputs: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input: inputs,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(KnowledgeError::Embedding(format!(
                "embedding request failed: {status} {text}"
            )));
        }

        let payload: EmbedResponse = response.json().await?;

        if let Some(embeddings) = payload.embeddings {
            return Ok(embeddings);
        }

        if let Some(embedding) = payload.embedding {
            return Ok(vec![embedding]);
        }

        Err(KnowledgeError::Embedding(
            "embedding response missing vectors".to_string(),
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        validate_inputs(texts)?;
        self.ensure_loaded().await?;

        let raw = self.request(texts).await?;
        check_count(texts.len(), &raw)?;
        raw.into_iter()
            .map(|vector| normalize(vector, self.dimension))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, serde::Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Option<Vec<Vec<f32>>>,
    embedding: Option<Vec<f32>>,
}
