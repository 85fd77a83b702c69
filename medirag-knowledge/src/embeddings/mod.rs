//! Text embedding providers.
//!
//! Every provider returns unit-length vectors so cosine distance in the store
//! reduces to a dot product. Providers are plain handles: build one at
//! startup, wrap it in an `Arc`, and hand it to every component that needs it.

mod hash;
#[cfg(feature = "local-embeddings")]
mod local;
mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use medirag_core::{EmbeddingBackend, EmbeddingSettings};

use crate::errors::{KnowledgeError, KnowledgeResult};

pub use hash::HashEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;

/// Maps text to fixed-dimension, L2-normalized vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> KnowledgeResult<Vec<Vec<f32>>>;

    /// Embed a single text.
    ///
    /// Goes through `embed_batch` so single and batched calls agree.
    async fn embed(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match (vectors.pop(), vectors.is_empty()) {
            (Some(vector), true) => Ok(vector),
            _ => Err(KnowledgeError::Embedding(
                "expected exactly one vector for one input".to_string(),
            )),
        }
    }

    /// Declared output dimension.
    fn dimension(&self) -> usize;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

/// Build the provider selected in settings.
pub fn provider_from_settings(
    settings: &EmbeddingSettings,
) -> KnowledgeResult<Arc<dyn EmbeddingProvider>> {
    match settings.backend {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::new(settings))),
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedder::new(settings.dimension))),
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => Ok(Arc::new(LocalEmbedder::new(settings)?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => Err(KnowledgeError::Config(
            "embedding backend \"local\" requires the `local-embeddings` feature".to_string(),
        )),
    }
}

/// Reject inputs no backend can embed meaningfully.
pub(crate) fn validate_inputs(texts: &[String]) -> KnowledgeResult<()> {
    if let Some(position) = texts.iter().position(|text| text.trim().is_empty()) {
        return Err(KnowledgeError::Embedding(format!(
            "empty input at position {position}"
        )));
    }
    Ok(())
}

/// Check dimension and scale to unit length.
///
/// A zero or non-finite vector is an error, never a silent zero embedding.
pub fn normalize(mut vector: Vec<f32>, expected_dim: usize) -> KnowledgeResult<Vec<f32>> {
    if vector.len() != expected_dim {
        return Err(KnowledgeError::DimensionMismatch {
            expected: expected_dim,
            actual: vector.len(),
        });
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm.is_finite() || norm == 0.0 {
        return Err(KnowledgeError::Embedding(format!(
            "cannot normalize vector with norm {norm}"
        )));
    }

    for value in &mut vector {
        *value /= norm;
    }
    Ok(vector)
}

/// Make sure a backend answered with one vector per input.
pub(crate) fn check_count(inputs: usize, vectors: &[Vec<f32>]) -> KnowledgeResult<()> {
    if inputs != vectors.len() {
        return Err(KnowledgeError::Embedding(format!(
            "expected {inputs} vectors, backend returned {}",
            vectors.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let vector = normalize(vec![3.0, 4.0], 2).unwrap();
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_rejects_zero_vector() {
        let err = normalize(vec![0.0; 4], 4).unwrap_err();
        assert!(matches!(err, KnowledgeError::Embedding(_)));
    }

    #[test]
    fn test_normalize_rejects_nan() {
        assert!(normalize(vec![f32::NAN, 1.0], 2).is_err());
    }

    #[test]
    fn test_normalize_dimension_mismatch() {
        let err = normalize(vec![1.0; 3], 4).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validate_inputs_reports_position() {
        let inputs = vec!["ok".to_string(), "  ".to_string()];
        let err = validate_inputs(&inputs).unwrap_err();
        assert!(err.to_string().contains("position 1"));
    }

    #[test]
    fn test_local_backend_needs_feature() {
        let settings = EmbeddingSettings {
            backend: EmbeddingBackend::Local,
            ..Default::default()
        };
        let result = provider_from_settings(&settings);
        if cfg!(feature = "local-embeddings") {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(KnowledgeError::Config(_))));
        }
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn EmbeddingProvider) {}
    }
}
