use async_trait::async_trait;

use super::{EmbeddingProvider, normalize, validate_inputs};
use crate::errors::{KnowledgeError, KnowledgeResult};

/// Deterministic hashed bag-of-words embedder.
///
/// Each lowercase word bumps one bucket. Texts sharing words end up
/// close in cosine space, identical texts map to identical vectors. Useful
/// offline and in tests, useless for real semantics.
///
/// Buckets come from BLAKE3, so vectors stay valid across builds and can be
/// persisted in Redis.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> KnowledgeResult<Vec<f32>> {
        if self.dimension == 0 {
            return Err(KnowledgeError::Config(
                "hash embedder dimension must be non-zero".to_string(),
            ));
        }
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            vector[bucket(token, self.dimension)] += 1.0;
        }
        normalize(vector, self.dimension)
    }
}

fn bucket(token: &str, dimension: usize) -> usize {
    let digest = blake3::hash(token.to_lowercase().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % dimension as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> KnowledgeResult<Vec<Vec<f32>>> {
        validate_inputs(texts)?;
        texts.iter().map(|text| self.embed_one(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(vector: &[f32]) -> f32 {
        vector.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_buckets_are_stable() {
        assert_eq!(bucket("ibuprofen", 64), 26);
        assert_eq!(bucket("DOSAGE", 64), 0);
        assert_eq!(bucket("aspirin", 64), 22);
    }

    #[tokio::test]
    async fn test_single_word_vector() {
        let vector = HashEmbedder::new(64).embed("Ibuprofen").await.unwrap();
        assert_eq!(vector[26], 1.0);
        assert_eq!(vector.iter().filter(|x| **x != 0.0).count(), 1);
    }

    #[tokio::test]
    async fn test_unit_norm() {
        let embedder = HashEmbedder::new(64);
        for text in ["What is the dosage for ibuprofen?", "hello", "Quanto costa?"] {
            let vector = embedder.embed(text).await.unwrap();
            assert_eq!(vector.len(), 64);
            assert!((norm(&vector) - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let embedder = HashEmbedder::new(32);
        let texts = vec![
            "aspirin side effects".to_string(),
            "weather in Rome".to_string(),
            "paracetamolo dosaggio".to_string(),
        ];
        let batch = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(&embedder.embed(text).await.unwrap(), vector);
        }
    }

    #[tokio::test]
    async fn test_case_insensitive_and_similar() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed("Ibuprofen dosage").await.unwrap();
        let b = embedder.embed("ibuprofen DOSAGE").await.unwrap();
        let c = embedder.embed("train timetable tomorrow").await.unwrap();
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
        assert!(dot(&a, &c) < dot(&a, &b));
    }

    #[tokio::test]
    async fn test_empty_and_symbol_only_inputs_fail() {
        let embedder = HashEmbedder::new(16);
        assert!(matches!(
            embedder.embed("").await,
            Err(KnowledgeError::Embedding(_))
        ));
        assert!(matches!(
            embedder.embed("?!").await,
            Err(KnowledgeError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
