use async_trait::async_trait;

use crate::errors::KnowledgeResult;

/// Optional pre-pass rewriting a prompt into the knowledge base language.
///
/// Callers treat any error as "use the original text".
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> KnowledgeResult<String>;
}
