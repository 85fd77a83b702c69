//! System-instruction templates.
//!
//! Templates are read on every call so operators can edit them while the
//! service runs. A missing template is a configuration error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use medirag_core::TemplateSettings;

use crate::errors::{KnowledgeError, KnowledgeResult};

#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Voice/behavior instruction used when the persona flag is set.
    async fn persona(&self) -> KnowledgeResult<String>;

    /// Instruction used when knowledge context is supplied.
    async fn knowledge_rag(&self) -> KnowledgeResult<String>;
}

/// Templates read from files on disk.
#[derive(Debug, Clone)]
pub struct FileTemplates {
    persona: PathBuf,
    knowledge_rag: PathBuf,
}

impl FileTemplates {
    pub fn new(persona: impl Into<PathBuf>, knowledge_rag: impl Into<PathBuf>) -> Self {
        Self {
            persona: persona.into(),
            knowledge_rag: knowledge_rag.into(),
        }
    }

    pub fn from_settings(settings: &TemplateSettings) -> Self {
        Self::new(settings.persona_path(), settings.knowledge_rag_path())
    }
}

async fn read_template(path: &Path) -> KnowledgeResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| KnowledgeError::MissingTemplate {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl TemplateSource for FileTemplates {
    async fn persona(&self) -> KnowledgeResult<String> {
        read_template(&self.persona).await
    }

    async fn knowledge_rag(&self) -> KnowledgeResult<String> {
        read_template(&self.knowledge_rag).await
    }
}

/// Fixed in-memory templates.
#[derive(Debug, Clone)]
pub struct StaticTemplates {
    pub persona: String,
    pub knowledge_rag: String,
}

impl StaticTemplates {
    pub fn new(persona: impl Into<String>, knowledge_rag: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            knowledge_rag: knowledge_rag.into(),
        }
    }
}

#[async_trait]
impl TemplateSource for StaticTemplates {
    async fn persona(&self) -> KnowledgeResult<String> {
        Ok(self.persona.clone())
    }

    async fn knowledge_rag(&self) -> KnowledgeResult<String> {
        Ok(self.knowledge_rag.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_templates_reload_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let persona = dir.path().join("persona.md");
        std::fs::write(&persona, "You are Dr. House.").unwrap();
        let templates = FileTemplates::new(&persona, dir.path().join("knowledge_rag.md"));

        assert_eq!(templates.persona().await.unwrap(), "You are Dr. House.");
        std::fs::write(&persona, "You are a pharmacist.").unwrap();
        assert_eq!(templates.persona().await.unwrap(), "You are a pharmacist.");
    }

    #[tokio::test]
    async fn test_missing_template_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let templates = FileTemplates::from_settings(&TemplateSettings {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let err = templates.knowledge_rag().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("knowledge_rag.md"));
    }
}
