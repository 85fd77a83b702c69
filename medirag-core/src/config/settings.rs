//! Settings configuration loaded from TOML files.
//!
//! Non-sensitive configuration lives in the XDG config directory
//! (`~/.config/medirag/config.toml`). Every section and field is optional;
//! missing values fall back to the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# medirag configuration file
# Located at: ~/.config/medirag/config.toml
#
# Secrets are loaded from environment variables:
#   - MISTRAL_API_KEY

[embedding]
# "ollama" (HTTP embedding service), "local" (in-process model, needs the
# `local-embeddings` feature) or "hash" (deterministic, offline testing)
backend = "ollama"
url = "http://127.0.0.1:11434"
model = "all-minilm"
# Must match the DIM declared by both vector indexes
dimension = 384

[store]
# "redis" (RediSearch) or "memory" (process-local, lost on exit)
backend = "redis"
url = "redis://127.0.0.1:6379"

[retrieval]
persona = false
knowledge = true
history = true
knowledge_results = 3
history_results = 3
# Use the most recent exchanges when the history similarity search fails
recency_fallback = false
# Translate prompts to English before classification and knowledge search
translate = false
# Extra in-domain terms on top of the built-in vocabulary
extra_domain_terms = []

[templates]
dir = "./templates"
persona = "persona.md"
knowledge_rag = "knowledge_rag.md"

[model]
base_url = "https://api.mistral.ai"
model = "mistral-large-latest"
temperature = 0.0
timeout_seconds = 120
default_system = "You are a helpful assistant."

[logging]
level = "info"
# Write a transcript of every composed instruction to ./logs/prompts/
dump_prompts = false
"#;

/// Which embedding implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Ollama,
    Local,
    Hash,
}

/// Which vector store implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Main settings structure loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub templates: TemplateSettings,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Embedding provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Base URL of the embedding service (ollama backend)
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model identifier understood by the selected backend
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Declared vector dimensionality shared by every index
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Model cache directory (local backend)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            cache_dir: None,
        }
    }
}

/// Vector store settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_store_url(),
        }
    }
}

/// Retrieval feature flags and tuning knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalSettings {
    /// Use the persona template as base system instruction
    #[serde(default)]
    pub persona: bool,

    /// Augment in-domain requests with knowledge base passages
    #[serde(default = "default_true")]
    pub knowledge: bool,

    /// Augment requests with similar past exchanges
    #[serde(default = "default_true")]
    pub history: bool,

    #[serde(default = "default_result_count")]
    pub knowledge_results: usize,

    #[serde(default = "default_result_count")]
    pub history_results: usize,

    #[serde(default)]
    pub recency_fallback: bool,

    #[serde(default)]
    pub translate: bool,

    #[serde(default)]
    pub extra_domain_terms: Vec<String>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            persona: false,
            knowledge: true,
            history: true,
            knowledge_results: default_result_count(),
            history_results: default_result_count(),
            recency_fallback: false,
            translate: false,
            extra_domain_terms: Vec::new(),
        }
    }
}

/// Template file locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateSettings {
    #[serde(default = "default_template_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_persona_file")]
    pub persona: String,

    #[serde(default = "default_knowledge_rag_file")]
    pub knowledge_rag: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            dir: default_template_dir(),
            persona: default_persona_file(),
            knowledge_rag: default_knowledge_rag_file(),
        }
    }
}

impl TemplateSettings {
    pub fn persona_path(&self) -> PathBuf {
        self.dir.join(&self.persona)
    }

    pub fn knowledge_rag_path(&self) -> PathBuf {
        self.dir.join(&self.knowledge_rag)
    }
}

/// Chat completion endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Upper bound on one completion call; 0 disables the bound
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// System text used when retrieval produced no system instruction
    #[serde(default = "default_system_text")]
    pub default_system: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            model: default_model_name(),
            temperature: 0.0,
            timeout_seconds: default_timeout_seconds(),
            default_system: default_system_text(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Dump composed instruction transcripts to ./logs/prompts/
    #[serde(default)]
    pub dump_prompts: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dump_prompts: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_embedding_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_result_count() -> usize {
    3
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("./templates")
}

fn default_persona_file() -> String {
    "persona.md".to_string()
}

fn default_knowledge_rag_file() -> String {
    "knowledge_rag.md".to_string()
}

fn default_model_base_url() -> String {
    "https://api.mistral.ai".to_string()
}

fn default_model_name() -> String {
    "mistral-large-latest".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_system_text() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load settings from an explicit file, creating it with defaults when
    /// missing.
    pub fn load_from(config_path: &Path) -> Result<Self, SettingsError> {
        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(config_path)?;
        }

        let content = fs::read_to_string(config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// Uses XDG config directory: `~/.config/medirag/config.toml`
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("MEDIRAG_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("medirag");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }
}
