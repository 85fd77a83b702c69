//! Configuration management for medirag.
//!
//! Secrets come from environment variables, everything else from a TOML
//! file.
//!
//! # Configuration Sources
//!
//! ## Secrets (Environment Variables)
//! - `MISTRAL_API_KEY` - API key for the chat completion endpoint
//!
//! ## Settings (TOML File)
//! Located at `~/.config/medirag/config.toml`:
//! ```toml
//! [embedding]
//! backend = "ollama"
//! model = "all-minilm"
//! dimension = 384
//!
//! [store]
//! backend = "redis"
//! url = "redis://127.0.0.1:6379"
//!
//! [retrieval]
//! knowledge = true
//! history = true
//!
//! [model]
//! base_url = "https://api.mistral.ai"
//! model = "mistral-large-latest"
//! ```

mod secrets;
mod settings;

use std::path::Path;

pub use secrets::{Secrets, SecretsError};
pub use settings::{
    EmbeddingBackend, EmbeddingSettings, LoggingSettings, ModelSettings, RetrievalSettings,
    Settings, SettingsError, StoreBackend, StoreSettings, TemplateSettings,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secrets loaded from environment variables
    pub secrets: Secrets,
    /// Settings loaded from TOML configuration file
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Secrets error: {0}")]
    Secrets(#[from] SecretsError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl Config {
    /// Load secrets from the environment and settings from the TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env();
        let settings = Settings::load()?;
        Self::from_parts(secrets, settings)
    }

    /// Like [`Config::load`], reading settings from `config_path` instead of
    /// the default location.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let secrets = Secrets::from_env();
        let settings = Settings::load_from(config_path)?;
        Self::from_parts(secrets, settings)
    }

    /// Build a config from already-parsed parts (used by tests and tools).
    pub fn from_parts(secrets: Secrets, settings: Settings) -> Result<Self, ConfigError> {
        let config = Self { secrets, settings };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would only fail later, deep inside a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.settings;
        if settings.embedding.dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding.dimension",
                reason: "must be greater than zero".to_string(),
            });
        }
        if settings.retrieval.knowledge_results == 0 {
            return Err(ConfigError::Invalid {
                field: "retrieval.knowledge_results",
                reason: "must be greater than zero".to_string(),
            });
        }
        if settings.retrieval.history_results == 0 {
            return Err(ConfigError::Invalid {
                field: "retrieval.history_results",
                reason: "must be greater than zero".to_string(),
            });
        }
        if settings.embedding.backend == EmbeddingBackend::Ollama
            && settings.embedding.url.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "embedding.url",
                reason: "required by the ollama backend".to_string(),
            });
        }
        if settings.store.backend == StoreBackend::Redis && settings.store.url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "store.url",
                reason: "required by the redis backend".to_string(),
            });
        }
        if settings.model.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "model.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&settings.model.temperature) {
            return Err(ConfigError::Invalid {
                field: "model.temperature",
                reason: format!("{} is outside 0.0..=2.0", settings.model.temperature),
            });
        }
        Ok(())
    }

    /// API key for the chat completion endpoint.
    pub fn require_model_api_key(&self) -> Result<&str, ConfigError> {
        Ok(self.secrets.require_mistral_key()?)
    }
}

/// Load a `.env` file from the current directory if present.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
