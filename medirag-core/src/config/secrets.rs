//! Secrets configuration loaded from environment variables only.
//!
//! API keys never live in the TOML file.

use std::env;

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// Chat completion API key (env: MISTRAL_API_KEY)
    pub mistral_api_key: Option<String>,
}

/// Errors that can occur when loading secrets
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Missing required secret: {0}")]
    MissingSecret(String),
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// Also loads a `.env` file if present (development convenience).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Self {
        Self {
            mistral_api_key: env::var("MISTRAL_API_KEY")
                .ok()
                .filter(|value| !value.trim().is_empty()),
        }
    }

    /// Return the chat completion key or fail with the variable name.
    pub fn require_mistral_key(&self) -> Result<&str, SecretsError> {
        self.mistral_api_key
            .as_deref()
            .ok_or_else(|| SecretsError::MissingSecret("MISTRAL_API_KEY".to_string()))
    }
}
