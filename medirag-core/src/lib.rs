pub mod config;

pub use config::{
    Config,
    ConfigError,
    EmbeddingBackend,
    EmbeddingSettings,
    LoggingSettings,
    ModelSettings,
    RetrievalSettings,
    Secrets,
    SecretsError,
    Settings,
    SettingsError,
    StoreBackend,
    StoreSettings,
    TemplateSettings,
    load_dotenv,
};
