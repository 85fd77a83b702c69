//! Model-facing side of medirag: the chat provider client, the request
//! pipeline and the diagnostic prompt dump.

pub mod pipeline;
pub mod prompt_dump;
pub mod providers;
pub mod translate;

pub use pipeline::{ChatPipeline, PipelineError, PipelineOutcome, PipelineRequest, RecordingStatus};
pub use prompt_dump::PromptDump;
pub use providers::{OpenAiCompatibleClient, Provider, ProviderError, ProviderResponse};
pub use translate::ModelTranslator;
