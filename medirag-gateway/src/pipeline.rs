//! One request end to end: retrieve, compose, ask the model, record.

use std::sync::Arc;
use std::time::Duration;

use medirag_core::Settings;
use medirag_knowledge::{InstructionPair, KnowledgeEngine, KnowledgeError, RetrievalFlags};
use tracing::{info, warn};

use crate::prompt_dump::PromptDump;
use crate::providers::{Provider, ProviderError, ProviderResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    pub prompt: String,
    pub flags: RetrievalFlags,
    /// Store the exchange in history after a successful answer
    pub record: bool,
}

impl PipelineRequest {
    pub fn new(prompt: impl Into<String>, flags: RetrievalFlags) -> Self {
        Self {
            prompt: prompt.into(),
            flags,
            record: true,
        }
    }

    pub fn without_recording(mut self) -> Self {
        self.record = false;
        self
    }
}

/// What happened to the history write after the model answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingStatus {
    /// Stored under this exchange id
    Recorded(String),
    /// The answer stands but the history write failed
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub response: ProviderResponse,
    pub instruction: InstructionPair,
    pub recording: RecordingStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone)]
pub struct ChatPipeline {
    engine: KnowledgeEngine,
    provider: Arc<dyn Provider>,
    temperature: f32,
    timeout: Option<Duration>,
    dump: Option<PromptDump>,
}

impl ChatPipeline {
    pub fn new(engine: KnowledgeEngine, provider: Arc<dyn Provider>) -> Self {
        Self {
            engine,
            provider,
            temperature: 0.0,
            timeout: None,
            dump: None,
        }
    }

    /// Apply `[model]` and `[logging]` settings.
    pub fn with_settings(self, settings: &Settings) -> Self {
        let timeout = (settings.model.timeout_seconds > 0)
            .then(|| Duration::from_secs(settings.model.timeout_seconds));
        Self {
            temperature: settings.model.temperature,
            timeout,
            dump: settings.logging.dump_prompts.then(PromptDump::default),
            ..self
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_prompt_dump(mut self, dump: PromptDump) -> Self {
        self.dump = Some(dump);
        self
    }

    pub fn engine(&self) -> &KnowledgeEngine {
        &self.engine
    }

    /// Run the whole flow for one request.
    ///
    /// Retrieval problems never fail the request; only a fatal configuration
    /// error or a failed model call does. Dropping the returned future
    /// abandons in-flight work and records nothing.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineOutcome, PipelineError> {
        if request.prompt.trim().is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        let context = self
            .engine
            .assemble_context(&request.prompt, request.flags)
            .await?;
        let instruction = self.engine.compose(&context);
        if let Some(dump) = &self.dump {
            dump.write(&instruction).await;
        }

        let response = self.call_model(&instruction).await?;
        info!(
            "Model {} answered ({} chars)",
            self.provider.model(),
            response.text.len()
        );

        let recording = if request.record {
            match self.engine.record(&request.prompt, &response.text).await {
                Ok(exchange) => RecordingStatus::Recorded(exchange.id),
                Err(e) => {
                    warn!("Failed to record exchange: {e}");
                    RecordingStatus::Failed(e.to_string())
                }
            }
        } else {
            RecordingStatus::Skipped
        };

        Ok(PipelineOutcome {
            response,
            instruction,
            recording,
        })
    }

    async fn call_model(
        &self,
        instruction: &InstructionPair,
    ) -> Result<ProviderResponse, PipelineError> {
        let messages = instruction.messages();
        let call = self.provider.complete(&messages, self.temperature);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| PipelineError::Timeout(limit))?
                .map_err(PipelineError::from),
            None => call.await.map_err(PipelineError::from),
        }
    }
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}
