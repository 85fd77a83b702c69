use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use medirag_core::Settings;
use medirag_gateway::{
    ChatPipeline, PipelineError, PipelineRequest, PromptDump, Provider, ProviderError,
    ProviderResponse, RecordingStatus,
};
use medirag_knowledge::history::history_descriptor;
use medirag_knowledge::knowledge::medicine_descriptor;
use medirag_knowledge::{
    HashEmbedder, InstructionMessage, KnowledgeEngine, MedicineRecord, MemoryVectorStore,
    MessageRole, RetrievalFlags, StaticTemplates, VectorStore,
};

const DIM: usize = 32;

enum Behaviour {
    Answer(&'static str),
    Fail,
    Sleep(Duration),
}

struct FakeModel {
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_system: std::sync::Mutex<String>,
}

impl FakeModel {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
            last_system: std::sync::Mutex::new(String::new()),
        })
    }
}

#[async_trait]
impl Provider for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-1"
    }

    async fn complete(
        &self,
        messages: &[InstructionMessage],
        _temperature: f32,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(system) = messages.iter().find(|m| m.role == MessageRole::System) {
            *self.last_system.lock().unwrap() = system.content.clone();
        }
        let text = match &self.behaviour {
            Behaviour::Answer(text) => text.to_string(),
            Behaviour::Fail => {
                return Err(ProviderError::ApiError {
                    status: 503,
                    message: "overloaded".to_string(),
                });
            }
            Behaviour::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                "too late".to_string()
            }
        };
        Ok(ProviderResponse {
            id: "cmpl-1".to_string(),
            model: "fake-1".to_string(),
            text,
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }
}

struct Fixture {
    engine: KnowledgeEngine,
    history: Arc<MemoryVectorStore>,
}

async fn fixture() -> Fixture {
    let knowledge = Arc::new(MemoryVectorStore::new(medicine_descriptor(DIM).unwrap()));
    let history = Arc::new(MemoryVectorStore::new(history_descriptor(DIM).unwrap()));
    let engine = KnowledgeEngine::from_parts(
        &Settings::default(),
        Arc::new(HashEmbedder::new(DIM)),
        knowledge,
        history.clone(),
        Arc::new(StaticTemplates::new("Persona.", "Use the records.")),
    )
    .unwrap();
    engine.ensure_indexes().await.unwrap();
    Fixture { engine, history }
}

fn knowledge_only() -> RetrievalFlags {
    RetrievalFlags {
        persona: false,
        history_rag: false,
        knowledge_rag: true,
    }
}

#[tokio::test]
async fn test_successful_answer_is_recorded() {
    let f = fixture().await;
    let model = FakeModel::new(Behaviour::Answer("Take it with food."));
    let pipeline = ChatPipeline::new(f.engine.clone(), model.clone());

    let outcome = pipeline
        .run(PipelineRequest::new("How should I take ibuprofen?", RetrievalFlags::none()))
        .await
        .unwrap();

    assert_eq!(outcome.response.text, "Take it with food.");
    assert_eq!(outcome.instruction.system, "You are a helpful assistant.");
    let RecordingStatus::Recorded(id) = outcome.recording else {
        panic!("expected a recorded exchange, got {:?}", outcome.recording);
    };
    assert!(id.starts_with("chat:history:"));
    assert_eq!(f.history.count().await.unwrap(), 1);

    let recent = f.engine.history().recent(5).await.unwrap();
    assert_eq!(recent[0].prompt, "How should I take ibuprofen?");
    assert_eq!(recent[0].response, "Take it with food.");
}

#[tokio::test]
async fn test_knowledge_reaches_the_model() {
    let f = fixture().await;
    f.engine
        .knowledge()
        .ingest(
            f.engine.embedder().as_ref(),
            &[MedicineRecord::new(
                "medicine:0",
                "Ibuprofen 400mg Tablet",
                "Ibuprofen (400mg)",
                "Pain relief, fever",
                "Nausea",
                "Abbott",
            )],
        )
        .await
        .unwrap();
    let model = FakeModel::new(Behaviour::Answer("400mg every 6 hours."));
    let pipeline = ChatPipeline::new(f.engine.clone(), model.clone());

    pipeline
        .run(PipelineRequest::new("What is the dosage for ibuprofen?", knowledge_only()))
        .await
        .unwrap();

    let system = model.last_system.lock().unwrap().clone();
    assert!(system.starts_with("Use the records.\n\n"));
    assert!(system.contains("Medicine: Ibuprofen 400mg Tablet"));
}

#[tokio::test]
async fn test_model_failure_records_nothing() {
    let f = fixture().await;
    let pipeline = ChatPipeline::new(f.engine.clone(), FakeModel::new(Behaviour::Fail));

    let err = pipeline
        .run(PipelineRequest::new("Any interactions with aspirin?", RetrievalFlags::all()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Provider(ProviderError::ApiError { status: 503, .. })
    ));
    assert_eq!(f.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_model_timeout_records_nothing() {
    let f = fixture().await;
    let pipeline = ChatPipeline::new(
        f.engine.clone(),
        FakeModel::new(Behaviour::Sleep(Duration::from_secs(5))),
    )
    .with_timeout(Duration::from_millis(20));

    let err = pipeline
        .run(PipelineRequest::new("Is paracetamol safe?", RetrievalFlags::none()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Timeout(_)));
    assert_eq!(f.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dropped_request_records_nothing() {
    let f = fixture().await;
    let pipeline = ChatPipeline::new(
        f.engine.clone(),
        FakeModel::new(Behaviour::Sleep(Duration::from_millis(200))),
    );

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        pipeline.run(PipelineRequest::new("Is paracetamol safe?", RetrievalFlags::none())),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(f.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_history_outage_keeps_the_answer() {
    let f = fixture().await;
    let pipeline = ChatPipeline::new(
        f.engine.clone(),
        FakeModel::new(Behaviour::Answer("Rest and fluids.")),
    );
    f.history.set_available(false);

    let outcome = pipeline
        .run(PipelineRequest::new("I have a fever", RetrievalFlags::all()))
        .await
        .unwrap();

    assert_eq!(outcome.response.text, "Rest and fluids.");
    assert!(matches!(outcome.recording, RecordingStatus::Failed(_)));

    f.history.set_available(true);
    assert_eq!(f.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_prompt_is_rejected_before_the_model() {
    let f = fixture().await;
    let model = FakeModel::new(Behaviour::Answer("unused"));
    let pipeline = ChatPipeline::new(f.engine.clone(), model.clone());

    let err = pipeline
        .run(PipelineRequest::new("   ", RetrievalFlags::all()))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::EmptyPrompt));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recording_can_be_skipped() {
    let f = fixture().await;
    let pipeline = ChatPipeline::new(f.engine.clone(), FakeModel::new(Behaviour::Answer("Ok.")));

    let outcome = pipeline
        .run(PipelineRequest::new("Side effects of metformin?", RetrievalFlags::none()).without_recording())
        .await
        .unwrap();

    assert_eq!(outcome.recording, RecordingStatus::Skipped);
    assert_eq!(f.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_prompt_dump_writes_transcript() {
    let f = fixture().await;
    let dir = tempfile::tempdir().unwrap();
    let pipeline = ChatPipeline::new(f.engine.clone(), FakeModel::new(Behaviour::Answer("Ok.")))
        .with_prompt_dump(PromptDump::new(dir.path()));

    let outcome = pipeline
        .run(PipelineRequest::new("Hello doctor", RetrievalFlags::none()))
        .await
        .unwrap();

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    let path = files[0].as_ref().unwrap().path();
    let written = std::fs::read_to_string(path).unwrap();
    assert_eq!(written, outcome.instruction.transcript());
    assert!(written.contains("=== USER ===\nHello doctor"));
}

#[tokio::test]
async fn test_second_question_sees_the_first_exchange() {
    let f = fixture().await;
    let model = FakeModel::new(Behaviour::Answer("Ibuprofen helps with headaches."));
    let pipeline = ChatPipeline::new(f.engine.clone(), model.clone());
    let history_only = RetrievalFlags {
        persona: false,
        history_rag: true,
        knowledge_rag: false,
    };

    pipeline
        .run(PipelineRequest::new("What helps a headache?", history_only))
        .await
        .unwrap();
    let second = pipeline
        .run(PipelineRequest::new("What helps a headache?", history_only))
        .await
        .unwrap();

    assert!(second.instruction.user.contains("User: What helps a headache?"));
    assert!(second.instruction.user.ends_with("Current query: What helps a headache?"));

    let recent = f.engine.history().recent(5).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|e| e.prompt == "What helps a headache?"));
}
