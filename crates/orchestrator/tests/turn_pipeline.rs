//! End-to-end tests of the turn pipeline against in-memory collaborators
//! and scripted provider/tool fakes.

use async_trait::async_trait;
use palaver_core::error::{Error, ProviderError, ToolServerError};
use palaver_core::message::{Conversation, ConversationId, Role};
use palaver_core::model::ModelRecord;
use palaver_core::provider::{Completion, CompletionRequest, ProviderAdapter};
use palaver_core::store::Store;
use palaver_core::toolserver::{ToolServerRecord, ToolTransport, TransportKind};
use palaver_memory::{ConversationMemory, InMemoryCache, InMemoryStore};
use palaver_orchestrator::TurnOrchestrator;
use palaver_providers::ProviderGateway;
use palaver_telemetry::{InMemorySink, TraceError, TraceEvent, TraceKind, TraceSink};
use palaver_toolserver::ToolAugmentationClient;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A provider adapter that returns scripted responses and records every
/// request it sees. Panics if more calls are made than responses provided.
struct ScriptedAdapter {
    responses: Mutex<VecDeque<Result<Completion, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedAdapter {
    fn new(responses: Vec<Result<Completion, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        _api_key: &str,
        request: CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedAdapter: no more responses")
    }
}

fn completion(content: &str) -> Result<Completion, ProviderError> {
    let mut usage = serde_json::Map::new();
    usage.insert("total_tokens".into(), serde_json::json!(5));
    Ok(Completion {
        content: content.into(),
        usage,
        model: "gpt-4".into(),
        provider: "openai".into(),
    })
}

/// A tool transport scripted to one fixed outcome.
struct ScriptedToolTransport {
    outcome: Result<serde_json::Value, ToolServerError>,
}

#[async_trait]
impl ToolTransport for ScriptedToolTransport {
    async fn call(
        &self,
        _endpoint: &str,
        _method: &str,
        _params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolServerError> {
        self.outcome.clone()
    }

    async fn probe(&self, _endpoint: &str) -> bool {
        self.outcome.is_ok()
    }
}

/// A sink whose every record call fails.
struct FailingSink;

impl TraceSink for FailingSink {
    fn record(&self, _event: TraceEvent) -> Result<(), TraceError> {
        Err(TraceError::Sink("sink is down".into()))
    }
}

struct Harness {
    orchestrator: TurnOrchestrator,
    store: Arc<InMemoryStore>,
    sink: Arc<InMemorySink>,
    adapter: Arc<ScriptedAdapter>,
    memory: ConversationMemory,
    conversation_id: ConversationId,
}

async fn harness(
    responses: Vec<Result<Completion, ProviderError>>,
    tool_transport: Option<Arc<dyn ToolTransport>>,
) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let sink = Arc::new(InMemorySink::new());
    let adapter = Arc::new(ScriptedAdapter::new(responses));

    store
        .add_model(ModelRecord::new("model-1", "openai", "gpt-4", "openai_key"))
        .await;

    let mut conversation = Conversation::new("Support chat", "user-1").with_model("model-1");
    if tool_transport.is_some() {
        store
            .add_tool_server(ToolServerRecord::new(
                "srv-1",
                "enricher",
                TransportKind::Http,
                "http://localhost:9",
            ))
            .await;
        conversation = conversation.with_tool_server("srv-1");
    }
    let conversation_id = conversation.id.clone();
    store.create_conversation(conversation).await.unwrap();

    let memory = ConversationMemory::new(
        store.clone(),
        cache.clone(),
        50,
        Duration::from_secs(3600),
    );

    let mut credentials = HashMap::new();
    credentials.insert("openai_key".into(), "sk-test".into());
    let mut gateway =
        ProviderGateway::new(store.clone()).with_credentials(credentials);
    gateway.register("openai", adapter.clone());

    let tools = match tool_transport {
        Some(transport) => ToolAugmentationClient::with_transports(
            store.clone(),
            transport.clone(),
            transport,
            Duration::from_secs(30),
        ),
        None => ToolAugmentationClient::new(store.clone(), Duration::from_secs(30)).unwrap(),
    };

    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        ConversationMemory::new(store.clone(), cache, 50, Duration::from_secs(3600)),
        gateway,
        tools,
        sink.clone(),
    );

    Harness {
        orchestrator,
        store,
        sink,
        adapter,
        memory,
        conversation_id,
    }
}

#[tokio::test]
async fn end_to_end_hello_turn() {
    let h = harness(vec![completion("Hi there")], None).await;

    let result = h
        .orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();

    assert_eq!(result.content, "Hi there");
    assert_eq!(result.provider, "openai");
    assert_eq!(result.model, "gpt-4");
    assert_eq!(result.usage["total_tokens"], serde_json::json!(5));
    assert!(!result.trace_id.is_empty());

    // Two message rows, user first
    let messages = h.store.messages(&h.conversation_id, None).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hi there");
    assert_eq!(messages[1].id, result.message_id);

    // Assistant metadata carries model, provider, usage, and trace id
    assert_eq!(messages[1].metadata["model"], serde_json::json!("gpt-4"));
    assert_eq!(messages[1].metadata["provider"], serde_json::json!("openai"));
    assert_eq!(
        messages[1].metadata["usage"]["total_tokens"],
        serde_json::json!(5)
    );
    assert_eq!(
        messages[1].metadata["trace_id"],
        serde_json::json!(result.trace_id)
    );

    // Exactly one generation trace, no errors
    assert_eq!(h.sink.events_of(TraceKind::Generation).len(), 1);
    assert!(h.sink.events_of(TraceKind::Error).is_empty());
    assert_eq!(h.sink.events()[0].trace_id, result.trace_id);
}

#[tokio::test]
async fn memory_receives_both_turns_in_order() {
    let h = harness(vec![completion("Hi there")], None).await;
    h.orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();

    let snapshot = h.memory.read(&h.conversation_id).await.unwrap();
    assert_eq!(snapshot.conversation_history.len(), 2);
    assert_eq!(snapshot.conversation_history[0].role, Role::User);
    assert_eq!(snapshot.conversation_history[0].content, "Hello");
    assert_eq!(snapshot.conversation_history[1].role, Role::Assistant);
    assert_eq!(snapshot.conversation_history[1].content, "Hi there");
    // The assistant entry carries the usage accounting
    assert_eq!(
        snapshot.conversation_history[1].metadata["total_tokens"],
        serde_json::json!(5)
    );
}

#[tokio::test]
async fn prompt_is_recent_history_plus_new_text() {
    let h = harness(
        vec![completion("r1"), completion("r2"), completion("r3")],
        None,
    )
    .await;

    for text in ["t1", "t2", "t3"] {
        h.orchestrator
            .process_turn(&h.conversation_id, "user-1", text)
            .await
            .unwrap();
    }

    let requests = h.adapter.requests();
    assert_eq!(requests.len(), 3);

    // First turn: empty history, just the new text
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].content, "t1");

    // Third turn: four history entries plus the new text
    let contents: Vec<&str> = requests[2]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["t1", "r1", "t2", "r2", "t3"]);
    assert_eq!(requests[2].messages[4].role, Role::User);
}

#[tokio::test]
async fn context_window_bounds_the_prompt() {
    let h = harness(
        vec![completion("r1"), completion("r2"), completion("r3")],
        None,
    )
    .await;
    let orchestrator = h.orchestrator.with_context_window(2);

    for text in ["t1", "t2", "t3"] {
        orchestrator
            .process_turn(&h.conversation_id, "user-1", text)
            .await
            .unwrap();
    }

    // Third turn sees only the last 2 history entries plus the new text
    let requests = h.adapter.requests();
    let contents: Vec<&str> = requests[2]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["t2", "r2", "t3"]);
}

#[tokio::test]
async fn failing_tool_server_is_absorbed() {
    let h = harness(
        vec![completion("draft response")],
        Some(Arc::new(ScriptedToolTransport {
            outcome: Err(ToolServerError::Transport("connection refused".into())),
        })),
    )
    .await;

    let result = h
        .orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();

    // The turn succeeds with the unmodified draft
    assert_eq!(result.content, "draft response");

    // Exactly one error trace, plus the normal generation trace
    let errors = h.sink.events_of(TraceKind::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].metadata["error_type"],
        serde_json::json!("TOOL_SERVER_ERROR")
    );
    assert_eq!(h.sink.events_of(TraceKind::Generation).len(), 1);

    // The persisted assistant message is the draft
    let messages = h.store.messages(&h.conversation_id, None).await.unwrap();
    assert_eq!(messages[1].content, "draft response");
}

#[tokio::test]
async fn enhanced_response_replaces_draft() {
    let h = harness(
        vec![completion("draft response")],
        Some(Arc::new(ScriptedToolTransport {
            outcome: Ok(serde_json::json!({"enhanced_response": "enhanced response"})),
        })),
    )
    .await;

    let result = h
        .orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();

    assert_eq!(result.content, "enhanced response");

    // Both the persisted row and memory carry the enhanced content
    let messages = h.store.messages(&h.conversation_id, None).await.unwrap();
    assert_eq!(messages[1].content, "enhanced response");
    let snapshot = h.memory.read(&h.conversation_id).await.unwrap();
    assert_eq!(
        snapshot.conversation_history[1].content,
        "enhanced response"
    );

    // The successful call is traced
    assert_eq!(h.sink.events_of(TraceKind::ToolCall).len(), 1);
    assert!(h.sink.events_of(TraceKind::Error).is_empty());
}

#[tokio::test]
async fn tool_result_without_enhancement_keeps_draft() {
    let h = harness(
        vec![completion("draft response")],
        Some(Arc::new(ScriptedToolTransport {
            outcome: Ok(serde_json::json!({"analysis": "interesting but ignored"})),
        })),
    )
    .await;

    let result = h
        .orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();
    assert_eq!(result.content, "draft response");
    assert_eq!(h.sink.events_of(TraceKind::ToolCall).len(), 1);
}

#[tokio::test]
async fn provider_failure_is_fatal_but_user_message_survives() {
    let h = harness(
        vec![Err(ProviderError::Upstream {
            status: 500,
            body: "upstream down".into(),
        })],
        None,
    )
    .await;

    let err = h
        .orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::Upstream { .. })));

    // The user message was committed before the provider call; no
    // assistant message exists
    let messages = h.store.messages(&h.conversation_id, None).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);

    // Memory was never updated
    let snapshot = h.memory.read(&h.conversation_id).await.unwrap();
    assert!(snapshot.conversation_history.is_empty());

    // The failure is traced once
    let errors = h.sink.events_of(TraceKind::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].metadata["error_type"],
        serde_json::json!("CHAT_ERROR")
    );
    assert!(h.sink.events_of(TraceKind::Generation).is_empty());
}

#[tokio::test]
async fn unknown_conversation_is_rejected() {
    let h = harness(vec![], None).await;
    let err = h
        .orchestrator
        .process_turn(&ConversationId::from("ghost"), "user-1", "Hello")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConversationNotFound(_)));
    // Nothing was persisted or traced
    assert!(h
        .store
        .messages(&ConversationId::from("ghost"), None)
        .await
        .unwrap()
        .is_empty());
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn foreign_conversation_is_rejected() {
    let h = harness(vec![], None).await;
    let err = h
        .orchestrator
        .process_turn(&h.conversation_id, "someone-else", "Hello")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConversationNotFound(_)));
    assert!(h
        .store
        .messages(&h.conversation_id, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn conversation_without_model_fails() {
    let h = harness(vec![], None).await;
    let conversation = Conversation::new("No model", "user-1");
    let id = conversation.id.clone();
    h.store.create_conversation(conversation).await.unwrap();

    let err = h
        .orchestrator
        .process_turn(&id, "user-1", "Hello")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Provider(ProviderError::ModelNotFound(_))
    ));

    // Step 1 still committed the user message
    assert_eq!(h.store.messages(&id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn broken_trace_sink_never_affects_the_turn() {
    let store = Arc::new(InMemoryStore::new());
    let cache = Arc::new(InMemoryCache::new());
    let adapter = Arc::new(ScriptedAdapter::new(vec![completion("Hi there")]));

    store
        .add_model(ModelRecord::new("model-1", "openai", "gpt-4", "openai_key"))
        .await;
    let conversation = Conversation::new("Chat", "user-1").with_model("model-1");
    let id = conversation.id.clone();
    store.create_conversation(conversation).await.unwrap();

    let mut credentials = HashMap::new();
    credentials.insert("openai_key".into(), "sk-test".into());
    let mut gateway = ProviderGateway::new(store.clone()).with_credentials(credentials);
    gateway.register("openai", adapter);

    let orchestrator = TurnOrchestrator::new(
        store.clone(),
        ConversationMemory::new(store.clone(), cache, 50, Duration::from_secs(3600)),
        gateway,
        ToolAugmentationClient::new(store.clone(), Duration::from_secs(30)).unwrap(),
        Arc::new(FailingSink),
    );

    let result = orchestrator
        .process_turn(&id, "user-1", "Hello")
        .await
        .unwrap();
    assert_eq!(result.content, "Hi there");
}

#[tokio::test]
async fn history_is_ownership_checked() {
    let h = harness(vec![completion("Hi there")], None).await;
    h.orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();

    let messages = h
        .orchestrator
        .history(&h.conversation_id, "user-1", None)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);

    let err = h
        .orchestrator
        .history(&h.conversation_id, "someone-else", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConversationNotFound(_)));
}

#[tokio::test]
async fn delete_conversation_clears_everything() {
    let h = harness(vec![completion("Hi there")], None).await;
    h.orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello")
        .await
        .unwrap();

    // Wrong owner deletes nothing
    assert!(!h
        .orchestrator
        .delete_conversation(&h.conversation_id, "someone-else")
        .await
        .unwrap());

    assert!(h
        .orchestrator
        .delete_conversation(&h.conversation_id, "user-1")
        .await
        .unwrap());

    // The conversation, its messages, and its memory are gone
    assert!(h
        .store
        .conversation(&h.conversation_id)
        .await
        .unwrap()
        .is_none());
    assert!(h
        .store
        .messages(&h.conversation_id, None)
        .await
        .unwrap()
        .is_empty());
    let snapshot = h.memory.read(&h.conversation_id).await.unwrap();
    assert!(snapshot.conversation_history.is_empty());

    // Subsequent turns are rejected
    let err = h
        .orchestrator
        .process_turn(&h.conversation_id, "user-1", "Hello again")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConversationNotFound(_)));
}
