//! The provider gateway — resolves a model record and routes the
//! completion to the right adapter.
//!
//! Dispatch goes through a registry keyed by the record's `provider` tag.
//! Adding a backend means registering a new adapter, not editing a
//! conditional chain.

use crate::anthropic::AnthropicAdapter;
use crate::openai::OpenAiAdapter;
use palaver_core::error::{Error, ProviderError, Result};
use palaver_core::provider::{ChatTurn, Completion, CompletionRequest, ProviderAdapter};
use palaver_core::store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-call completion parameters.
#[derive(Debug, Clone, Copy)]
pub struct RequestParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Routes completion requests to the adapter configured for a model.
pub struct ProviderGateway {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    store: Arc<dyn Store>,
    credentials: HashMap<String, String>,
}

impl ProviderGateway {
    /// Create an empty gateway over a store.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            adapters: HashMap::new(),
            store,
            credentials: HashMap::new(),
        }
    }

    /// Register an adapter under a provider tag.
    pub fn register(&mut self, tag: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(tag.into(), adapter);
    }

    /// Replace the credential table (credential_ref -> API key).
    pub fn with_credentials(mut self, credentials: HashMap<String, String>) -> Self {
        self.credentials = credentials;
        self
    }

    /// List registered provider tags.
    pub fn providers(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    /// Complete a prompt with the model identified by `model_id`.
    ///
    /// Resolution order: model record, adapter, credential — all before any
    /// network call. A missing or inactive model fails with `ModelNotFound`;
    /// an unknown provider tag with `UnsupportedProvider`; an absent or
    /// empty credential with `MissingCredential`.
    pub async fn complete(
        &self,
        model_id: &str,
        messages: Vec<ChatTurn>,
        params: RequestParams,
    ) -> Result<Completion> {
        let record = self
            .store
            .model(model_id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| ProviderError::ModelNotFound(model_id.to_string()))?;

        let adapter = self
            .adapters
            .get(&record.provider)
            .ok_or_else(|| ProviderError::UnsupportedProvider(record.provider.clone()))?;

        let api_key = self
            .credentials
            .get(&record.credential_ref)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ProviderError::MissingCredential(record.provider.clone()))?;

        debug!(
            model = %record.model_name,
            provider = %record.provider,
            "Dispatching completion"
        );

        let request = CompletionRequest {
            model: record.model_name,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let completion = adapter.complete(api_key, request).await?;
        Ok(completion)
    }
}

/// Build a gateway from configuration: registers the built-in adapters
/// with the configured timeout and base URL overrides, and copies the
/// credential table.
pub fn build_from_config(
    store: Arc<dyn Store>,
    config: &palaver_config::AppConfig,
) -> Result<ProviderGateway> {
    let timeout = Duration::from_secs(config.timeouts.provider_secs);

    let mut openai = OpenAiAdapter::new(timeout).map_err(Error::Provider)?;
    if let Some(base) = config.provider_base_url("openai") {
        openai = openai.with_base_url(base);
    }

    let mut anthropic = AnthropicAdapter::new(timeout).map_err(Error::Provider)?;
    if let Some(base) = config.provider_base_url("anthropic") {
        anthropic = anthropic.with_base_url(base);
    }

    let mut gateway =
        ProviderGateway::new(store).with_credentials(config.credentials.clone());
    gateway.register("openai", Arc::new(openai));
    gateway.register("anthropic", Arc::new(anthropic));

    Ok(gateway)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_core::error::StoreError;
    use palaver_core::message::{Conversation, ConversationId, Message, Role};
    use palaver_core::model::ModelRecord;
    use palaver_core::snapshot::MemorySnapshot;
    use palaver_core::toolserver::ToolServerRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store stub holding just model records.
    struct StubStore {
        models: Vec<ModelRecord>,
    }

    #[async_trait]
    impl Store for StubStore {
        fn name(&self) -> &str {
            "stub"
        }

        async fn conversation(
            &self,
            _id: &ConversationId,
        ) -> std::result::Result<Option<Conversation>, StoreError> {
            Ok(None)
        }

        async fn create_conversation(
            &self,
            _conversation: Conversation,
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn delete_conversation(
            &self,
            _id: &ConversationId,
        ) -> std::result::Result<bool, StoreError> {
            Ok(false)
        }

        async fn messages(
            &self,
            _id: &ConversationId,
            _limit: Option<usize>,
        ) -> std::result::Result<Vec<Message>, StoreError> {
            Ok(Vec::new())
        }

        async fn append_message(
            &self,
            _message: Message,
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn session(
            &self,
            _id: &ConversationId,
        ) -> std::result::Result<Option<MemorySnapshot>, StoreError> {
            Ok(None)
        }

        async fn put_session(
            &self,
            _id: &ConversationId,
            _snapshot: MemorySnapshot,
        ) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        async fn model(
            &self,
            id: &str,
        ) -> std::result::Result<Option<ModelRecord>, StoreError> {
            Ok(self.models.iter().find(|m| m.id == id).cloned())
        }

        async fn tool_server(
            &self,
            _id: &str,
        ) -> std::result::Result<Option<ToolServerRecord>, StoreError> {
            Ok(None)
        }
    }

    /// Adapter that counts calls and echoes a canned reply.
    struct CountingAdapter {
        calls: AtomicUsize,
    }

    impl CountingAdapter {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for CountingAdapter {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(
            &self,
            _api_key: &str,
            request: CompletionRequest,
        ) -> std::result::Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                content: "canned".into(),
                usage: serde_json::Map::new(),
                model: request.model,
                provider: "counting".into(),
            })
        }
    }

    fn gateway_with(models: Vec<ModelRecord>) -> (ProviderGateway, Arc<CountingAdapter>) {
        let store = Arc::new(StubStore { models });
        let adapter = Arc::new(CountingAdapter::new());
        let mut credentials = HashMap::new();
        credentials.insert("test_key".into(), "sk-test".into());
        let mut gateway = ProviderGateway::new(store).with_credentials(credentials);
        gateway.register("openai", adapter.clone());
        (gateway, adapter)
    }

    fn params() -> RequestParams {
        RequestParams {
            max_tokens: 100,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_adapter() {
        let (gateway, adapter) =
            gateway_with(vec![ModelRecord::new("m1", "openai", "gpt-4", "test_key")]);
        let completion = gateway
            .complete("m1", vec![ChatTurn::new(Role::User, "hi")], params())
            .await
            .unwrap();
        assert_eq!(completion.content, "canned");
        assert_eq!(completion.model, "gpt-4");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_model_fails() {
        let (gateway, adapter) = gateway_with(vec![]);
        let err = gateway
            .complete("missing", vec![], params())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::ModelNotFound(_))
        ));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inactive_model_fails() {
        let mut record = ModelRecord::new("m1", "openai", "gpt-4", "test_key");
        record.is_active = false;
        let (gateway, adapter) = gateway_with(vec![record]);
        let err = gateway.complete("m1", vec![], params()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::ModelNotFound(_))
        ));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_provider_makes_no_call() {
        let (gateway, adapter) = gateway_with(vec![ModelRecord::new(
            "m1",
            "acme-llm",
            "acme-1",
            "test_key",
        )]);
        let err = gateway.complete("m1", vec![], params()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::UnsupportedProvider(ref tag)) if tag == "acme-llm"
        ));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credential_makes_no_call() {
        let (gateway, adapter) = gateway_with(vec![ModelRecord::new(
            "m1",
            "openai",
            "gpt-4",
            "absent_key",
        )]);
        let err = gateway.complete("m1", vec![], params()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::MissingCredential(_))
        ));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn build_from_config_registers_builtin_adapters() {
        let store = Arc::new(StubStore { models: vec![] });
        let config = palaver_config::AppConfig::default();
        let gateway = build_from_config(store, &config).unwrap();
        let mut providers = gateway.providers();
        providers.sort();
        assert_eq!(providers, vec!["anthropic", "openai"]);
    }
}
