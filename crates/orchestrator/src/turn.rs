//! The turn orchestrator.

use palaver_core::cache::Cache;
use palaver_core::error::{Error, ProviderError, Result};
use palaver_core::message::{Conversation, ConversationId, Message, Role};
use palaver_core::provider::ChatTurn;
use palaver_core::snapshot::HistoryEntry;
use palaver_core::store::Store;
use palaver_memory::ConversationMemory;
use palaver_providers::{build_from_config, ProviderGateway, RequestParams};
use palaver_telemetry::{TraceEvent, TraceSink};
use palaver_toolserver::ToolAugmentationClient;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a completed turn hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    /// ID of the persisted assistant message.
    pub message_id: String,

    /// The final response content (post-augmentation, if any).
    pub content: String,

    /// Which model answered.
    pub model: String,

    /// Which provider family answered.
    pub provider: String,

    /// The provider's raw usage accounting.
    pub usage: serde_json::Map<String, serde_json::Value>,

    /// Correlates this turn's trace events.
    pub trace_id: String,
}

/// Composes store, memory, gateway, tool client, and trace sink into the
/// turn pipeline. One instance serves all conversations.
pub struct TurnOrchestrator {
    store: Arc<dyn Store>,
    memory: ConversationMemory,
    gateway: ProviderGateway,
    tools: ToolAugmentationClient,
    sink: Arc<dyn TraceSink>,
    /// How many recent history entries feed each prompt (K <= memory cap).
    context_window: usize,
    params: RequestParams,
}

impl TurnOrchestrator {
    /// Wire an orchestrator from already-built parts.
    pub fn new(
        store: Arc<dyn Store>,
        memory: ConversationMemory,
        gateway: ProviderGateway,
        tools: ToolAugmentationClient,
        sink: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            store,
            memory,
            gateway,
            tools,
            sink,
            context_window: 10,
            params: RequestParams {
                max_tokens: 4000,
                temperature: 0.7,
            },
        }
    }

    /// Build the whole pipeline from configuration: conversation memory,
    /// the built-in provider adapters, and the tool client, all over the
    /// given store and cache.
    pub fn from_config(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        sink: Arc<dyn TraceSink>,
        config: &palaver_config::AppConfig,
    ) -> Result<Self> {
        let memory = ConversationMemory::new(
            store.clone(),
            cache,
            config.memory.max_history,
            Duration::from_secs(config.memory.cache_ttl_secs),
        );
        let gateway = build_from_config(store.clone(), config)?;
        let tools = ToolAugmentationClient::new(
            store.clone(),
            Duration::from_secs(config.timeouts.tool_server_secs),
        )
        .map_err(Error::ToolServer)?;

        Ok(Self {
            store,
            memory,
            gateway,
            tools,
            sink,
            context_window: config.memory.context_window,
            params: RequestParams {
                max_tokens: config.request.max_tokens,
                temperature: config.request.temperature,
            },
        })
    }

    /// Override the context window (builder style).
    pub fn with_context_window(mut self, k: usize) -> Self {
        self.context_window = k;
        self
    }

    /// Override the completion parameters (builder style).
    pub fn with_request_params(mut self, params: RequestParams) -> Self {
        self.params = params;
        self
    }

    /// Process one turn: persist the user message, complete, augment,
    /// persist the response, update memory, trace.
    ///
    /// The conversation must exist and be owned by `user_id`. Provider and
    /// persistence failures are fatal (traced, then propagated); tool
    /// augmentation failures are absorbed.
    pub async fn process_turn(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        text: &str,
    ) -> Result<TurnResult> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.clone()))?;

        let trace_id = TraceEvent::new_trace_id();
        info!(
            conversation = %conversation.id,
            %trace_id,
            "Processing turn"
        );

        match self.run_pipeline(&conversation, text, &trace_id).await {
            Ok(result) => Ok(result),
            Err(error) => {
                let mut metadata = serde_json::Map::new();
                metadata.insert(
                    "conversation_id".into(),
                    serde_json::json!(conversation.id.to_string()),
                );
                metadata.insert("user_id".into(), serde_json::json!(conversation.user_id));
                self.emit(TraceEvent::error(
                    &trace_id,
                    error.to_string(),
                    "CHAT_ERROR",
                    metadata,
                ));
                Err(error)
            }
        }
    }

    /// The fatal path of the pipeline. Step 4 (tool augmentation) handles
    /// its own failures and never propagates them.
    async fn run_pipeline(
        &self,
        conversation: &Conversation,
        text: &str,
        trace_id: &str,
    ) -> Result<TurnResult> {
        // 1. Commit the user message before any network call, so the
        //    user's input survives a failed or cancelled turn.
        let user_message = Message::user(conversation.id.clone(), text);
        self.store.append_message(user_message).await?;

        // 2. Bounded context: the most recent K entries plus the new text.
        let snapshot = self.memory.read(&conversation.id).await?;
        let history = snapshot.recent(self.context_window);
        let mut prompt: Vec<ChatTurn> = history
            .iter()
            .map(|e| ChatTurn::new(e.role, e.content.clone()))
            .collect();
        prompt.push(ChatTurn::new(Role::User, text));

        // 3. Completion. Failure here fails the turn.
        let model_id = conversation.model_id.as_deref().ok_or_else(|| {
            Error::Provider(ProviderError::ModelNotFound(format!(
                "no model configured for conversation {}",
                conversation.id
            )))
        })?;
        let completion = self.gateway.complete(model_id, prompt, self.params).await?;

        // 4. Optional augmentation. Any failure is absorbed.
        let content = match conversation.tool_server_id.as_deref() {
            Some(server_id) => {
                self.augment(conversation, server_id, text, history, completion.content.clone(), trace_id)
                    .await
            }
            None => completion.content.clone(),
        };

        // 5. Persist the assistant message.
        let mut metadata = serde_json::Map::new();
        metadata.insert("model".into(), serde_json::json!(completion.model));
        metadata.insert("provider".into(), serde_json::json!(completion.provider));
        metadata.insert(
            "usage".into(),
            serde_json::Value::Object(completion.usage.clone()),
        );
        metadata.insert("trace_id".into(), serde_json::json!(trace_id));
        let assistant_message =
            Message::assistant(conversation.id.clone(), content.clone()).with_metadata(metadata);
        let message_id = assistant_message.id.clone();
        self.store.append_message(assistant_message).await?;

        // 6. Update conversation memory: the user turn, then the assistant
        //    turn carrying the usage accounting.
        self.memory
            .append(&conversation.id, Role::User, text, serde_json::Map::new())
            .await?;
        self.memory
            .append(
                &conversation.id,
                Role::Assistant,
                content.clone(),
                completion.usage.clone(),
            )
            .await?;

        // 7. Correlate input, output, and model info in one trace event.
        let mut trace_meta = serde_json::Map::new();
        trace_meta.insert("model".into(), serde_json::json!(completion.model));
        trace_meta.insert("provider".into(), serde_json::json!(completion.provider));
        trace_meta.insert("user_id".into(), serde_json::json!(conversation.user_id));
        self.emit(TraceEvent::generation(
            trace_id,
            &conversation.id,
            serde_json::json!({ "message": text }),
            serde_json::json!({ "response": content }),
            trace_meta,
        ));

        // 8. Hand the result back.
        Ok(TurnResult {
            message_id,
            content,
            model: completion.model,
            provider: completion.provider,
            usage: completion.usage,
            trace_id: trace_id.to_string(),
        })
    }

    /// Invoke the tool server and return the (possibly enhanced) content.
    ///
    /// The explicit match is the non-fatal seam: an `Err` is traced and the
    /// draft is returned unchanged. A successful result replaces the draft
    /// only when it carries a string `enhanced_response`.
    async fn augment(
        &self,
        conversation: &Conversation,
        server_id: &str,
        text: &str,
        history: &[HistoryEntry],
        draft: String,
        trace_id: &str,
    ) -> String {
        let params = serde_json::json!({
            "message": text,
            "context": history,
            "llm_response": draft,
        });

        match self
            .tools
            .invoke(server_id, "process_message", params)
            .await
        {
            Ok(result) => {
                self.emit(TraceEvent::tool_call(
                    trace_id,
                    server_id,
                    "process_message",
                    serde_json::json!({ "message": text }),
                    result.clone(),
                ));
                match result.get("enhanced_response").and_then(|v| v.as_str()) {
                    Some(enhanced) => enhanced.to_string(),
                    None => draft,
                }
            }
            Err(error) => {
                warn!(
                    conversation = %conversation.id,
                    server = %server_id,
                    %error,
                    "Tool augmentation failed; continuing with draft response"
                );
                let mut metadata = serde_json::Map::new();
                metadata.insert(
                    "conversation_id".into(),
                    serde_json::json!(conversation.id.to_string()),
                );
                metadata.insert("tool_server_id".into(), serde_json::json!(server_id));
                self.emit(TraceEvent::error(
                    trace_id,
                    error.to_string(),
                    "TOOL_SERVER_ERROR",
                    metadata,
                ));
                draft
            }
        }
    }

    /// The durable message log of a conversation, ownership-checked.
    pub async fn history(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let conversation = self
            .store
            .conversation(conversation_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| Error::ConversationNotFound(conversation_id.clone()))?;

        Ok(self.store.messages(&conversation.id, limit).await?)
    }

    /// Delete a conversation: clear its memory, then drop the row (messages
    /// and session cascade with it). Returns whether anything was deleted.
    pub async fn delete_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
    ) -> Result<bool> {
        let Some(conversation) = self
            .store
            .conversation(conversation_id)
            .await?
            .filter(|c| c.user_id == user_id)
        else {
            return Ok(false);
        };

        self.memory.clear(&conversation.id).await?;
        let deleted = self.store.delete_conversation(&conversation.id).await?;
        debug!(conversation = %conversation.id, "Deleted conversation");
        Ok(deleted)
    }

    /// Record a trace event, absorbing sink failures. A broken trace
    /// recorder never alters a turn's outcome.
    fn emit(&self, event: TraceEvent) {
        if let Err(error) = self.sink.record(event) {
            warn!(%error, "Trace emission failed; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_memory::{InMemoryCache, InMemoryStore};
    use palaver_telemetry::NoopSink;

    #[tokio::test]
    async fn from_config_wires_the_default_pipeline() {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let config = palaver_config::AppConfig::default();

        let orchestrator =
            TurnOrchestrator::from_config(store, cache, Arc::new(NoopSink), &config).unwrap();
        assert_eq!(orchestrator.context_window, config.memory.context_window);
        assert_eq!(orchestrator.params.max_tokens, config.request.max_tokens);
        assert_eq!(orchestrator.memory.max_history(), config.memory.max_history);
    }
}
