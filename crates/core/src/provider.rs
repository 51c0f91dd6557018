//! Provider adapter trait — the abstraction over LLM backends.
//!
//! An adapter knows how to translate one completion request into one
//! backend family's wire protocol and back. The gateway picks the adapter
//! from a registry keyed by the model record's `provider` tag; adding a
//! backend means registering a new adapter, not editing a conditional
//! chain.

use crate::error::ProviderError;
use crate::message::Role;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One prompt message as sent to a provider. Unlike [`crate::Message`] this
/// carries no identity or timestamps — it is purely wire material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A completion request, already resolved to a concrete model name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The upstream model identifier
    pub model: String,

    /// The conversation messages, oldest first
    pub messages: Vec<ChatTurn>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 = deterministic)
    pub temperature: f32,
}

/// A completed (non-streaming) response from a provider.
///
/// `usage` is the provider's own accounting object, passed through
/// verbatim — backends disagree on its field names and translating would
/// lose information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated text
    pub content: String,

    /// Raw usage accounting from the backend
    #[serde(default)]
    pub usage: serde_json::Map<String, serde_json::Value>,

    /// Which model responded
    pub model: String,

    /// Which provider family answered
    pub provider: String,
}

/// The core provider adapter trait.
///
/// Every backend family (OpenAI-style, Anthropic-style) implements this.
/// The gateway calls `complete()` without knowing which adapter is behind
/// it. The API key is passed per call because credentials are resolved
/// per model record, not per adapter instance.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider tag this adapter answers to (e.g. "openai").
    fn name(&self) -> &str;

    /// Send a request and return the completed response.
    async fn complete(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError>;
}
