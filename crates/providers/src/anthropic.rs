//! Anthropic-style provider adapter.
//!
//! Uses the Messages API shape:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - No system-role slot in the message list: system content is folded by
//!   prepending it (plus a blank line) to the first user message
//! - Response content at `content[0].text`

use async_trait::async_trait;
use palaver_core::error::ProviderError;
use palaver_core::message::Role;
use palaver_core::provider::{ChatTurn, Completion, CompletionRequest, ProviderAdapter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// An Anthropic-style Messages API adapter.
pub struct AnthropicAdapter {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    /// Create a new adapter with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            client,
        })
    }

    /// Override the base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Translate prompt turns to the Anthropic message shape.
    ///
    /// User and assistant turns pass through. Each system turn is folded
    /// into the first user message: its content plus a blank line is
    /// prepended. A system turn with no user message anywhere to fold into
    /// is dropped.
    fn to_api_messages(messages: &[ChatTurn]) -> Vec<ApiMessage> {
        let mut result: Vec<ApiMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect();

        let first_user = result.iter().position(|m| m.role == "user");
        if let Some(idx) = first_user {
            for msg in messages {
                if msg.role == Role::System {
                    result[idx].content = format!("{}\n\n{}", msg.content, result[idx].content);
                }
            }
        }

        result
    }

    /// Build the request body.
    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::UpstreamTimeout(format!("{}: {e}", self.name))
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic-style API error");
            return Err(ProviderError::Upstream {
                status,
                body: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::Upstream {
                status: 200,
                body: format!("Failed to parse response: {e}"),
            })?;

        let content = api_response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| ProviderError::Upstream {
                status: 200,
                body: "No content blocks in response".into(),
            })?;

        Ok(Completion {
            content,
            usage: api_response.usage.unwrap_or_default(),
            model: request.model,
            provider: self.name.clone(),
        })
    }
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}
