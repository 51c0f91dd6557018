//! OpenAI-style provider adapter.
//!
//! Works with OpenAI and any backend exposing a compatible
//! `/chat/completions` endpoint.
//!
//! - `Authorization: Bearer <key>` authentication
//! - Request body `{model, messages, max_tokens, temperature}`
//! - Response content at `choices[0].message.content`

use async_trait::async_trait;
use palaver_core::error::ProviderError;
use palaver_core::provider::{ChatTurn, Completion, CompletionRequest, ProviderAdapter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-style chat completions adapter.
pub struct OpenAiAdapter {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Create a new adapter with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: "openai".into(),
            base_url: DEFAULT_BASE_URL.into(),
            client,
        })
    }

    /// Override the base URL (testing, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert prompt turns to the wire message shape.
    fn to_api_messages(messages: &[ChatTurn]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
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
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> std::result::Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
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
            warn!(status, body = %error_body, "OpenAI-style API error");
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

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Upstream {
                status: 200,
                body: "No choices in response".into(),
            })?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
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
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::message::Role;

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4".into(),
            messages: vec![
                ChatTurn::new(Role::System, "You are helpful"),
                ChatTurn::new(Role::User, "Hello"),
            ],
            max_tokens: 4000,
            temperature: 0.7,
        }
    }

    #[test]
    fn constructor_defaults() {
        let adapter = OpenAiAdapter::new(Duration::from_secs(30)).unwrap();
        assert_eq!(adapter.name(), "openai");
        assert_eq!(adapter.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn base_url_override_strips_trailing_slash() {
        let adapter = OpenAiAdapter::new(Duration::from_secs(30))
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(adapter.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn message_conversion_keeps_all_roles() {
        let api_messages = OpenAiAdapter::to_api_messages(&request().messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[1].content, "Hello");
    }

    #[test]
    fn body_carries_model_and_params() {
        let body = OpenAiAdapter::build_body(&request());
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn parse_response() {
        let parsed: ApiResponse = serde_json::from_str(
            r#"{
                "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
                "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("Hi there")
        );
        assert_eq!(
            parsed.usage.unwrap()["total_tokens"],
            serde_json::json!(5)
        );
    }

    #[test]
    fn parse_response_without_usage() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "ok"}}]}"#).unwrap();
        assert!(parsed.usage.is_none());
    }
}
