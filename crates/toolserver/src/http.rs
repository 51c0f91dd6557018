//! HTTP transport: `POST {endpoint}/mcp/{method}` with a JSON body.

use async_trait::async_trait;
use palaver_core::error::ToolServerError;
use palaver_core::toolserver::ToolTransport;
use tracing::debug;

/// Carries tool calls over plain HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ToolServerError> {
        // No per-request timeout here: the client wraps every call in its
        // own deadline.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ToolServerError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn url(endpoint: &str, method: &str) -> String {
        format!("{}/mcp/{}", endpoint.trim_end_matches('/'), method)
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolServerError> {
        let url = Self::url(endpoint, method);
        debug!(%url, "Calling tool server over HTTP");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&params)
            .send()
            .await
            .map_err(|e| ToolServerError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolServerError::Transport(format!(
                "tool server returned status {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ToolServerError::Transport(format!("invalid JSON response: {e}")))
    }

    async fn probe(&self, endpoint: &str) -> bool {
        match self.client.get(endpoint).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_method_path() {
        assert_eq!(
            HttpTransport::url("http://localhost:9000", "process_message"),
            "http://localhost:9000/mcp/process_message"
        );
    }

    #[test]
    fn url_strips_trailing_slash() {
        assert_eq!(
            HttpTransport::url("http://localhost:9000/", "ping"),
            "http://localhost:9000/mcp/ping"
        );
    }
}
