//! Socket-RPC transport: JSON-RPC 2.0 over a TCP connection.
//!
//! One newline-terminated request envelope goes out, exactly one
//! newline-terminated response comes back. A top-level `error` object maps
//! to [`ToolServerError::Remote`]; otherwise the `result` field is
//! returned (`{}` if the server omitted it).

use async_trait::async_trait;
use palaver_core::error::ToolServerError;
use palaver_core::toolserver::ToolTransport;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Fallback JSON-RPC error code when the server omits one.
const UNSPECIFIED_REMOTE_ERROR: i64 = -32000;

/// Carries tool calls as JSON-RPC 2.0 over TCP.
pub struct SocketRpcTransport;

impl SocketRpcTransport {
    pub fn new() -> Self {
        Self
    }

    /// Build the request envelope. The id is fixed: each call opens its own
    /// connection and reads a single response.
    fn envelope(method: &str, params: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        })
    }

    /// Interpret one JSON-RPC response.
    fn interpret(response: serde_json::Value) -> Result<serde_json::Value, ToolServerError> {
        if let Some(error) = response.get("error") {
            return Err(ToolServerError::Remote {
                code: error
                    .get("code")
                    .and_then(|c| c.as_i64())
                    .unwrap_or(UNSPECIFIED_REMOTE_ERROR),
                message: error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unspecified error")
                    .to_string(),
            });
        }
        Ok(response
            .get("result")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})))
    }
}

impl Default for SocketRpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolTransport for SocketRpcTransport {
    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolServerError> {
        debug!(%endpoint, %method, "Calling tool server over socket-RPC");

        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|e| ToolServerError::Transport(format!("connect {endpoint}: {e}")))?;
        let (read_half, mut write_half) = stream.into_split();

        let mut request = serde_json::to_vec(&Self::envelope(method, &params))
            .map_err(|e| ToolServerError::Transport(e.to_string()))?;
        request.push(b'\n');
        write_half
            .write_all(&request)
            .await
            .map_err(|e| ToolServerError::Transport(format!("write: {e}")))?;
        write_half
            .flush()
            .await
            .map_err(|e| ToolServerError::Transport(format!("flush: {e}")))?;

        let mut line = String::new();
        let mut reader = BufReader::new(read_half);
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| ToolServerError::Transport(format!("read: {e}")))?;
        if read == 0 {
            return Err(ToolServerError::Transport(
                "connection closed before a response arrived".into(),
            ));
        }

        let response: serde_json::Value = serde_json::from_str(line.trim_end())
            .map_err(|e| ToolServerError::Transport(format!("invalid JSON response: {e}")))?;
        Self::interpret(response)
    }

    async fn probe(&self, endpoint: &str) -> bool {
        TcpStream::connect(endpoint).await.is_ok()
    }
}
