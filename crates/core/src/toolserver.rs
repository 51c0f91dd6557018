//! Tool server configuration records and the transport trait.
//!
//! A tool server is an external service that may enhance a draft response.
//! Calls to it are best-effort: the turn pipeline tolerates any failure
//! here.

use crate::error::ToolServerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a tool server is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    /// Plain HTTP: `POST {endpoint}/mcp/{method}`
    Http,
    /// JSON-RPC 2.0 over a duplex socket connection
    SocketRpc,
}

/// A configured tool server a conversation can be augmented by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerRecord {
    /// Unique record ID
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Which transport to use
    pub transport: TransportKind,

    /// Base URL (http) or `host:port` (socket-rpc)
    pub endpoint: String,

    /// Whether this server may be used
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// When this record was created
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ToolServerRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        transport: TransportKind,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            transport,
            endpoint: endpoint.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// One way of carrying a tool call to a server.
///
/// Implementations: HTTP and socket-RPC. The trait is the seam the client
/// dispatches through, and lets tests substitute a failing transport.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Invoke `method` with `params` against `endpoint` and return the
    /// server's result value.
    async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolServerError>;

    /// Minimal reachability probe. Never errors — unreachable is `false`.
    async fn probe(&self, endpoint: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&TransportKind::Http).unwrap(),
            "\"http\""
        );
        assert_eq!(
            serde_json::to_string(&TransportKind::SocketRpc).unwrap(),
            "\"socket-rpc\""
        );
    }

    #[test]
    fn record_roundtrip() {
        let record = ToolServerRecord::new(
            "srv-1",
            "enricher",
            TransportKind::SocketRpc,
            "127.0.0.1:9090",
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: ToolServerRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transport, TransportKind::SocketRpc);
        assert_eq!(back.endpoint, "127.0.0.1:9090");
        assert!(back.is_active);
    }
}
