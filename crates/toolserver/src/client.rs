//! The tool augmentation client — resolves a server record and routes the
//! call through its configured transport, under a fixed deadline.

use crate::http::HttpTransport;
use crate::socket::SocketRpcTransport;
use palaver_core::error::ToolServerError;
use palaver_core::store::Store;
use palaver_core::toolserver::{ToolTransport, TransportKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Invokes methods on configured tool servers, best-effort.
pub struct ToolAugmentationClient {
    store: Arc<dyn Store>,
    http: Arc<dyn ToolTransport>,
    socket_rpc: Arc<dyn ToolTransport>,
    timeout: Duration,
}

impl ToolAugmentationClient {
    /// Create a client with the built-in transports.
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Result<Self, ToolServerError> {
        Ok(Self {
            store,
            http: Arc::new(HttpTransport::new()?),
            socket_rpc: Arc::new(SocketRpcTransport::new()),
            timeout,
        })
    }

    /// Create a client with custom transports (tests inject failures here).
    pub fn with_transports(
        store: Arc<dyn Store>,
        http: Arc<dyn ToolTransport>,
        socket_rpc: Arc<dyn ToolTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            http,
            socket_rpc,
            timeout,
        }
    }

    fn transport_for(&self, kind: TransportKind) -> &Arc<dyn ToolTransport> {
        match kind {
            TransportKind::Http => &self.http,
            TransportKind::SocketRpc => &self.socket_rpc,
        }
    }

    /// Invoke `method` on the server identified by `server_id`.
    ///
    /// An absent or inactive record fails with `UnknownServer`; exceeding
    /// the configured deadline with `TransportTimeout`.
    pub async fn invoke(
        &self,
        server_id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ToolServerError> {
        let record = self
            .store
            .tool_server(server_id)
            .await
            .map_err(|e| ToolServerError::Transport(format!("server lookup: {e}")))?
            .filter(|s| s.is_active)
            .ok_or_else(|| ToolServerError::UnknownServer(server_id.to_string()))?;

        debug!(
            server = %record.name,
            transport = ?record.transport,
            %method,
            "Invoking tool server"
        );

        let transport = self.transport_for(record.transport);
        match tokio::time::timeout(
            self.timeout,
            transport.call(&record.endpoint, method, params),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ToolServerError::TransportTimeout(format!(
                "{method} on {} after {}s",
                record.name,
                self.timeout.as_secs()
            ))),
        }
    }

    /// Minimal reachability probe for external admin use. Never errors:
    /// unknown, inactive, or unreachable servers all report `false`.
    pub async fn connectivity_check(&self, server_id: &str) -> bool {
        let record = match self.store.tool_server(server_id).await {
            Ok(Some(record)) if record.is_active => record,
            _ => return false,
        };

        let transport = self.transport_for(record.transport);
        tokio::time::timeout(self.timeout, transport.probe(&record.endpoint))
            .await
            .unwrap_or(false)
    }
}
