//! Trace event model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a trace event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// A completed user-in/assistant-out exchange.
    Generation,
    /// A tool server invocation.
    ToolCall,
    /// A pipeline failure (fatal or absorbed).
    Error,
}

/// One observability record. Write-only and fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Correlates all events of one turn.
    pub trace_id: String,

    pub kind: TraceKind,

    /// Short human-readable label (e.g. "Chat Message - conv-1").
    pub name: String,

    #[serde(default)]
    pub input: serde_json::Value,

    #[serde(default)]
    pub output: serde_json::Value,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl TraceEvent {
    /// A fresh trace id for a new turn.
    pub fn new_trace_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// A completed exchange: user input, final output, model/provider info.
    pub fn generation(
        trace_id: impl Into<String>,
        conversation_id: impl std::fmt::Display,
        input: serde_json::Value,
        output: serde_json::Value,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            kind: TraceKind::Generation,
            name: format!("Chat Message - {conversation_id}"),
            input,
            output,
            metadata,
        }
    }

    /// A tool server call with its params and result.
    pub fn tool_call(
        trace_id: impl Into<String>,
        server_name: &str,
        method: &str,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("server_name".into(), serde_json::json!(server_name));
        metadata.insert("method".into(), serde_json::json!(method));
        Self {
            trace_id: trace_id.into(),
            kind: TraceKind::ToolCall,
            name: format!("Tool Call - {server_name}"),
            input,
            output,
            metadata,
        }
    }

    /// A failure, with a machine-readable kind tag in the metadata.
    pub fn error(
        trace_id: impl Into<String>,
        message: impl Into<String>,
        error_kind: &str,
        mut metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        metadata.insert("error_type".into(), serde_json::json!(error_kind));
        Self {
            trace_id: trace_id.into(),
            kind: TraceKind::Error,
            name: "Error".into(),
            input: serde_json::json!({ "error_message": message.into() }),
            output: serde_json::Value::Null,
            metadata,
        }
    }
}
