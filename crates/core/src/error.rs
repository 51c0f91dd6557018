//! Error types for the Palaver domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::message::ConversationId;
use thiserror::Error;

/// The top-level error type for all Palaver operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The conversation does not exist or is not owned by the caller.
    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool server errors ---
    #[error("Tool server error: {0}")]
    ToolServer(#[from] ToolServerError),

    // --- Memory store errors ---
    #[error("Memory store error: {0}")]
    MemoryStore(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("No credential configured for provider: {0}")]
    MissingCredential(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Upstream API error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolServerError {
    #[error("Unknown or inactive tool server: {0}")]
    UnknownServer(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Tool server call timed out: {0}")]
    TransportTimeout(String),

    #[error("Tool server returned error {code}: {message}")]
    Remote { code: i64, message: String },
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Corrupt record: {0}")]
    Serialization(String),
}
