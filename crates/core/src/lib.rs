//! # Palaver Core
//!
//! Domain types, traits, and error definitions for the Palaver conversation
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod cache;
pub mod error;
pub mod message;
pub mod model;
pub mod provider;
pub mod snapshot;
pub mod store;
pub mod toolserver;

// Re-export key types at crate root for ergonomics
pub use cache::Cache;
pub use error::{Error, ProviderError, Result, StoreError, ToolServerError};
pub use message::{Conversation, ConversationId, Message, Role};
pub use model::ModelRecord;
pub use provider::{ChatTurn, Completion, CompletionRequest, ProviderAdapter};
pub use snapshot::{HistoryEntry, MemorySnapshot};
pub use store::Store;
pub use toolserver::{ToolServerRecord, ToolTransport, TransportKind};
