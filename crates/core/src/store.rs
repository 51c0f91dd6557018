//! The durable store contract.
//!
//! The pipeline consumes this trait; persistence mechanics live behind it.
//! Message rows are append-only and ordered by `created_at` ascending;
//! deleting a conversation cascades to its messages and session record.

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, Message};
use crate::model::ModelRecord;
use crate::snapshot::MemorySnapshot;
use crate::toolserver::ToolServerRecord;
use async_trait::async_trait;

/// The durable store every turn runs against.
///
/// Implementations: SQLite, in-memory (for tests and ephemeral sessions).
#[async_trait]
pub trait Store: Send + Sync {
    /// The backend name (e.g. "sqlite", "in_memory").
    fn name(&self) -> &str;

    // ── Conversations ────────────────────────────────────────────────

    /// Look up a conversation by ID.
    async fn conversation(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Option<Conversation>, StoreError>;

    /// Persist a new conversation.
    async fn create_conversation(
        &self,
        conversation: Conversation,
    ) -> std::result::Result<(), StoreError>;

    /// Delete a conversation and, by cascade, its messages and session.
    /// Returns whether a row was removed.
    async fn delete_conversation(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<bool, StoreError>;

    // ── Messages ─────────────────────────────────────────────────────

    /// All messages of a conversation, ordered by `created_at` ascending.
    /// With `limit`, only the first `limit` messages are returned.
    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<usize>,
    ) -> std::result::Result<Vec<Message>, StoreError>;

    /// Append one message row.
    async fn append_message(&self, message: Message) -> std::result::Result<(), StoreError>;

    // ── Sessions (memory snapshots) ──────────────────────────────────

    /// The durable memory snapshot for a conversation, if one exists.
    async fn session(
        &self,
        id: &ConversationId,
    ) -> std::result::Result<Option<MemorySnapshot>, StoreError>;

    /// Upsert the durable memory snapshot for a conversation.
    async fn put_session(
        &self,
        id: &ConversationId,
        snapshot: MemorySnapshot,
    ) -> std::result::Result<(), StoreError>;

    // ── Configuration records ────────────────────────────────────────

    /// Look up a model record by ID.
    async fn model(&self, id: &str) -> std::result::Result<Option<ModelRecord>, StoreError>;

    /// Look up a tool server record by ID.
    async fn tool_server(
        &self,
        id: &str,
    ) -> std::result::Result<Option<ToolServerRecord>, StoreError>;
}
