//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use palaver_core::error::StoreError;
use palaver_core::message::{Conversation, ConversationId, Message};
use palaver_core::model::ModelRecord;
use palaver_core::snapshot::MemorySnapshot;
use palaver_core::store::Store;
use palaver_core::toolserver::ToolServerRecord;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A store that keeps everything in process memory.
pub struct InMemoryStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    messages: RwLock<Vec<Message>>,
    sessions: RwLock<HashMap<ConversationId, MemorySnapshot>>,
    models: RwLock<HashMap<String, ModelRecord>>,
    tool_servers: RwLock<HashMap<String, ToolServerRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            sessions: RwLock::new(HashMap::new()),
            models: RwLock::new(HashMap::new()),
            tool_servers: RwLock::new(HashMap::new()),
        }
    }

    /// Seed a model record (configuration records are managed externally;
    /// this is the wiring/test entry point).
    pub async fn add_model(&self, record: ModelRecord) {
        self.models.write().await.insert(record.id.clone(), record);
    }

    /// Seed a tool server record.
    pub async fn add_tool_server(&self, record: ToolServerRecord) {
        self.tool_servers
            .write()
            .await
            .insert(record.id.clone(), record);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let removed = self.conversations.write().await.remove(id).is_some();
        if removed {
            // Cascade: messages and session go with the conversation
            self.messages
                .write()
                .await
                .retain(|m| &m.conversation_id != id);
            self.sessions.write().await.remove(id);
        }
        Ok(removed)
    }

    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().await;
        let mut result: Vec<Message> = messages
            .iter()
            .filter(|m| &m.conversation_id == id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        Ok(result)
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn session(
        &self,
        id: &ConversationId,
    ) -> Result<Option<MemorySnapshot>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put_session(
        &self,
        id: &ConversationId,
        snapshot: MemorySnapshot,
    ) -> Result<(), StoreError> {
        self.sessions.write().await.insert(id.clone(), snapshot);
        Ok(())
    }

    async fn model(&self, id: &str) -> Result<Option<ModelRecord>, StoreError> {
        Ok(self.models.read().await.get(id).cloned())
    }

    async fn tool_server(&self, id: &str) -> Result<Option<ToolServerRecord>, StoreError> {
        Ok(self.tool_servers.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::message::Role;
    use palaver_core::toolserver::TransportKind;

    #[tokio::test]
    async fn conversation_roundtrip() {
        let store = InMemoryStore::new();
        let conv = Conversation::new("Test", "user-1");
        let id = conv.id.clone();
        store.create_conversation(conv).await.unwrap();

        let loaded = store.conversation(&id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Test");
        assert_eq!(loaded.user_id, "user-1");
    }

    #[tokio::test]
    async fn messages_are_ordered_by_created_at() {
        let store = InMemoryStore::new();
        let id = ConversationId::from("conv-1");

        let mut first = Message::user(id.clone(), "first");
        let mut second = Message::assistant(id.clone(), "second");
        // Force distinct, ordered timestamps
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        second.created_at = chrono::Utc::now();

        // Insert out of order
        store.append_message(second).await.unwrap();
        store.append_message(first).await.unwrap();

        let messages = store.messages(&id, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn messages_limit_applies_from_the_front() {
        let store = InMemoryStore::new();
        let id = ConversationId::from("conv-1");
        for i in 0..5 {
            let mut msg = Message::user(id.clone(), format!("m{i}"));
            msg.created_at = chrono::Utc::now() + chrono::Duration::seconds(i);
            store.append_message(msg).await.unwrap();
        }
        let messages = store.messages(&id, Some(2)).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "m0");
    }

    #[tokio::test]
    async fn delete_cascades_to_messages_and_session() {
        let store = InMemoryStore::new();
        let conv = Conversation::new("Doomed", "user-1");
        let id = conv.id.clone();
        store.create_conversation(conv).await.unwrap();
        store
            .append_message(Message::user(id.clone(), "hi"))
            .await
            .unwrap();
        store
            .put_session(&id, MemorySnapshot::empty())
            .await
            .unwrap();

        assert!(store.delete_conversation(&id).await.unwrap());
        assert!(store.conversation(&id).await.unwrap().is_none());
        assert!(store.messages(&id, None).await.unwrap().is_empty());
        assert!(store.session(&id).await.unwrap().is_none());

        // Deleting again reports nothing removed
        assert!(!store.delete_conversation(&id).await.unwrap());
    }

    #[tokio::test]
    async fn config_record_lookup() {
        let store = InMemoryStore::new();
        store
            .add_model(ModelRecord::new("m1", "openai", "gpt-4", "openai_key"))
            .await;
        store
            .add_tool_server(ToolServerRecord::new(
                "s1",
                "enricher",
                TransportKind::Http,
                "http://localhost:9000",
            ))
            .await;

        assert!(store.model("m1").await.unwrap().is_some());
        assert!(store.model("m2").await.unwrap().is_none());
        assert!(store.tool_server("s1").await.unwrap().is_some());
        assert!(store.tool_server("s2").await.unwrap().is_none());
    }
}
