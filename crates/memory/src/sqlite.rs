//! SQLite store backend.
//!
//! A single database file with five tables: `conversations`, `messages`,
//! `chat_sessions`, `llm_models`, and `tool_servers`. Foreign keys are ON;
//! deleting a conversation cascades to its messages and session row.

use async_trait::async_trait;
use palaver_core::error::StoreError;
use palaver_core::message::{Conversation, ConversationId, Message, Role};
use palaver_core::model::ModelRecord;
use palaver_core::snapshot::MemorySnapshot;
use palaver_core::store::Store;
use palaver_core::toolserver::{ToolServerRecord, TransportKind};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// A durable SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Backend(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id             TEXT PRIMARY KEY,
                title          TEXT NOT NULL,
                user_id        TEXT NOT NULL,
                model_id       TEXT,
                tool_server_id TEXT,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT UNIQUE NOT NULL,
                conversation_id TEXT NOT NULL
                    REFERENCES conversations(id) ON DELETE CASCADE,
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                metadata        TEXT NOT NULL DEFAULT '{}',
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                conversation_id TEXT PRIMARY KEY
                    REFERENCES conversations(id) ON DELETE CASCADE,
                memory_data     TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("chat_sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS llm_models (
                id             TEXT PRIMARY KEY,
                name           TEXT NOT NULL,
                provider       TEXT NOT NULL,
                model_name     TEXT NOT NULL,
                credential_ref TEXT NOT NULL,
                is_active      INTEGER NOT NULL DEFAULT 1,
                created_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("llm_models table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tool_servers (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                transport  TEXT NOT NULL,
                endpoint   TEXT NOT NULL,
                is_active  INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("tool_servers table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("messages index: {e}")))?;

        Ok(())
    }

    /// Upsert a model record (configuration management is external; this is
    /// the wiring entry point).
    pub async fn upsert_model(&self, record: &ModelRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO llm_models (id, name, provider, model_name, credential_ref, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                provider = excluded.provider,
                model_name = excluded.model_name,
                credential_ref = excluded.credential_ref,
                is_active = excluded.is_active
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.provider)
        .bind(&record.model_name)
        .bind(&record.credential_ref)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Upsert a tool server record.
    pub async fn upsert_tool_server(&self, record: &ToolServerRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tool_servers (id, name, transport, endpoint, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                transport = excluded.transport,
                endpoint = excluded.endpoint,
                is_active = excluded.is_active
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(transport_str(record.transport))
        .bind(&record.endpoint)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

fn parse_role(s: &str) -> Result<Role, StoreError> {
    match s {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "system" => Ok(Role::System),
        other => Err(StoreError::Serialization(format!("unknown role: {other}"))),
    }
}

fn transport_str(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::Http => "http",
        TransportKind::SocketRpc => "socket-rpc",
    }
}

fn parse_transport(s: &str) -> Result<TransportKind, StoreError> {
    match s {
        "http" => Ok(TransportKind::Http),
        "socket-rpc" => Ok(TransportKind::SocketRpc),
        other => Err(StoreError::Serialization(format!(
            "unknown transport: {other}"
        ))),
    }
}

fn parse_metadata(
    raw: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, user_id, model_id, tool_server_id, created_at, updated_at
             FROM conversations WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|row| {
            Ok(Conversation {
                id: ConversationId(row.try_get("id").map_err(backend)?),
                title: row.try_get("title").map_err(backend)?,
                user_id: row.try_get("user_id").map_err(backend)?,
                model_id: row.try_get("model_id").map_err(backend)?,
                tool_server_id: row.try_get("tool_server_id").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
                updated_at: row.try_get("updated_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO conversations (id, title, user_id, model_id, tool_server_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.title)
        .bind(&conversation.user_id)
        .bind(&conversation.model_id)
        .bind(&conversation.tool_server_id)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn messages(
        &self,
        id: &ConversationId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, StoreError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, metadata, created_at
             FROM messages WHERE conversation_id = ?
             ORDER BY created_at ASC, iid ASC
             LIMIT ?",
        )
        .bind(&id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let role: String = row.try_get("role").map_err(backend)?;
                let metadata: String = row.try_get("metadata").map_err(backend)?;
                Ok(Message {
                    id: row.try_get("id").map_err(backend)?,
                    conversation_id: ConversationId(
                        row.try_get("conversation_id").map_err(backend)?,
                    ),
                    role: parse_role(&role)?,
                    content: row.try_get("content").map_err(backend)?,
                    metadata: parse_metadata(&metadata)?,
                    created_at: row.try_get("created_at").map_err(backend)?,
                })
            })
            .collect()
    }

    async fn append_message(&self, message: Message) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(metadata)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn session(
        &self,
        id: &ConversationId,
    ) -> Result<Option<MemorySnapshot>, StoreError> {
        let row = sqlx::query("SELECT memory_data FROM chat_sessions WHERE conversation_id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|row| {
            let raw: String = row.try_get("memory_data").map_err(backend)?;
            serde_json::from_str(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn put_session(
        &self,
        id: &ConversationId,
        snapshot: MemorySnapshot,
    ) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(&snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (conversation_id, memory_data, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(conversation_id) DO UPDATE SET
                memory_data = excluded.memory_data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id.0)
        .bind(encoded)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn model(&self, id: &str) -> Result<Option<ModelRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, provider, model_name, credential_ref, is_active, created_at
             FROM llm_models WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|row| {
            Ok(ModelRecord {
                id: row.try_get("id").map_err(backend)?,
                name: row.try_get("name").map_err(backend)?,
                provider: row.try_get("provider").map_err(backend)?,
                model_name: row.try_get("model_name").map_err(backend)?,
                credential_ref: row.try_get("credential_ref").map_err(backend)?,
                is_active: row.try_get("is_active").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
            })
        })
        .transpose()
    }

    async fn tool_server(&self, id: &str) -> Result<Option<ToolServerRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, transport, endpoint, is_active, created_at
             FROM tool_servers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|row| {
            let transport: String = row.try_get("transport").map_err(backend)?;
            Ok(ToolServerRecord {
                id: row.try_get("id").map_err(backend)?,
                name: row.try_get("name").map_err(backend)?,
                transport: parse_transport(&transport)?,
                endpoint: row.try_get("endpoint").map_err(backend)?,
                is_active: row.try_get("is_active").map_err(backend)?,
                created_at: row.try_get("created_at").map_err(backend)?,
            })
        })
        .transpose()
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}
