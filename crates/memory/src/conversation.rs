//! Cache-aside conversation memory.
//!
//! Reads consult the cache first and fall back to the durable session
//! record, synthesizing an empty snapshot when none exists. Writes go
//! through to both layers (durable first). The cache copy is an expendable
//! replica with a bounded lifetime; the durable copy is authoritative on a
//! miss or after a restart.

use palaver_core::cache::Cache;
use palaver_core::error::StoreError;
use palaver_core::message::{ConversationId, Role};
use palaver_core::snapshot::{HistoryEntry, MemorySnapshot};
use palaver_core::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How many history entries feed a context summary, and where each line is
/// clipped.
const SUMMARY_WINDOW: usize = 10;
const SUMMARY_CLIP: usize = 100;

/// Bounded, cache-backed memory of a conversation's recent context.
pub struct ConversationMemory {
    store: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
    /// Cap on stored history entries (oldest evicted first).
    max_history: usize,
    /// Cache entry time-to-live.
    ttl: Duration,
}

fn cache_key(id: &ConversationId) -> String {
    format!("chat_memory:{id}")
}

impl ConversationMemory {
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        max_history: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            max_history,
            ttl,
        }
    }

    /// The configured history cap.
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Read the current snapshot.
    ///
    /// Cache hit: the cached copy is returned as-is. Cache miss: the durable
    /// session record is loaded (or an empty snapshot synthesized) and the
    /// result is written into the cache with a fresh TTL before returning.
    pub async fn read(&self, id: &ConversationId) -> Result<MemorySnapshot, StoreError> {
        let key = cache_key(id);

        if let Some(raw) = self.cache.get(&key).await? {
            match serde_json::from_str::<MemorySnapshot>(&raw) {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    // Corrupt cache entry: treat as a miss and repopulate below.
                    warn!(conversation = %id, error = %e, "Discarding undecodable cache entry");
                }
            }
        }

        let snapshot = self
            .store
            .session(id)
            .await?
            .unwrap_or_else(MemorySnapshot::empty);

        self.write_cache(&key, &snapshot).await?;
        Ok(snapshot)
    }

    /// Append one turn to the conversation history, evicting the oldest
    /// entries past the configured cap, and write the updated snapshot to
    /// both the durable session record and the cache.
    ///
    /// Read-modify-write without per-conversation serialization: two
    /// concurrent appends on the same conversation can race and the second
    /// write wins. Callers needing strict ordering must serialize access
    /// per conversation externally.
    pub async fn append(
        &self,
        id: &ConversationId,
        role: Role,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), StoreError> {
        let mut snapshot = self.read(id).await?;
        let entry = HistoryEntry::new(role, content).with_metadata(metadata);
        snapshot.push_bounded(entry, self.max_history);

        self.store.put_session(id, snapshot.clone()).await?;
        self.write_cache(&cache_key(id), &snapshot).await?;

        debug!(
            conversation = %id,
            entries = snapshot.conversation_history.len(),
            "Appended to conversation memory"
        );
        Ok(())
    }

    /// Reset the durable snapshot to the empty default and drop the cache
    /// entry outright (it is not re-populated until the next read).
    pub async fn clear(&self, id: &ConversationId) -> Result<(), StoreError> {
        self.store.put_session(id, MemorySnapshot::empty()).await?;
        self.cache.delete(&cache_key(id)).await?;
        Ok(())
    }

    /// A plain-text summary of the recent exchange: one clipped line per
    /// user/assistant entry in the last few turns.
    pub async fn context_summary(&self, id: &ConversationId) -> Result<String, StoreError> {
        let snapshot = self.read(id).await?;
        let lines: Vec<String> = snapshot
            .recent(SUMMARY_WINDOW)
            .iter()
            .filter_map(|entry| {
                let speaker = match entry.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => return None,
                };
                Some(format!("{speaker}: {}...", clip(&entry.content, SUMMARY_CLIP)))
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn write_cache(&self, key: &str, snapshot: &MemorySnapshot) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.cache.put(key, encoded, self.ttl).await
    }
}

/// Clip to at most `max` characters on a char boundary.
fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
