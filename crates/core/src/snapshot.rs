//! The bounded conversation memory snapshot.
//!
//! A snapshot is the short-term context a turn is assembled from. It lives
//! in two places: the durable session record (long-term authority) and a
//! cache entry with a bounded lifetime (short-term authority). The cache
//! copy is an expendable replica — on a miss or after a restart the durable
//! copy wins.

use crate::message::Role;
use serde::{Deserialize, Serialize};

/// Current snapshot schema version. Bump when the wire shape changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// One entry of bounded conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A conversation's bounded memory.
///
/// Invariant: `conversation_history.len() <= cap` for the cap it was
/// maintained with; [`MemorySnapshot::push_bounded`] drops the oldest
/// entries first when the cap is exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Schema version of this snapshot's encoding.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Free-form context carried across turns.
    #[serde(default)]
    pub context: String,

    /// Rolling summary of the conversation.
    #[serde(default)]
    pub summary: String,

    /// Key points extracted from the conversation.
    #[serde(default)]
    pub key_points: Vec<String>,

    /// Recent turns, oldest first.
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

fn default_schema_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

impl MemorySnapshot {
    /// The empty default snapshot, synthesized when no durable session exists.
    pub fn empty() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            context: String::new(),
            summary: String::new(),
            key_points: Vec::new(),
            conversation_history: Vec::new(),
        }
    }

    /// Append an entry, evicting the oldest entries once `cap` is exceeded.
    pub fn push_bounded(&mut self, entry: HistoryEntry, cap: usize) {
        self.conversation_history.push(entry);
        if self.conversation_history.len() > cap {
            let excess = self.conversation_history.len() - cap;
            self.conversation_history.drain(..excess);
        }
    }

    /// The most recent `k` history entries, oldest first.
    pub fn recent(&self, k: usize) -> &[HistoryEntry] {
        let len = self.conversation_history.len();
        &self.conversation_history[len.saturating_sub(k)..]
    }
}

impl Default for MemorySnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
