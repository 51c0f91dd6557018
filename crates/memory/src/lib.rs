//! Conversation memory for Palaver: cache-aside snapshots over a durable
//! store, plus the store and cache implementations.

pub mod cache;
pub mod conversation;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cache::InMemoryCache;
pub use conversation::ConversationMemory;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
