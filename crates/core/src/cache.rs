//! The volatile cache contract.
//!
//! Values are opaque strings (the memory layer stores JSON-encoded
//! snapshots) with a per-entry time-to-live. An expired entry behaves
//! exactly like an absent one.

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;

/// A string cache with per-entry expiry.
///
/// Implementations: in-memory (default). The trait keeps the seam open for
/// an external cache process without the memory layer caring.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a live entry. Expired or missing entries return `None`.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;

    /// Store an entry with a fresh time-to-live.
    async fn put(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> std::result::Result<(), StoreError>;

    /// Remove an entry outright.
    async fn delete(&self, key: &str) -> std::result::Result<(), StoreError>;
}
