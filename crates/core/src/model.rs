//! LLM model configuration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured LLM model a conversation can be answered by.
///
/// `provider` is the dispatch tag the gateway's adapter registry is keyed
/// by (e.g. `"openai"`, `"anthropic"`); `model_name` is the upstream model
/// identifier sent on the wire; `credential_ref` names the API key in the
/// credentials configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Unique record ID
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Provider dispatch tag
    pub provider: String,

    /// Upstream model identifier (e.g. "gpt-4", "claude-3-sonnet")
    pub model_name: String,

    /// Name of the credential entry holding the API key
    pub credential_ref: String,

    /// Whether this model may be used
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// When this record was created
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl ModelRecord {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        model_name: impl Into<String>,
        credential_ref: impl Into<String>,
    ) -> Self {
        let model_name = model_name.into();
        Self {
            id: id.into(),
            name: model_name.clone(),
            provider: provider.into(),
            model_name,
            credential_ref: credential_ref.into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }
}
