use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A retrieved document chunk attached to an assistant message.
///
/// Read-only once created; the client never mutates source attributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceChunk {
    pub text: String,
    pub score: f32,
    pub document_id: String,
    pub filename: String,
    pub chunk_index: u32,
}

/// A single turn in the in-memory conversation log.
///
/// `id` is `None` immediately after optimistic insertion and is back-filled
/// once the server assigns one. Synthetic client-only error messages never
/// receive an id. Log order is insertion order; nothing re-sorts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceChunk>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_self_check: Option<bool>,
}

impl ChatMessage {
    /// An optimistic user turn: no server id yet, timestamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: ChatRole::User,
            content: content.into(),
            sources: Vec::new(),
            timestamp: Utc::now(),
            model: None,
            use_self_check: None,
        }
    }

    /// A synthetic assistant turn carrying an error text. Never reconciled.
    pub fn assistant_error(error: &str) -> Self {
        Self {
            id: None,
            role: ChatRole::Assistant,
            content: format!("Something went wrong: {error}"),
            sources: Vec::new(),
            timestamp: Utc::now(),
            model: None,
            use_self_check: None,
        }
    }

    /// True for a user turn that has not yet received its server id.
    pub fn is_unreconciled_user(&self) -> bool {
        self.role == ChatRole::User && self.id.is_none()
    }
}
