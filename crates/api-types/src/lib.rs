//! Shared API types for basechat
//!
//! This crate is the **single source of truth** for all wire request/response
//! types exchanged with the knowledge-base chat service. The Rust client
//! imports them directly; TypeScript declarations for the browser rendering
//! layer are auto-generated via `ts-rs`.
//!
//! To regenerate TypeScript types:
//!   cargo test -p basechat-api-types -- export_typescript --nocapture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use basechat_core::{ChatRole, ChatSettings, ContextExpansion, SourceChunk};

// Re-export core domain types used on the wire for convenience
pub use basechat_core::status::{DocumentStatus, DocumentStatusSnapshot};

// ─── Chat ────────────────────────────────────────────────────────────────────

/// Body of `POST /chat`.
///
/// Carries the question plus the full retrieval/generation parameter set.
/// An absent `conversation_id` tells the server to create a new conversation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChatRequest {
    pub question: String,
    pub knowledge_base_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub top_k: u32,
    pub temperature: f32,
    #[ts(type = "string")]
    pub retrieval_mode: basechat_core::RetrievalMode,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub score_threshold: f32,
    pub max_context_chars: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub use_structure_search: bool,
    pub use_mmr: bool,
    pub mmr_diversity: f32,
    pub use_self_check: bool,
    pub include_history: bool,
    pub history_limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "any | null")]
    pub context_expansion: Option<ContextExpansion>,
}

impl ChatRequest {
    /// Build a request from resolved settings.
    pub fn new(
        question: impl Into<String>,
        knowledge_base_id: impl Into<String>,
        conversation_id: Option<String>,
        settings: &ChatSettings,
    ) -> Self {
        Self {
            question: question.into(),
            knowledge_base_id: knowledge_base_id.into(),
            conversation_id,
            top_k: settings.top_k,
            temperature: settings.temperature,
            retrieval_mode: settings.retrieval_mode,
            vector_weight: settings.vector_weight,
            keyword_weight: settings.keyword_weight,
            bm25_k1: settings.bm25_k1,
            bm25_b: settings.bm25_b,
            score_threshold: settings.score_threshold,
            max_context_chars: settings.max_context_chars,
            model: settings.model.clone(),
            provider: settings.provider.clone(),
            use_structure_search: settings.use_structure_search,
            use_mmr: settings.use_mmr,
            mmr_diversity: settings.mmr_diversity,
            use_self_check: settings.use_self_check,
            include_history: settings.include_history,
            history_limit: settings.history_limit,
            document_ids: settings.document_ids.clone(),
            context_expansion: settings.context_expansion.clone(),
        }
    }
}

/// Response of `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default)]
    #[ts(type = "any[]")]
    pub sources: Vec<SourceChunk>,
    /// The conversation this turn belongs to. Differs from the request's id
    /// exactly when the server just created the conversation.
    pub conversation_id: String,
    pub user_message_id: String,
    pub assistant_message_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_mmr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmr_diversity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_self_check: Option<bool>,
}

// ─── Conversations ───────────────────────────────────────────────────────────

/// Flat conversation summary returned by the list endpoint.
/// Created server-side on first send; the client only reads, renames, and
/// deletes it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ConversationSummary {
    pub id: String,
    pub knowledge_base_id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One stored message, as returned by
/// `GET /chat/conversations/{id}/messages` in server order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ChatMessageResponse {
    pub id: String,
    #[ts(type = "string")]
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    #[ts(type = "any[]")]
    pub sources: Vec<SourceChunk>,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_self_check: Option<bool>,
    /// Position within the conversation, assigned by the server.
    pub index: u32,
}

/// Body of `PATCH /chat/conversations/{id}`. A `None` title clears it back
/// to the untitled state.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RenameConversationRequest {
    pub title: Option<String>,
}

/// Response of `DELETE /chat/conversations/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteConversationResponse {
    pub status: String,
    pub id: String,
}

/// Response of `DELETE /chat/conversations/{id}/messages/{messageId}?pair=`.
///
/// `deleted_ids` lists every message the server removed; with `pair=true`
/// that includes the paired turn the caller did not name.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeleteMessageResponse {
    pub status: String,
    pub deleted_ids: Vec<String>,
}

// ─── Error ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub error: String,
}

// ─── TypeScript generation ───────────────────────────────────────────────────
