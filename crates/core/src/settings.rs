use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How retrieval blends lexical and vector scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Vector,
    Keyword,
    Hybrid,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown retrieval mode: {0} (expected vector, keyword, or hybrid)")]
pub struct ParseRetrievalModeError(String);

impl FromStr for RetrievalMode {
    type Err = ParseRetrievalModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "keyword" | "bm25" => Ok(Self::Keyword),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ParseRetrievalModeError(other.to_string())),
        }
    }
}

/// Directive for expanding retrieved chunks with surrounding context.
///
/// Explicitly tagged on the wire so each known shape stays a typed variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum ContextExpansion {
    /// Pull in neighboring chunks around each hit.
    #[serde(rename_all = "camelCase")]
    Neighbors { before: u32, after: u32 },
    /// Expand each hit to its enclosing document section.
    Section,
}

/// The full retrieval/generation parameter set carried on every chat request.
///
/// The client only transports these values; scoring and generation happen
/// server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    pub top_k: u32,
    pub temperature: f32,
    pub retrieval_mode: RetrievalMode,
    /// Weight of vector similarity in hybrid scoring.
    pub vector_weight: f32,
    /// Weight of lexical (BM25) match in hybrid scoring.
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
    pub context_expansion: Option<ContextExpansion>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            temperature: 0.7,
            retrieval_mode: RetrievalMode::Hybrid,
            vector_weight: 0.7,
            keyword_weight: 0.3,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            score_threshold: 0.0,
            max_context_chars: 8000,
            model: None,
            provider: None,
            use_structure_search: false,
            use_mmr: false,
            mmr_diversity: 0.5,
            use_self_check: false,
            include_history: true,
            history_limit: 10,
            document_ids: None,
            context_expansion: None,
        }
    }
}

/// Per-conversation overrides. Every field is optional; unset fields fall
/// back to the app-level defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_mode: Option<RetrievalMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_k1: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bm25_b: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_chars: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_structure_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_mmr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mmr_diversity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_self_check: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_expansion: Option<ContextExpansion>,
}

impl ChatSettings {
    /// Resolve effective settings: conversation-level override wins over the
    /// app-level default, field by field. This is the single write path for
    /// settings; nothing else merges the two layers.
    pub fn resolve(defaults: &ChatSettings, overrides: &ChatOverrides) -> ChatSettings {
        ChatSettings {
            top_k: overrides.top_k.unwrap_or(defaults.top_k),
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            retrieval_mode: overrides.retrieval_mode.unwrap_or(defaults.retrieval_mode),
            vector_weight: overrides.vector_weight.unwrap_or(defaults.vector_weight),
            keyword_weight: overrides.keyword_weight.unwrap_or(defaults.keyword_weight),
            bm25_k1: overrides.bm25_k1.unwrap_or(defaults.bm25_k1),
            bm25_b: overrides.bm25_b.unwrap_or(defaults.bm25_b),
            score_threshold: overrides.score_threshold.unwrap_or(defaults.score_threshold),
            max_context_chars: overrides
                .max_context_chars
                .unwrap_or(defaults.max_context_chars),
            model: overrides.model.clone().or_else(|| defaults.model.clone()),
            provider: overrides
                .provider
                .clone()
                .or_else(|| defaults.provider.clone()),
            use_structure_search: overrides
                .use_structure_search
                .unwrap_or(defaults.use_structure_search),
            use_mmr: overrides.use_mmr.unwrap_or(defaults.use_mmr),
            mmr_diversity: overrides.mmr_diversity.unwrap_or(defaults.mmr_diversity),
            use_self_check: overrides.use_self_check.unwrap_or(defaults.use_self_check),
            include_history: overrides
                .include_history
                .unwrap_or(defaults.include_history),
            history_limit: overrides.history_limit.unwrap_or(defaults.history_limit),
            document_ids: overrides
                .document_ids
                .clone()
                .or_else(|| defaults.document_ids.clone()),
            context_expansion: overrides
                .context_expansion
                .clone()
                .or_else(|| defaults.context_expansion.clone()),
        }
    }
}
