use serde::{Deserialize, Serialize};

/// Lifecycle state of a document ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// A document in a terminal state is no longer a polling candidate.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Last-known ingestion state for one document, as reported by the server.
///
/// Only the status poller's diff-and-notify step mutates these; the UI treats
/// them as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStatusSnapshot {
    pub id: String,
    pub status: DocumentStatus,
    pub chunk_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DocumentStatusSnapshot {
    /// Field-by-field comparison of everything the poller reports on.
    ///
    /// `error_message` intentionally excluded: a failed status always changes
    /// `status` in the same response.
    pub fn differs_from(&self, other: &DocumentStatusSnapshot) -> bool {
        self.status != other.status
            || self.chunk_count != other.chunk_count
            || self.progress_percentage != other.progress_percentage
            || self.processing_stage != other.processing_stage
    }
}
