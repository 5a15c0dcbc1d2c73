use anyhow::Result;
use tracing::warn;

use basechat_api_types::ConversationSummary;

use crate::backend::ChatBackend;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Label shown (and searched) for conversations the server has not titled.
pub const UNTITLED_LABEL: &str = "Untitled";

/// Display label for a conversation: its title, or the untitled placeholder.
pub fn display_title(conversation: &ConversationSummary) -> &str {
    conversation
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(UNTITLED_LABEL)
}

/// In-place rename state: which row is being edited and the draft text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditState {
    pub id: String,
    pub draft: String,
}

/// Maintains the denormalized client copy of the conversation list plus its
/// derived view: free-text search and pagination.
///
/// The server list is authoritative for existence and ordering
/// (most-recent-first); everything here is derived and recomputed, never
/// written back.
pub struct ConversationList<B: ChatBackend> {
    backend: B,
    conversations: Vec<ConversationSummary>,
    search: String,
    page: usize,
    page_size: usize,
    edit: Option<EditState>,
}

impl<B: ChatBackend> ConversationList<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            conversations: Vec::new(),
            search: String::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            edit: None,
        }
    }

    /// Fetch the authoritative list. On failure the previous list is kept,
    /// so a flaky refresh degrades to staleness rather than data loss.
    pub async fn refresh(&mut self, knowledge_base_id: &str) -> Result<()> {
        match self.backend.list_conversations(knowledge_base_id).await {
            Ok(conversations) => {
                self.conversations = conversations;
                self.clamp_page();
                Ok(())
            }
            Err(e) => {
                warn!("Conversation list refresh failed: {e:#}");
                Err(e)
            }
        }
    }

    pub fn all(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    /// Case-insensitive substring match against the display label and the
    /// raw id.
    pub fn filtered(&self) -> Vec<&ConversationSummary> {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return self.conversations.iter().collect();
        }
        self.conversations
            .iter()
            .filter(|c| {
                display_title(c).to_lowercase().contains(&needle)
                    || c.id.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// The current page of the filtered list.
    pub fn visible(&self) -> Vec<&ConversationSummary> {
        let filtered = self.filtered();
        let start = (self.page - 1) * self.page_size;
        filtered
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.filtered().len().div_ceil(self.page_size).max(1)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        let term = term.into();
        if term != self.search {
            self.search = term;
            self.page = 1;
        }
    }

    pub fn set_page_size(&mut self, size: usize) {
        let size = size.max(1);
        if size != self.page_size {
            self.page_size = size;
            self.page = 1;
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages());
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Clamp the current page down after the filtered set shrank.
    fn clamp_page(&mut self) {
        let total = self.total_pages();
        if self.page > total {
            self.page = total;
        }
    }

    // ── Remote mutations (fire-and-confirm; caller refreshes afterward) ──

    pub async fn rename(&mut self, id: &str, title: Option<&str>) -> Result<()> {
        self.backend.rename_conversation(id, title).await?;
        if let Some(row) = self.conversations.iter_mut().find(|c| c.id == id) {
            row.title = title.map(str::to_string);
        }
        Ok(())
    }

    pub async fn delete(&mut self, id: &str) -> Result<()> {
        self.backend.delete_conversation(id).await?;
        self.conversations.retain(|c| c.id != id);
        self.clamp_page();
        Ok(())
    }

    // ── Edit-in-place state (purely local UI state) ───────────────────────

    pub fn edit(&self) -> Option<&EditState> {
        self.edit.as_ref()
    }

    pub fn begin_edit(&mut self, id: &str) {
        let draft = self
            .conversations
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.title.clone())
            .unwrap_or_default();
        self.edit = Some(EditState {
            id: id.to_string(),
            draft,
        });
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        if let Some(edit) = &mut self.edit {
            edit.draft = draft.into();
        }
    }

    /// Reset the edit state; called when a different conversation is
    /// selected or a new chat is started.
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    /// Commit the draft as the new title. An empty draft clears the title.
    pub async fn commit_edit(&mut self) -> Result<()> {
        let Some(edit) = self.edit.take() else {
            return Ok(());
        };
        let draft = edit.draft.trim().to_string();
        let title = if draft.is_empty() {
            None
        } else {
            Some(draft.as_str())
        };
        self.rename(&edit.id, title).await
    }
}
