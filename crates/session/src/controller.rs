use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use basechat_api_types::{ChatMessageResponse, ChatRequest, ChatResponse, ConversationSummary};
use basechat_core::{ChatMessage, ChatRole, ChatSettings};
use basechat_local_store::SessionStore;

use crate::backend::ChatBackend;

/// The message session controller: owns the ordered message log for the
/// active conversation of one knowledge base, performs optimistic insertion
/// of user turns, and reconciles server responses back into the log.
///
/// One instance per knowledge base; switching knowledge bases means
/// constructing a new session over the same store.
pub struct ChatSession<B: ChatBackend> {
    backend: B,
    store: SessionStore,
    knowledge_base_id: String,
    settings: ChatSettings,
    conversation_id: Option<String>,
    messages: Vec<ChatMessage>,
    is_loading: bool,
    error: Option<String>,
    force_new_chat: bool,
    refresh_tx: Option<UnboundedSender<()>>,
}

impl<B: ChatBackend> ChatSession<B> {
    pub fn new(
        backend: B,
        store: SessionStore,
        knowledge_base_id: impl Into<String>,
        settings: ChatSettings,
    ) -> Self {
        let knowledge_base_id = knowledge_base_id.into();
        let conversation_id = store.load(&knowledge_base_id);
        Self {
            backend,
            store,
            knowledge_base_id,
            settings,
            conversation_id,
            messages: Vec::new(),
            is_loading: false,
            error: None,
            force_new_chat: false,
            refresh_tx: None,
        }
    }

    /// Install the channel notified after every mutation that may have
    /// changed the conversation list (send, rename, delete). The send is
    /// unbounded and can never block completion of the mutation.
    pub fn set_refresh_signal(&mut self, tx: UnboundedSender<()>) {
        self.refresh_tx = Some(tx);
    }

    pub fn knowledge_base_id(&self) -> &str {
        &self.knowledge_base_id
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn force_new_chat(&self) -> bool {
        self.force_new_chat
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ChatSettings) {
        self.settings = settings;
    }

    /// Resolve the active conversation against a freshly fetched list.
    ///
    /// Called whenever the conversation list is (re)loaded. A persisted id
    /// that no longer exists server-side is stale: the session self-heals by
    /// clearing it rather than surfacing an error.
    pub async fn sync_with_conversations(&mut self, conversations: &[ConversationSummary]) {
        if let Some(active) = self.conversation_id.clone() {
            if !conversations.iter().any(|c| c.id == active) {
                debug!("Active conversation {active} no longer exists, clearing session");
                self.conversation_id = None;
                self.messages.clear();
                self.store.clear(&self.knowledge_base_id);
            }
        }

        // The user asked for a fresh chat: never auto-attach an existing
        // conversation until they pick one or a send creates one.
        if self.force_new_chat {
            return;
        }

        let persisted = self.store.load(&self.knowledge_base_id);
        let chosen = persisted
            .filter(|id| conversations.iter().any(|c| c.id == *id))
            .or_else(|| conversations.first().map(|c| c.id.clone()));
        let Some(chosen) = chosen else {
            return;
        };

        let changed = self.conversation_id.as_deref() != Some(chosen.as_str());
        if changed || self.messages.is_empty() {
            self.conversation_id = Some(chosen.clone());
            self.store.save(&self.knowledge_base_id, &chosen);
            self.load_history(&chosen).await;
        }
    }

    /// Replace the log with the server's ordered history. A failed fetch
    /// means the conversation id is invalid; reset instead of reporting.
    async fn load_history(&mut self, id: &str) {
        match self.backend.conversation_messages(id).await {
            Ok(history) => {
                self.messages = history.into_iter().map(message_from_response).collect();
            }
            Err(e) => {
                debug!("History fetch for {id} failed ({e:#}), resetting session");
                self.conversation_id = None;
                self.messages.clear();
                self.store.clear(&self.knowledge_base_id);
            }
        }
    }

    /// Send a question: optimistic local insert, then reconcile the server
    /// response into the log. Failures become a visible assistant-role error
    /// message; they never propagate.
    pub async fn send_message(&mut self, question: &str) {
        let question = question.trim();
        if question.is_empty() {
            return;
        }

        // The user's turn must appear before any network round trip.
        self.messages.push(ChatMessage::user(question));
        self.is_loading = true;
        self.error = None;

        let request = ChatRequest::new(
            question,
            &self.knowledge_base_id,
            self.conversation_id.clone(),
            &self.settings,
        );

        match self.backend.chat(&request).await {
            Ok(resp) => {
                self.adopt_conversation(&resp.conversation_id);
                if !claim_unreconciled_user_message(&mut self.messages, &resp.user_message_id) {
                    warn!(
                        "No unreconciled user message for {}, log may have been reset mid-send",
                        resp.user_message_id
                    );
                }
                self.messages.push(assistant_from_response(&resp));
                self.force_new_chat = false;
                self.request_list_refresh();
            }
            Err(e) => {
                let msg = format!("{e:#}");
                warn!("Chat send failed: {msg}");
                self.messages.push(ChatMessage::assistant_error(&msg));
                self.error = Some(msg);
            }
        }

        self.is_loading = false;
    }

    /// Adopt a server-assigned conversation id. Idempotent: replaying the
    /// same id neither re-persists nor disturbs the log.
    fn adopt_conversation(&mut self, id: &str) {
        if self.conversation_id.as_deref() == Some(id) {
            return;
        }
        self.conversation_id = Some(id.to_string());
        self.store.save(&self.knowledge_base_id, id);
    }

    /// Delete one message; the server decides (via `pair`) whether the
    /// paired turn goes too, and reports every removed id back.
    pub async fn delete_message(&mut self, message_id: &str, pair: bool) {
        let Some(conversation_id) = self.conversation_id.clone() else {
            return;
        };
        match self
            .backend
            .delete_message(&conversation_id, message_id, pair)
            .await
        {
            Ok(resp) => {
                self.messages.retain(|m| match &m.id {
                    Some(id) => !resp.deleted_ids.contains(id),
                    // Messages without an id are never eligible for deletion.
                    None => true,
                });
            }
            Err(e) => {
                warn!("Message delete failed: {e:#}");
                self.error = Some(format!("{e:#}"));
            }
        }
    }

    /// Start a fresh chat. The flag stays set until the user selects a
    /// conversation or a send creates one, so list resolution cannot
    /// immediately re-attach the most recent conversation.
    pub fn start_new_chat(&mut self) {
        self.messages.clear();
        self.error = None;
        self.force_new_chat = true;
        self.conversation_id = None;
        self.store.clear(&self.knowledge_base_id);
    }

    /// Explicitly switch to an existing conversation and load its history.
    pub async fn select_conversation(&mut self, id: &str) {
        self.force_new_chat = false;
        self.error = None;
        self.conversation_id = Some(id.to_string());
        self.store.save(&self.knowledge_base_id, id);
        self.load_history(id).await;
    }

    pub async fn rename_conversation(&mut self, id: &str, title: Option<&str>) {
        if let Err(e) = self.backend.rename_conversation(id, title).await {
            warn!("Conversation rename failed: {e:#}");
            self.error = Some(format!("{e:#}"));
        }
        self.request_list_refresh();
    }

    /// Delete a conversation; when it is the active one, reset the session
    /// the same way `start_new_chat` does, minus forcing a new chat.
    pub async fn delete_conversation(&mut self, id: &str) {
        match self.backend.delete_conversation(id).await {
            Ok(_) => {
                if self.conversation_id.as_deref() == Some(id) {
                    self.messages.clear();
                    self.error = None;
                    self.conversation_id = None;
                    self.store.clear(&self.knowledge_base_id);
                }
            }
            Err(e) => {
                warn!("Conversation delete failed: {e:#}");
                self.error = Some(format!("{e:#}"));
            }
        }
        self.request_list_refresh();
    }

    fn request_list_refresh(&self) {
        if let Some(tx) = &self.refresh_tx {
            let _ = tx.send(());
        }
    }
}

fn message_from_response(resp: ChatMessageResponse) -> ChatMessage {
    ChatMessage {
        id: Some(resp.id),
        role: resp.role,
        content: resp.content,
        sources: resp.sources,
        timestamp: resp.timestamp,
        model: resp.model,
        use_self_check: resp.use_self_check,
    }
}

fn assistant_from_response(resp: &ChatResponse) -> ChatMessage {
    ChatMessage {
        id: Some(resp.assistant_message_id.clone()),
        role: ChatRole::Assistant,
        content: resp.answer.clone(),
        sources: resp.sources.clone(),
        timestamp: Utc::now(),
        model: Some(resp.model.clone()),
        use_self_check: resp.use_self_check,
    }
}

/// Scan the log from the end for the most recent user message lacking an id
/// and assign it the server-returned one. The backward, most-recent-only
/// scan keeps reconciliation correct when several optimistic messages
/// transiently coexist under rapid sends.
fn claim_unreconciled_user_message(messages: &mut [ChatMessage], id: &str) -> bool {
    for msg in messages.iter_mut().rev() {
        if msg.is_unreconciled_user() {
            msg.id = Some(id.to_string());
            return true;
        }
    }
    false
}
