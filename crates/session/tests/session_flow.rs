//! Cross-component tests for the session engine, driven by a scripted
//! in-memory backend. No network I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};

use basechat_api_types::*;
use basechat_core::{ChatRole, ChatSettings, DocumentStatus};
use basechat_local_store::SessionStore;
use basechat_session::{ChatBackend, ChatSession, StatusPoller};

// ─── Scripted backend ────────────────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    chat_responses: VecDeque<Result<ChatResponse, String>>,
    chat_calls: Vec<ChatRequest>,
    conversations: Vec<ConversationSummary>,
    histories: HashMap<String, Vec<ChatMessageResponse>>,
    delete_message_response: Option<DeleteMessageResponse>,
    statuses: HashMap<String, DocumentStatusSnapshot>,
}

#[derive(Clone)]
struct MockBackend {
    state: Arc<Mutex<MockState>>,
    status_calls: Arc<AtomicUsize>,
    /// When set, `document_status` waits for a permit before answering.
    status_gate: Option<Arc<Semaphore>>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            status_calls: Arc::new(AtomicUsize::new(0)),
            status_gate: None,
        }
    }

    fn gated() -> Self {
        let mut mock = Self::new();
        mock.status_gate = Some(Arc::new(Semaphore::new(0)));
        mock
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn push_chat_ok(&self, resp: ChatResponse) {
        self.state().chat_responses.push_back(Ok(resp));
    }

    fn push_chat_err(&self, msg: &str) {
        self.state().chat_responses.push_back(Err(msg.to_string()));
    }

    fn set_history(&self, id: &str, history: Vec<ChatMessageResponse>) {
        self.state().histories.insert(id.to_string(), history);
    }

    fn set_status(&self, snapshot: DocumentStatusSnapshot) {
        self.state().statuses.insert(snapshot.id.clone(), snapshot);
    }

    fn chat_call_count(&self) -> usize {
        self.state().chat_calls.len()
    }

    fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn release_status_gate(&self) {
        if let Some(gate) = &self.status_gate {
            gate.add_permits(1);
        }
    }
}

impl ChatBackend for MockBackend {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let scripted = {
            let mut state = self.state();
            state.chat_calls.push(req.clone());
            state.chat_responses.pop_front()
        };
        match scripted {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(msg)) => bail!("{msg}"),
            None => bail!("no scripted chat response"),
        }
    }

    async fn list_conversations(&self, _kb: &str) -> Result<Vec<ConversationSummary>> {
        Ok(self.state().conversations.clone())
    }

    async fn conversation_messages(&self, id: &str) -> Result<Vec<ChatMessageResponse>> {
        match self.state().histories.get(id) {
            Some(history) => Ok(history.clone()),
            None => bail!("404 Not Found: no conversation {id}"),
        }
    }

    async fn rename_conversation(
        &self,
        id: &str,
        title: Option<&str>,
    ) -> Result<ConversationSummary> {
        Ok(summary_with_title(id, title))
    }

    async fn delete_conversation(&self, id: &str) -> Result<DeleteConversationResponse> {
        Ok(DeleteConversationResponse {
            status: "deleted".to_string(),
            id: id.to_string(),
        })
    }

    async fn delete_message(
        &self,
        _conversation_id: &str,
        _message_id: &str,
        _pair: bool,
    ) -> Result<DeleteMessageResponse> {
        match self.state().delete_message_response.clone() {
            Some(resp) => Ok(resp),
            None => bail!("no scripted delete response"),
        }
    }

    async fn document_status(&self, id: &str) -> Result<DocumentStatusSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.status_gate {
            // The permit returns to the semaphore on drop, so one release
            // unblocks the whole cycle.
            let _permit = gate.acquire().await.unwrap();
        }
        match self.state().statuses.get(id) {
            Some(snapshot) => Ok(snapshot.clone()),
            None => bail!("404 Not Found: no document {id}"),
        }
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn summary(id: &str) -> ConversationSummary {
    summary_with_title(id, Some("Untested waters"))
}

fn summary_with_title(id: &str, title: Option<&str>) -> ConversationSummary {
    ConversationSummary {
        id: id.to_string(),
        knowledge_base_id: "kb1".to_string(),
        title: title.map(str::to_string),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-02T00:00:00Z".to_string(),
    }
}

fn chat_response(conversation: &str, user: &str, assistant: &str, answer: &str) -> ChatResponse {
    ChatResponse {
        answer: answer.to_string(),
        sources: Vec::new(),
        conversation_id: conversation.to_string(),
        user_message_id: user.to_string(),
        assistant_message_id: assistant.to_string(),
        model: "default".to_string(),
        use_mmr: None,
        mmr_diversity: None,
        use_self_check: None,
    }
}

fn stored_message(id: &str, role: ChatRole, content: &str, index: u32) -> ChatMessageResponse {
    ChatMessageResponse {
        id: id.to_string(),
        role,
        content: content.to_string(),
        sources: Vec::new(),
        timestamp: Utc::now(),
        model: None,
        use_self_check: None,
        index,
    }
}

fn snapshot(id: &str, status: DocumentStatus, chunks: u32) -> DocumentStatusSnapshot {
    DocumentStatusSnapshot {
        id: id.to_string(),
        status,
        chunk_count: chunks,
        progress_percentage: None,
        processing_stage: None,
        error_message: None,
    }
}

struct Harness {
    mock: MockBackend,
    session: ChatSession<MockBackend>,
    store_probe: SessionStore,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    harness_with_persisted(None)
}

fn harness_with_persisted(persisted: Option<&str>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store_probe = SessionStore::open_path(path.clone());
    if let Some(id) = persisted {
        store_probe.save("kb1", id);
    }
    let mock = MockBackend::new();
    let session = ChatSession::new(
        mock.clone(),
        SessionStore::open_path(path),
        "kb1",
        ChatSettings::default(),
    );
    Harness {
        mock,
        session,
        store_probe,
        _dir: dir,
    }
}

// ─── Send / reconcile ────────────────────────────────────────────────────────

#[tokio::test]
async fn first_send_creates_conversation_and_reconciles_both_turns() {
    let mut h = harness();
    h.mock.push_chat_ok(chat_response("c1", "u1", "a1", "hi"));

    h.session.send_message("hello").await;

    let log = h.session.messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].id.as_deref(), Some("u1"));
    assert_eq!(log[0].role, ChatRole::User);
    assert_eq!(log[0].content, "hello");
    assert_eq!(log[1].id.as_deref(), Some("a1"));
    assert_eq!(log[1].role, ChatRole::Assistant);
    assert_eq!(log[1].content, "hi");

    assert_eq!(h.session.conversation_id(), Some("c1"));
    assert_eq!(h.store_probe.load("kb1").as_deref(), Some("c1"));
    assert!(!h.session.is_loading());
    assert!(h.session.error().is_none());
}

#[tokio::test]
async fn empty_question_is_rejected_silently() {
    let mut h = harness();
    h.session.send_message("   ").await;

    assert!(h.session.messages().is_empty());
    assert!(!h.session.is_loading());
    assert_eq!(h.mock.chat_call_count(), 0);
}

#[tokio::test]
async fn adoption_is_idempotent_across_sends() {
    let mut h = harness();
    h.mock.push_chat_ok(chat_response("c1", "u1", "a1", "one"));
    h.mock.push_chat_ok(chat_response("c1", "u2", "a2", "two"));

    h.session.send_message("first").await;
    h.session.send_message("second").await;

    assert_eq!(h.session.conversation_id(), Some("c1"));
    assert_eq!(h.store_probe.load("kb1").as_deref(), Some("c1"));

    let log = h.session.messages();
    assert_eq!(log.len(), 4);
    assert_eq!(log[2].id.as_deref(), Some("u2"));
    assert_eq!(log[3].id.as_deref(), Some("a2"));

    // The second request carried the adopted id back to the server.
    let calls = h.mock.state().chat_calls.clone();
    assert_eq!(calls[0].conversation_id, None);
    assert_eq!(calls[1].conversation_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn send_failure_becomes_inline_assistant_error() {
    let mut h = harness();
    h.mock.push_chat_err("503 Service Unavailable: overloaded");

    h.session.send_message("hello").await;

    let log = h.session.messages();
    assert_eq!(log.len(), 2);
    // The optimistic user turn stays, still unreconciled.
    assert_eq!(log[0].role, ChatRole::User);
    assert_eq!(log[0].id, None);
    // The synthetic assistant turn embeds the error and never gets an id.
    assert_eq!(log[1].role, ChatRole::Assistant);
    assert_eq!(log[1].id, None);
    assert!(log[1].content.contains("overloaded"));

    assert!(h.session.error().unwrap().contains("overloaded"));
    assert!(!h.session.is_loading());
    assert_eq!(h.session.conversation_id(), None);
}

#[tokio::test]
async fn send_emits_nonblocking_list_refresh() {
    let mut h = harness();
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.session.set_refresh_signal(tx);
    h.mock.push_chat_ok(chat_response("c1", "u1", "a1", "hi"));

    h.session.send_message("hello").await;

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

// ─── Resolution / self-heal ──────────────────────────────────────────────────

#[tokio::test]
async fn stale_persisted_id_self_heals() {
    let mut h = harness_with_persisted(Some("abc"));
    assert_eq!(h.session.conversation_id(), Some("abc"));
    h.mock.set_history("other", Vec::new());

    h.session
        .sync_with_conversations(&[summary("other")])
        .await;

    // "abc" is gone server-side: cleared, then the list's most recent
    // conversation is adopted instead.
    assert_eq!(h.store_probe.load("kb1").as_deref(), Some("other"));
    assert_eq!(h.session.conversation_id(), Some("other"));
    assert!(h.session.error().is_none());
}

#[tokio::test]
async fn stale_id_with_empty_list_resolves_to_no_conversation() {
    let mut h = harness_with_persisted(Some("abc"));

    h.session.sync_with_conversations(&[]).await;

    assert_eq!(h.session.conversation_id(), None);
    assert!(h.session.messages().is_empty());
    assert_eq!(h.store_probe.load("kb1"), None);
}

#[tokio::test]
async fn resolution_prefers_persisted_id_over_most_recent() {
    let mut h = harness_with_persisted(Some("c2"));
    h.mock.set_history(
        "c2",
        vec![
            stored_message("u1", ChatRole::User, "q", 0),
            stored_message("a1", ChatRole::Assistant, "a", 1),
        ],
    );

    h.session
        .sync_with_conversations(&[summary("c9"), summary("c2")])
        .await;

    assert_eq!(h.session.conversation_id(), Some("c2"));
    assert_eq!(h.session.messages().len(), 2);
    assert_eq!(h.session.messages()[0].id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn resolution_falls_back_to_most_recently_listed() {
    let mut h = harness();
    h.mock
        .set_history("c9", vec![stored_message("u1", ChatRole::User, "q", 0)]);

    h.session
        .sync_with_conversations(&[summary("c9"), summary("c1")])
        .await;

    assert_eq!(h.session.conversation_id(), Some("c9"));
    assert_eq!(h.store_probe.load("kb1").as_deref(), Some("c9"));
    assert_eq!(h.session.messages().len(), 1);
}

#[tokio::test]
async fn repeated_sync_does_not_clobber_the_live_log() {
    let mut h = harness();
    h.mock.push_chat_ok(chat_response("c1", "u1", "a1", "hi"));
    h.session.send_message("hello").await;

    // A post-send list refresh re-syncs with the same active conversation;
    // the reconciled in-memory log must survive untouched.
    h.session.sync_with_conversations(&[summary("c1")]).await;

    assert_eq!(h.session.messages().len(), 2);
    assert_eq!(h.session.conversation_id(), Some("c1"));
}

#[tokio::test]
async fn history_fetch_failure_resets_the_session() {
    let mut h = harness();

    // "ghost" is listed but its messages endpoint 404s.
    h.session.sync_with_conversations(&[summary("ghost")]).await;

    assert_eq!(h.session.conversation_id(), None);
    assert!(h.session.messages().is_empty());
    assert_eq!(h.store_probe.load("kb1"), None);
    // Recovery path, not a failure to report.
    assert!(h.session.error().is_none());
}

// ─── New chat / selection ────────────────────────────────────────────────────

#[tokio::test]
async fn new_chat_is_isolated_from_list_resolution() {
    let mut h = harness_with_persisted(Some("c1"));
    h.mock.set_history("c1", Vec::new());

    h.session.start_new_chat();
    assert_eq!(h.session.conversation_id(), None);
    assert_eq!(h.store_probe.load("kb1"), None);

    // A refresh right after must NOT re-attach anything.
    h.session
        .sync_with_conversations(&[summary("c1"), summary("c2")])
        .await;
    assert_eq!(h.session.conversation_id(), None);
    assert!(h.session.messages().is_empty());

    // Explicit selection ends the forced-new state.
    h.session.select_conversation("c1").await;
    assert!(!h.session.force_new_chat());
    assert_eq!(h.session.conversation_id(), Some("c1"));
}

#[tokio::test]
async fn successful_send_ends_the_forced_new_state() {
    let mut h = harness();
    h.session.start_new_chat();
    h.mock.push_chat_ok(chat_response("c7", "u1", "a1", "hi"));

    h.session.send_message("hello").await;
    assert!(!h.session.force_new_chat());
    assert_eq!(h.session.conversation_id(), Some("c7"));

    // Resolution now behaves normally again.
    h.session.sync_with_conversations(&[summary("c7")]).await;
    assert_eq!(h.session.conversation_id(), Some("c7"));
}

#[tokio::test]
async fn deleting_the_active_conversation_clears_the_session() {
    let mut h = harness();
    h.mock.push_chat_ok(chat_response("c1", "u1", "a1", "hi"));
    h.session.send_message("hello").await;

    h.session.delete_conversation("c1").await;

    assert_eq!(h.session.conversation_id(), None);
    assert!(h.session.messages().is_empty());
    assert_eq!(h.store_probe.load("kb1"), None);
    // Deleting is not "start new chat": resolution may re-attach.
    assert!(!h.session.force_new_chat());
}

// ─── Message deletion ────────────────────────────────────────────────────────

#[tokio::test]
async fn pair_delete_removes_every_returned_id() {
    let mut h = harness();
    h.mock.push_chat_ok(chat_response("c1", "m1", "m2", "hi"));
    h.session.send_message("hello").await;
    h.mock.state().delete_message_response = Some(DeleteMessageResponse {
        status: "deleted".to_string(),
        deleted_ids: vec!["m1".to_string(), "m2".to_string()],
    });

    // Only m2 is targeted; the server deletes the pair.
    h.session.delete_message("m2", true).await;

    assert!(h.session.messages().is_empty());
}

#[tokio::test]
async fn idless_messages_survive_targeted_deletion() {
    let mut h = harness();
    h.mock.push_chat_err("500: boom");
    h.session.send_message("hello").await; // leaves two id-less messages
    h.mock.push_chat_ok(chat_response("c1", "m3", "m4", "ok"));
    h.session.send_message("again").await;

    h.mock.state().delete_message_response = Some(DeleteMessageResponse {
        status: "deleted".to_string(),
        deleted_ids: vec!["m3".to_string(), "m4".to_string()],
    });
    h.session.delete_message("m3", true).await;

    // The failed turn's synthetic messages are untouched.
    let log = h.session.messages();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|m| m.id.is_none()));
}

// ─── Conversation list mutations ─────────────────────────────────────────────

#[tokio::test]
async fn list_rename_and_delete_update_the_local_copy() {
    use basechat_session::ConversationList;

    let mock = MockBackend::new();
    mock.state().conversations = vec![
        summary_with_title("c1", Some("Old title")),
        summary_with_title("c2", None),
    ];
    let mut list = ConversationList::new(mock);
    list.refresh("kb1").await.unwrap();
    assert_eq!(list.all().len(), 2);

    list.rename("c1", Some("Renamed")).await.unwrap();
    assert_eq!(list.all()[0].title.as_deref(), Some("Renamed"));

    list.delete("c1").await.unwrap();
    let ids: Vec<&str> = list.all().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["c2"]);
}

#[tokio::test]
async fn commit_edit_renames_through_the_draft() {
    use basechat_session::ConversationList;

    let mock = MockBackend::new();
    mock.state().conversations = vec![summary_with_title("c1", Some("Old title"))];
    let mut list = ConversationList::new(mock);
    list.refresh("kb1").await.unwrap();

    list.begin_edit("c1");
    assert_eq!(list.edit().unwrap().draft, "Old title");
    list.set_draft("  Fresh title  ");
    list.commit_edit().await.unwrap();
    assert!(list.edit().is_none());
    assert_eq!(list.all()[0].title.as_deref(), Some("Fresh title"));

    // An empty draft clears the title back to untitled.
    list.begin_edit("c1");
    list.set_draft("   ");
    list.commit_edit().await.unwrap();
    assert_eq!(list.all()[0].title, None);
}

// ─── Status poller ───────────────────────────────────────────────────────────

#[tokio::test]
async fn poller_cycles_never_overlap() {
    let mock = MockBackend::gated();
    for doc in ["d1", "d2", "d3"] {
        mock.set_status(snapshot(doc, DocumentStatus::Processing, 0));
    }
    let (poller, _updates) = StatusPoller::new(mock.clone());
    for doc in ["d1", "d2", "d3"] {
        poller.track(snapshot(doc, DocumentStatus::Pending, 0));
    }
    let poller = Arc::new(poller);

    // First cycle starts and blocks inside its first status fetch.
    let first = tokio::spawn({
        let poller = poller.clone();
        async move { poller.poll_once().await }
    });
    while mock.status_call_count() == 0 {
        tokio::task::yield_now().await;
    }

    // 100 re-entrant triggers while the cycle is in flight: all skipped.
    for _ in 0..100 {
        poller.poll_once().await;
    }

    mock.release_status_gate();
    first.await.unwrap();

    // Exactly one fetch per candidate document, not 100.
    assert_eq!(mock.status_call_count(), 3);
}

#[tokio::test]
async fn poller_emits_only_changed_documents() {
    let mock = MockBackend::new();
    let (poller, mut updates) = StatusPoller::new(mock.clone());

    poller.track(snapshot("d1", DocumentStatus::Processing, 0));
    poller.track(snapshot("d2", DocumentStatus::Completed, 8));
    mock.set_status(snapshot("d1", DocumentStatus::Processing, 0));

    // Unchanged: one fetch (terminal d2 is not a candidate), no update.
    poller.poll_once().await;
    assert_eq!(mock.status_call_count(), 1);
    assert!(updates.try_recv().is_err());

    // d1 completes: exactly one update flows out.
    mock.set_status(snapshot("d1", DocumentStatus::Completed, 5));
    poller.poll_once().await;
    let update = updates.try_recv().unwrap();
    assert_eq!(update.id, "d1");
    assert_eq!(update.status, DocumentStatus::Completed);
    assert_eq!(update.chunk_count, 5);

    // Now terminal: no further fetches.
    poller.poll_once().await;
    assert_eq!(mock.status_call_count(), 2);
}

#[tokio::test]
async fn poller_survives_per_document_failures() {
    let mock = MockBackend::new();
    let (poller, mut updates) = StatusPoller::new(mock.clone());

    poller.track(snapshot("broken", DocumentStatus::Pending, 0));
    poller.track(snapshot("ok", DocumentStatus::Pending, 0));
    // Only "ok" has a scripted status; "broken" 404s.
    mock.set_status(snapshot("ok", DocumentStatus::Completed, 3));

    poller.poll_once().await;

    let update = updates.try_recv().unwrap();
    assert_eq!(update.id, "ok");
    assert!(updates.try_recv().is_err());
    // The failure did not wedge the in-flight guard.
    poller.poll_once().await;
    assert_eq!(mock.status_call_count(), 3);
}
