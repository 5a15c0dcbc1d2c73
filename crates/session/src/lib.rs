//! Conversation session & async status synchronization engine.
//!
//! Keeps a knowledge-base chat session in sync with the remote service:
//! conversation identity resolution and persistence, optimistic message
//! send/reconcile, conversation list maintenance, and a self-rescheduling
//! poller for document ingestion status.

pub mod backend;
pub mod controller;
pub mod conversations;
pub mod poller;

pub use backend::ChatBackend;
pub use controller::ChatSession;
pub use conversations::{display_title, ConversationList, EditState, DEFAULT_PAGE_SIZE};
pub use poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
