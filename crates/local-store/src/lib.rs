//! Durable local storage for the active conversation id, one entry per
//! knowledge base.
//!
//! Pure key-value semantics: entries live in a single JSON object file under
//! keys of the form `chat_conversation_<knowledge_base_id>`. Every operation
//! is failure-tolerant: an unreadable or unwritable store degrades to "no
//! persisted id", it never propagates an error to the session layer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

const STORE_FILE: &str = "active_conversations.json";
const KEY_PREFIX: &str = "chat_conversation_";

/// Persisted active-conversation store.
///
/// Single writer in practice (one session per knowledge base at a time);
/// last write wins, reads are best-effort.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Open the store at the platform data directory,
    /// e.g. `~/.local/share/basechat/active_conversations.json`.
    pub fn open() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("io", "basechat", "basechat")
            .context("could not determine a data directory for this platform")?;
        Ok(Self::open_path(dirs.data_dir().join(STORE_FILE)))
    }

    /// Open the store at a specific file path (used by tests).
    pub fn open_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn key(knowledge_base_id: &str) -> String {
        format!("{KEY_PREFIX}{knowledge_base_id}")
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable session store {}: {e}", self.path.display());
                BTreeMap::new()
            }),
            // Missing file is the common cold-start case, not worth a log line.
            Err(_) => BTreeMap::new(),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", self.path.display()))?;
        }
        let raw = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }

    /// Read the persisted conversation id for a knowledge base.
    /// Returns `None` on absence or on any storage failure.
    pub fn load(&self, knowledge_base_id: &str) -> Option<String> {
        self.read_map().remove(&Self::key(knowledge_base_id))
    }

    /// Persist the active conversation id for a knowledge base. Best-effort.
    pub fn save(&self, knowledge_base_id: &str, conversation_id: &str) {
        let mut map = self.read_map();
        map.insert(Self::key(knowledge_base_id), conversation_id.to_string());
        if let Err(e) = self.write_map(&map) {
            warn!("Could not persist active conversation: {e:#}");
        }
    }

    /// Remove the persisted conversation id for a knowledge base. Best-effort.
    pub fn clear(&self, knowledge_base_id: &str) {
        let mut map = self.read_map();
        if map.remove(&Self::key(knowledge_base_id)).is_some() {
            if let Err(e) = self.write_map(&map) {
                warn!("Could not clear active conversation: {e:#}");
            }
        }
    }
}
