use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use basechat_core::DocumentStatusSnapshot;

use crate::backend::ChatBackend;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Self-rescheduling status poller for background ingestion jobs.
///
/// A cycle fetches status for every tracked document still in a non-terminal
/// state, diffs each result against the last-known snapshot, and emits an
/// update only for documents that actually changed. The next cycle is
/// scheduled only after the previous one completes, so cycles can never
/// overlap; the in-flight flag additionally guards against re-entrant
/// triggers.
pub struct StatusPoller<B> {
    backend: B,
    known: Mutex<HashMap<String, DocumentStatusSnapshot>>,
    in_flight: AtomicBool,
    updates: mpsc::UnboundedSender<DocumentStatusSnapshot>,
}

impl<B: ChatBackend> StatusPoller<B> {
    /// Create a poller and the channel its change notifications arrive on.
    pub fn new(backend: B) -> (Self, mpsc::UnboundedReceiver<DocumentStatusSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                known: Mutex::new(HashMap::new()),
                in_flight: AtomicBool::new(false),
                updates: tx,
            },
            rx,
        )
    }

    /// Seed (or replace) the last-known snapshot for a document. Documents
    /// in a terminal state are kept but never polled again.
    pub fn track(&self, snapshot: DocumentStatusSnapshot) {
        self.known().insert(snapshot.id.clone(), snapshot);
    }

    pub fn statuses(&self) -> Vec<DocumentStatusSnapshot> {
        let mut all: Vec<_> = self.known().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Documents still worth polling: last-known status pending/processing.
    fn candidates(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .known()
            .values()
            .filter(|s| !s.status.is_terminal())
            .map(|s| s.id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn known(&self) -> std::sync::MutexGuard<'_, HashMap<String, DocumentStatusSnapshot>> {
        self.known.lock().expect("status poller mutex poisoned")
    }

    /// Run one polling cycle. Re-entrant triggers while a cycle is in
    /// flight skip entirely; with the self-rescheduling loop this guard is
    /// redundant, but it stays as protection against external triggers.
    pub async fn poll_once(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return;
        }
        self.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);
    }

    async fn run_cycle(&self) {
        // An empty candidate set costs no network calls; the schedule keeps
        // running because new documents may appear at any time.
        for id in self.candidates() {
            match self.backend.document_status(&id).await {
                Ok(fresh) => {
                    let changed = {
                        let mut known = self.known();
                        match known.get(&id) {
                            Some(prev) if !prev.differs_from(&fresh) => false,
                            _ => {
                                known.insert(id.clone(), fresh.clone());
                                true
                            }
                        }
                    };
                    if changed {
                        let _ = self.updates.send(fresh);
                    }
                }
                // One failed document must not abort the rest of the cycle.
                Err(e) => warn!("Status fetch for document {id} failed: {e:#}"),
            }
        }
    }

    /// Poll until the shutdown signal flips. The sleep restarts only after
    /// the previous cycle finished, so a slow cycle stretches the schedule
    /// instead of stacking requests.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.poll_once().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("Status poller shutting down");
                        break;
                    }
                }
            }
        }
    }
}
