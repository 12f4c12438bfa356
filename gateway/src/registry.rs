//! Live session table.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};
use vox_core::IngestSession;

pub struct SessionEntry {
    pub session: Arc<IngestSession>,
    /// Taken by the first `/{id}/control` upgrade; a second attempt finds
    /// `None` and is rejected.
    pub control_rx: Mutex<Option<mpsc::Receiver<serde_json::Value>>>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn insert(
        &self,
        id: String,
        session: Arc<IngestSession>,
        control_rx: mpsc::Receiver<serde_json::Value>,
    ) {
        self.sessions.insert(
            id,
            Arc::new(SessionEntry {
                session,
                control_rx: Mutex::new(Some(control_rx)),
            }),
        );
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.get(id).map(|e| Arc::clone(e.value()))
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<SessionEntry>> {
        let entry = self.sessions.remove(id).map(|(_, v)| v);
        if let Some(entry) = &entry {
            entry.session.shutdown().await;
        }
        entry
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
