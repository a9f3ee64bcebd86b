//! Session store
//!
//! Sessions are held behind a per-session async mutex. A handler locks the
//! session for the whole of its read-validate-write cycle, so two requests
//! for the same session are serialized while different sessions proceed in
//! parallel.

use crate::{session::SessionData, Error, Result};
use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use odap_protocol::Phase;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Exclusive handle on one session
pub type SessionHandle = Arc<Mutex<SessionData>>;

/// Keyed storage of session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session, failing if the id is taken
    async fn create(&self, session: SessionData) -> Result<SessionHandle>;

    /// Handle on an existing session
    async fn open(&self, session_id: &str) -> Option<SessionHandle>;

    /// Persist a session after a locked update
    async fn save(&self, session: &SessionData) -> Result<()>;

    /// Number of sessions
    async fn len(&self) -> usize;

    /// Point-in-time copy of a session
    async fn snapshot(&self, session_id: &str) -> Option<SessionData> {
        let handle = self.open(session_id).await?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    /// Handle on a session that must exist for `phase`
    async fn open_for(&self, session_id: &str, phase: Phase) -> Result<SessionHandle> {
        self.open(session_id)
            .await
            .ok_or_else(|| Error::SessionNotFound {
                phase,
                session_id: session_id.to_string(),
            })
    }
}

/// In-memory session store
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionHandle>,
}

impl InMemorySessionStore {
    /// Create new store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: SessionData) -> Result<SessionHandle> {
        match self.sessions.entry(session.id.clone()) {
            Entry::Occupied(_) => Err(Error::DuplicateSession {
                session_id: session.id,
            }),
            Entry::Vacant(slot) => {
                let handle = Arc::new(Mutex::new(session));
                slot.insert(handle.clone());
                Ok(handle)
            }
        }
    }

    async fn open(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.get(session_id).map(|h| h.value().clone())
    }

    async fn save(&self, session: &SessionData) -> Result<()> {
        // The caller mutates the record through its handle; nothing to copy.
        if self.sessions.contains_key(&session.id) {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "session {} is not in the store",
                session.id
            )))
        }
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}
