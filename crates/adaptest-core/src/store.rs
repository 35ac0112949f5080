//! Session persistence seam.
//!
//! The session manager only needs create / find / full-replace save, plus a
//! lookup of the user's in-progress session. Durable back-ends live in
//! `adaptest-store`; the in-memory store here backs tests and simulations.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::DiagnosticSession;

/// Storage back-end for diagnostic sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Human-readable back-end name (e.g. "memory").
    fn name(&self) -> &str;

    /// Insert a new session. Fails if the id already exists.
    async fn create(&self, session: &DiagnosticSession) -> Result<()>;

    /// Load a session by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DiagnosticSession>>;

    /// Replace a stored session. Fails if the id is unknown.
    async fn save(&self, session: &DiagnosticSession) -> Result<()>;

    /// The user's `in_progress` session, if any.
    async fn find_active_for_user(&self, user_id: &str) -> Result<Option<DiagnosticSession>>;
}

/// Process-local session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, DiagnosticSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, session: &DiagnosticSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            anyhow::bail!("session already exists: {}", session.id);
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DiagnosticSession>> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save(&self, session: &DiagnosticSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(slot) => {
                *slot = session.clone();
                Ok(())
            }
            None => anyhow::bail!("cannot save unknown session: {}", session.id),
        }
    }

    async fn find_active_for_user(&self, user_id: &str) -> Result<Option<DiagnosticSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.user_id == user_id && s.is_active())
            .cloned())
    }
}
