//! Live document sessions, keyed by conversation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docintake_core::{SessionEvent, SessionId};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::session::{DocumentSession, SessionInput, SessionPolicy};
use crate::state::SessionState;

pub type SessionHandle = Arc<Mutex<DocumentSession>>;

/// Tracks every non-terminal session. A session is removed as soon as it
/// completes, is cancelled, or expires.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,
    policy: Arc<SessionPolicy>,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Return the session for `session_id`, creating it when absent. The flag
    /// is `true` when this call created it.
    pub async fn get_or_create(&self, session_id: &str) -> (SessionHandle, bool) {
        if let Some(existing) = self.get(session_id).await {
            return (existing, false);
        }
        let mut w = self.sessions.write().await;
        // Another task may have inserted between the read and write locks.
        if let Some(existing) = w.get(session_id) {
            return (existing.clone(), false);
        }
        let handle = Arc::new(Mutex::new(DocumentSession::new(session_id, self.policy.clone())));
        w.insert(session_id.to_string(), handle.clone());
        debug!(session = session_id, "Session created");
        (handle, true)
    }

    /// Remove `session_id` only if it still maps to `handle`, so a finished
    /// session never evicts a newer one under the same id.
    pub async fn remove_if_same(&self, session_id: &str, handle: &SessionHandle) -> bool {
        let mut w = self.sessions.write().await;
        match w.get(session_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                w.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn active_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Expire sessions idle for at least `timeout`.
    ///
    /// Sessions whose lock is held, or that are waiting on the model, are
    /// busy and left alone. Returns the expiry events to deliver.
    pub async fn reap_idle(&self, timeout: Duration) -> Vec<(SessionId, SessionEvent)> {
        let candidates: Vec<(SessionId, SessionHandle)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in candidates {
            let Ok(mut session) = handle.try_lock() else { continue };
            if matches!(session.state(), SessionState::Extracting(_)) || session.idle_for() < timeout {
                continue;
            }
            let events = session.apply(SessionInput::Expire);
            drop(session);
            if self.remove_if_same(&id, &handle).await {
                info!(session = %id, "Session expired after inactivity");
                expired.extend(events.into_iter().map(|event| (id.clone(), event)));
            }
        }
        expired
    }
}
