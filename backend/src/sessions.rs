//! In-memory wizard sessions.

use crate::config::SessionLimits;
use crate::errors::ApiError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;
use zkp_visa_core::wizard::WizardSession;

struct Entry {
    session: WizardSession,
    last_touched: Instant,
}

impl Entry {
    fn is_idle(&self, now: Instant, ttl: std::time::Duration) -> bool {
        now.duration_since(self.last_touched) >= ttl
    }
}

/// Sessions keyed by id. Callers get short critical sections through [`SessionStore::update`];
/// the lock is never held across a timer or network call.
///
/// Sessions idle for longer than the configured TTL are dropped, and no more than
/// `max_sessions` live at once.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self { inner: Arc::default(), limits }
    }

    pub async fn create(&self) -> Result<(Uuid, WizardSession), ApiError> {
        let now = Instant::now();
        let mut sessions = self.inner.lock().await;

        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_idle(now, self.limits.idle_ttl));
        if sessions.len() < before {
            tracing::info!(evicted = before - sessions.len(), "dropped idle sessions");
        }

        if sessions.len() >= self.limits.max_sessions {
            tracing::warn!(live = sessions.len(), "session limit reached");
            return Err(ApiError::ServiceUnavailable(
                "too many active sessions, try again later".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let session = WizardSession::new();
        sessions.insert(id, Entry { session: session.clone(), last_touched: now });
        Ok((id, session))
    }

    pub async fn get(&self, id: Uuid) -> Result<WizardSession, ApiError> {
        self.update(id, |_| Ok(())).await.map(|(_, session)| session)
    }

    /// Run `f` against the session and return its result together with the updated session.
    pub async fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut WizardSession) -> Result<T, ApiError>,
    ) -> Result<(T, WizardSession), ApiError> {
        let now = Instant::now();
        let mut sessions = self.inner.lock().await;

        if sessions.get(&id).is_some_and(|entry| entry.is_idle(now, self.limits.idle_ttl)) {
            sessions.remove(&id);
            tracing::info!(session = %id, "session expired");
        }

        let entry = sessions.get_mut(&id).ok_or_else(|| not_found(id))?;
        entry.last_touched = now;
        let out = f(&mut entry.session)?;
        Ok((out, entry.session.clone()))
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), ApiError> {
        self.inner
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("session {id} not found"))
}
