//! Upload Session Manager
//!
//! Persists sessions in the key-value store with:
//! - Optimistic concurrency: every update re-reads the record and writes it
//!   back only if nobody else wrote in between, retrying on conflict
//! - Per-session async locks for steps that must have a single writer
//!   (multipart creation, completion)

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use super::types::UploadSession;
use crate::error::RelayError;
use crate::kv::KvStore;

/// Attempts before an update gives up on a contended session
pub const MAX_UPDATE_ATTEMPTS: usize = 32;

// ============================================================================
// Session Manager
// ============================================================================

/// Manages persisted upload sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    kv: Arc<dyn KvStore>,

    /// Single-writer locks indexed by session ID
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                kv,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Store a freshly created session
    pub async fn insert(&self, session: &UploadSession) -> Result<(), RelayError> {
        let bytes = serde_json::to_vec(session)?;
        if !self.inner.kv.insert_if_absent(&session.id, bytes).await? {
            return Err(RelayError::Store(format!(
                "Session id collision: {}",
                session.id
            )));
        }
        Ok(())
    }

    /// Get a session by ID
    pub async fn get(&self, id: &str) -> Result<Option<UploadSession>, RelayError> {
        match self.inner.kv.get(id).await? {
            Some(entry) => Ok(Some(serde_json::from_slice(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Get a session by ID, failing if it does not exist
    pub async fn require(&self, id: &str) -> Result<UploadSession, RelayError> {
        self.get(id)
            .await?
            .ok_or_else(|| RelayError::SessionNotFound(id.to_string()))
    }

    /// Apply `apply` to the stored session and write it back atomically
    ///
    /// `apply` may run more than once if other writers race this one, and
    /// always sees the latest stored state.
    pub async fn update<F>(&self, id: &str, mut apply: F) -> Result<UploadSession, RelayError>
    where
        F: FnMut(&mut UploadSession),
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let entry = self
                .inner
                .kv
                .get(id)
                .await?
                .ok_or_else(|| RelayError::SessionNotFound(id.to_string()))?;

            let mut session: UploadSession = serde_json::from_slice(&entry.value)?;
            apply(&mut session);
            let bytes = serde_json::to_vec(&session)?;

            if self
                .inner
                .kv
                .replace_if_version(id, bytes, entry.version)
                .await?
            {
                return Ok(session);
            }

            tracing::debug!(session_id = %id, attempt, "Session write conflict, retrying");
            tokio::task::yield_now().await;
        }

        Err(RelayError::Store(format!(
            "Too many concurrent updates to session {}",
            id
        )))
    }

    /// Delete a session record
    pub async fn delete(&self, id: &str) -> Result<(), RelayError> {
        self.inner.kv.delete(id).await?;
        self.inner.locks.lock().remove(id);
        Ok(())
    }

    /// Lock serializing single-writer steps for one session
    pub fn lock_for(&self, id: &str) -> Arc<AsyncMutex<()>> {
        self.inner
            .locks
            .lock()
            .entry(id.to_string())
            .or_default()
            .clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
