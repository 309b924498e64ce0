//! Active-session registry
//!
//! A single slot naming the one session currently allowed to accept
//! chunks. The slot is claimed with set-if-absent and released with
//! clear-if-matches, so two creations can never both win and a stale
//! clear can never free someone else's session.
//!
//! Running several sessions at once would need this generalized to a set
//! keyed by session id; that is not supported.

use std::sync::Arc;

use crate::error::RelayError;
use crate::kv::KvStore;

/// Store key holding the active session id
pub const ACTIVE_SESSION_KEY: &str = "active_session";

#[derive(Clone)]
pub struct ActiveSessionRegistry {
    kv: Arc<dyn KvStore>,
}

impl ActiveSessionRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// The currently active session id, if any
    pub async fn current(&self) -> Result<Option<String>, RelayError> {
        let entry = self.kv.get(ACTIVE_SESSION_KEY).await?;
        Ok(entry.map(|e| String::from_utf8_lossy(&e.value).into_owned()))
    }

    /// Check whether `session_id` holds the slot
    pub async fn is_active(&self, session_id: &str) -> Result<bool, RelayError> {
        Ok(self.current().await?.as_deref() == Some(session_id))
    }

    /// Claim the slot for `session_id`; `false` if it is already taken
    pub async fn try_claim(&self, session_id: &str) -> Result<bool, RelayError> {
        Ok(self
            .kv
            .insert_if_absent(ACTIVE_SESSION_KEY, session_id.as_bytes().to_vec())
            .await?)
    }

    /// Release the slot if `session_id` holds it
    pub async fn release_if(&self, session_id: &str) -> Result<bool, RelayError> {
        let Some(entry) = self.kv.get(ACTIVE_SESSION_KEY).await? else {
            return Ok(false);
        };
        if entry.value != session_id.as_bytes() {
            return Ok(false);
        }
        Ok(self
            .kv
            .delete_if_matches(ACTIVE_SESSION_KEY, &entry.value, entry.version)
            .await?)
    }
}
