//! Upload Service
//!
//! Entry point for the relay operations. Session creation, clearing and
//! inspection live here; chunk relaying and completion are implemented in
//! `relay` and `completion`.

use std::sync::Arc;

use chrono::Utc;

use super::naming::derive_filename;
use super::plan::ChunkPlan;
use super::registry::ActiveSessionRegistry;
use super::session::SessionManager;
use super::types::{
    CleanupStatus, ClearOutcome, SessionCreated, SessionSnapshot, UploadSession,
    DEFAULT_CONTENT_TYPE,
};
use crate::error::RelayError;
use crate::kv::KvStore;
use crate::source::SourceFetcher;
use crate::storage::ObjectBackend;

/// Orchestrates relay sessions
#[derive(Clone)]
pub struct UploadService {
    pub(super) sessions: SessionManager,
    pub(super) registry: ActiveSessionRegistry,
    pub(super) storage: Arc<dyn ObjectBackend>,
    pub(super) source: Arc<dyn SourceFetcher>,
    chunk_size: u64,
}

impl UploadService {
    pub fn new(
        kv: Arc<dyn KvStore>,
        storage: Arc<dyn ObjectBackend>,
        source: Arc<dyn SourceFetcher>,
        chunk_size: u64,
    ) -> Self {
        Self {
            sessions: SessionManager::new(kv.clone()),
            registry: ActiveSessionRegistry::new(kv),
            storage,
            source,
            chunk_size,
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a session relaying `source_url`
    ///
    /// No multipart upload is created yet; that happens with the first chunk.
    pub async fn create_session(&self, source_url: &str) -> Result<SessionCreated, RelayError> {
        if source_url.is_empty() {
            return Err(RelayError::MissingParameter("url"));
        }
        if self.registry.current().await?.is_some() {
            return Err(RelayError::SessionAlreadyActive);
        }

        let metadata = self
            .source
            .probe(source_url)
            .await
            .map_err(|e| RelayError::SourceUnreachable(e.to_string()))?;

        let size = metadata.content_length.ok_or_else(|| {
            RelayError::InvalidSize("source declared no valid content-length".to_string())
        })?;
        let plan = ChunkPlan::new(size, self.chunk_size)?;

        let content_type = metadata
            .content_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let filename = derive_filename(source_url, &content_type);

        let session = UploadSession::new(source_url, content_type, filename, plan);
        self.sessions.insert(&session).await?;

        if !self.registry.try_claim(&session.id).await? {
            // Lost the slot to a concurrent creation
            self.sessions.delete(&session.id).await?;
            return Err(RelayError::SessionAlreadyActive);
        }

        tracing::info!(
            session_id = %session.id,
            source_url = %session.source_url,
            size = session.size,
            total_chunks = session.total_chunks,
            filename = %session.filename,
            "Created relay session"
        );

        Ok(SessionCreated {
            session: session.id,
            total_chunks: session.total_chunks,
            chunk_size: session.chunk_size,
            size: session.size,
            content_type: session.content_type,
            filename: session.filename,
            message: "Session started. Use /upload?session=...&chunk=...&folder=... to relay chunks."
                .to_string(),
        })
    }

    /// Abort any unfinished multipart upload, delete the session and free
    /// the active slot
    ///
    /// Succeeds even when storage is unreachable; the abort outcome is
    /// reported in the result instead.
    pub async fn clear_session(&self, session_id: &str) -> Result<ClearOutcome, RelayError> {
        let session = match self.sessions.get(session_id).await {
            Ok(session) => session,
            Err(e) => {
                // An unreadable record must not block freeing the slot
                tracing::warn!(session_id = %session_id, error = %e, "Could not read session before clearing");
                None
            }
        };

        let pending = session
            .as_ref()
            .filter(|s| s.needs_abort())
            .and_then(|s| s.multipart());

        let cleanup = match pending {
            Some(upload) => match self.storage.abort_multipart_upload(&upload).await {
                Ok(()) => CleanupStatus::Aborted,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        key = %upload.key,
                        error = %e,
                        "Failed to abort multipart upload, leaving it behind"
                    );
                    CleanupStatus::Failed(e.to_string())
                }
            },
            None => CleanupStatus::NotNeeded,
        };

        self.sessions.delete(session_id).await?;
        let released = self.registry.release_if(session_id).await?;

        tracing::info!(
            session_id = %session_id,
            existed = session.is_some(),
            released,
            cleanup = ?cleanup,
            "Cleared relay session"
        );

        Ok(ClearOutcome {
            session: session_id.to_string(),
            existed: session.is_some(),
            released,
            cleanup,
        })
    }

    /// Raw session record plus the active slot, for debugging
    pub async fn inspect(&self, session_id: &str) -> Result<SessionSnapshot, RelayError> {
        let session = self.sessions.require(session_id).await?;
        Ok(SessionSnapshot {
            session: session_id.to_string(),
            session_data: session,
            active_session: self.registry.current().await?,
            timestamp: Utc::now(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
