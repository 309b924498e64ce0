//! Chunk relay
//!
//! Moves one chunk from the source into the session's multipart upload:
//! validate, create the multipart upload on first use, fetch the byte
//! range, upload it as part `index + 1`, then record the part.
//!
//! Each failing step leaves the stored session as it was, so the caller can
//! simply retry the same chunk.

use super::naming::{destination_key, normalize_folder};
use super::service::UploadService;
use super::types::{ChunkRelayed, ChunkRequest, UploadSession};
use crate::error::RelayError;
use crate::storage::MultipartUpload;

/// Multipart part number for a chunk index (parts are 1-indexed)
///
/// Indices come from a `ChunkPlan`, so they stay below `MAX_PARTS`.
pub fn part_number_for(index: u64) -> i32 {
    i32::try_from(index + 1).unwrap_or(i32::MAX)
}

impl UploadService {
    /// Relay one chunk of the active session
    pub async fn relay_chunk(&self, request: ChunkRequest) -> Result<ChunkRelayed, RelayError> {
        let ChunkRequest {
            session_id,
            index,
            folder,
        } = request;

        if !self.registry.is_active(&session_id).await? {
            return Err(RelayError::SessionInactive(session_id));
        }

        let session = self.sessions.require(&session_id).await?;
        let total_chunks = session.total_chunks;
        let index = u64::try_from(index)
            .ok()
            .filter(|&i| i < total_chunks)
            .ok_or(RelayError::InvalidChunkIndex { index, total_chunks })?;

        if session.is_chunk_uploaded(index) {
            return Ok(ChunkRelayed {
                chunk: index,
                already: true,
                uploaded: true,
                folder: session.folder,
            });
        }

        let folder = folder
            .as_deref()
            .map(normalize_folder)
            .filter(|f| !f.is_empty());
        let (upload, session) = self.ensure_multipart(session, folder.as_deref()).await?;

        let range = session
            .plan()?
            .range(index)
            .ok_or(RelayError::InvalidChunkIndex {
                index: index as i64,
                total_chunks,
            })?;

        let data = self
            .source
            .fetch_range(&session.source_url, range)
            .await
            .map_err(|e| RelayError::ChunkDownloadFailed {
                chunk: index,
                range: range.header_value(),
                detail: e.to_string(),
            })?;

        let part_number = part_number_for(index);
        let part = self
            .storage
            .upload_part(&upload, part_number, data)
            .await
            .map_err(|e| RelayError::PartUploadFailed {
                chunk: index,
                part_number,
                detail: e.to_string(),
            })?;

        let session = self
            .sessions
            .update(&session_id, |s| s.record_part(index, part.clone()))
            .await?;

        tracing::debug!(
            session_id = %session_id,
            chunk_index = index,
            part_number,
            bytes = range.len(),
            uploaded = session.uploaded_count(),
            total_chunks,
            "Chunk relayed"
        );

        Ok(ChunkRelayed {
            chunk: index,
            already: false,
            uploaded: true,
            folder: session.folder,
        })
    }

    /// Return the session's multipart upload, creating it on first use
    ///
    /// Creation is serialized per session so concurrent first chunks share
    /// one upload. The folder binds here: once the key is fixed, a
    /// different folder on later chunks is ignored.
    async fn ensure_multipart(
        &self,
        session: UploadSession,
        folder: Option<&str>,
    ) -> Result<(MultipartUpload, UploadSession), RelayError> {
        if let Some(upload) = session.multipart() {
            warn_if_folder_ignored(&session, folder);
            return Ok((upload, session));
        }

        let lock = self.sessions.lock_for(&session.id);
        let _guard = lock.lock().await;

        // Re-read: another chunk may have created the upload while we waited
        let session = self.sessions.require(&session.id).await?;
        if let Some(upload) = session.multipart() {
            warn_if_folder_ignored(&session, folder);
            return Ok((upload, session));
        }

        let folder = folder
            .map(str::to_string)
            .unwrap_or_else(|| session.folder.clone());
        let key = destination_key(&folder, &session.filename);

        let upload_id = self
            .storage
            .create_multipart_upload(&key, &session.content_type)
            .await
            .map_err(|e| RelayError::MultipartInitFailed(e.to_string()))?;
        let created = MultipartUpload::resume(&key, &upload_id);

        let stored = match self
            .sessions
            .update(&session.id, |s| {
                s.bind_multipart(&folder, &key, &upload_id);
            })
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_upload(&session.id, &created).await;
                return Err(e);
            }
        };

        let upload = stored
            .multipart()
            .ok_or_else(|| RelayError::Store("Multipart upload was not recorded".to_string()))?;

        if upload != created {
            // Another writer bound its upload first; keep theirs
            self.discard_upload(&session.id, &created).await;
        } else {
            tracing::info!(
                session_id = %session.id,
                key = %upload.key,
                upload_id = %upload.upload_id,
                "Initialized multipart upload"
            );
        }

        Ok((upload, stored))
    }

    async fn discard_upload(&self, session_id: &str, upload: &MultipartUpload) {
        if let Err(e) = self.storage.abort_multipart_upload(upload).await {
            tracing::warn!(
                session_id = %session_id,
                key = %upload.key,
                error = %e,
                "Failed to abort unused multipart upload"
            );
        }
    }
}

fn warn_if_folder_ignored(session: &UploadSession, folder: Option<&str>) {
    if let Some(folder) = folder {
        if folder != session.folder {
            tracing::warn!(
                session_id = %session.id,
                requested = %folder,
                bound = %session.folder,
                "Destination already fixed, ignoring folder change"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
