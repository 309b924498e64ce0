//! Completion and progress reporting
//!
//! Progress checks double as the completion trigger: once every chunk is
//! uploaded, the first check finalizes the multipart upload. The trigger is
//! re-evaluated from the stored session on every call, and `completed` is
//! only written after the backend accepted the completion, so a failed
//! completion is retried by simply checking progress again.

use chrono::Utc;

use super::service::UploadService;
use super::types::{ProgressReport, UploadSession};
use crate::error::RelayError;

impl UploadService {
    /// Report progress, completing the upload if it is ready
    pub async fn progress(&self, session_id: &str) -> Result<ProgressReport, RelayError> {
        let mut session = self.sessions.require(session_id).await?;

        if session.ready_to_complete() {
            session = self.complete(session).await?;
        }

        let destination_key = session.resolved_key();
        // Lets callers notice a completion that happened elsewhere
        let object_exists = match self.storage.object_exists(&destination_key).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    key = %destination_key,
                    error = %e,
                    "Could not check destination object"
                );
                false
            }
        };

        Ok(ProgressReport {
            session: session.id.clone(),
            uploaded_chunks: session.uploaded_count(),
            total_chunks: session.total_chunks,
            completed: session.completed,
            object_exists,
            filename: session.filename,
            destination_key,
            folder: session.folder,
            multipart_upload_id: session.multipart_upload_id,
        })
    }

    async fn complete(&self, session: UploadSession) -> Result<UploadSession, RelayError> {
        let lock = self.sessions.lock_for(&session.id);
        let _guard = lock.lock().await;

        // A concurrent check may have completed it while we waited
        let session = self.sessions.require(&session.id).await?;
        let upload = match session.multipart() {
            Some(upload) if session.ready_to_complete() => upload,
            _ => return Ok(session),
        };

        let parts = session.ordered_parts();
        self.storage
            .complete_multipart_upload(&upload, &parts)
            .await
            .map_err(|e| RelayError::CompletionFailed(e.to_string()))?;

        let completed_at = Utc::now();
        let session = self
            .sessions
            .update(&session.id, |s| s.mark_completed(completed_at))
            .await?;

        tracing::info!(
            session_id = %session.id,
            key = %upload.key,
            parts = parts.len(),
            "Multipart upload completed"
        );

        Ok(session)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::error::RelayError;
    use crate::testing::{Harness, MIB};
    use crate::upload::{CleanupStatus, ChunkRequest};

    async fn relay_all(h: &Harness, session: &str, order: &[i64]) {
        for &index in order {
            h.service
                .relay_chunk(ChunkRequest::new(session, index))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_end_to_end_sixty_mib() {
        let h = Harness::with_source(60 * MIB);
        let created = h.service.create_session(&h.url).await.unwrap();
        assert_eq!(created.total_chunks, 3);

        relay_all(&h, &created.session, &[1, 2, 0]).await;

        let report = h.service.progress(&created.session).await.unwrap();
        assert!(report.completed);
        assert!(report.object_exists);
        assert_eq!(report.uploaded_chunks, 3);
        assert_eq!(report.total_chunks, 3);
        assert_eq!(report.destination_key, "video.mp4");

        let completions = h.storage.completions();
        assert_eq!(completions.len(), 1);
        let numbers: Vec<i32> = completions[0].iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(h.storage.object_size("video.mp4"), Some(60 * MIB));

        // Second check does not complete again
        let report = h.service.progress(&created.session).await.unwrap();
        assert!(report.completed);
        assert_eq!(h.storage.completions().len(), 1);

        let stored = h.service.sessions.require(&created.session).await.unwrap();
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_progress_before_all_chunks() {
        let h = Harness::with_source(60 * MIB);
        let created = h.service.create_session(&h.url).await.unwrap();
        relay_all(&h, &created.session, &[0]).await;

        let report = h.service.progress(&created.session).await.unwrap();
        assert!(!report.completed);
        assert!(!report.object_exists);
        assert_eq!(report.uploaded_chunks, 1);
        assert!(report.multipart_upload_id.is_some());
        assert!(h.storage.completions().is_empty());
    }

    #[tokio::test]
    async fn test_completion_failure_can_be_retried() {
        let h = Harness::with_source(60 * MIB);
        let created = h.service.create_session(&h.url).await.unwrap();
        relay_all(&h, &created.session, &[0, 1, 2]).await;
        h.storage.fail_complete(true);

        let result = h.service.progress(&created.session).await;
        assert!(matches!(result, Err(RelayError::CompletionFailed(_))));
        let stored = h.service.sessions.require(&created.session).await.unwrap();
        assert!(!stored.completed);

        h.storage.fail_complete(false);
        let report = h.service.progress(&created.session).await.unwrap();
        assert!(report.completed);
        assert_eq!(h.storage.completions().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_unknown_session() {
        let h = Harness::with_source(MIB);
        let result = h.service.progress("session_missing").await;
        assert!(matches!(result, Err(RelayError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_existence_check_failure_is_reported_as_absent() {
        let h = Harness::with_source(MIB);
        let created = h.service.create_session(&h.url).await.unwrap();
        h.storage.set_offline(true);

        let report = h.service.progress(&created.session).await.unwrap();
        assert!(!report.object_exists);
        assert!(!report.completed);
    }

    #[tokio::test]
    async fn test_clear_after_completion_skips_abort() {
        let h = Harness::with_source(60 * MIB);
        let created = h.service.create_session(&h.url).await.unwrap();
        relay_all(&h, &created.session, &[0, 1, 2]).await;
        h.service.progress(&created.session).await.unwrap();

        let outcome = h.service.clear_session(&created.session).await.unwrap();

        assert_eq!(outcome.cleanup, CleanupStatus::NotNeeded);
        assert_eq!(h.storage.abort_calls(), 0);
        assert!(h.service.sessions.get(&created.session).await.unwrap().is_none());
        assert_eq!(h.service.registry.current().await.unwrap(), None);
        // The finished object stays
        assert_eq!(h.storage.object_size("video.mp4"), Some(60 * MIB));
    }

    #[tokio::test]
    async fn test_concurrent_progress_completes_once() {
        let h = Harness::with_chunk_size(4096, 1024);
        let created = h.service.create_session(&h.url).await.unwrap();
        relay_all(&h, &created.session, &[3, 1, 0, 2]).await;

        let checks: Vec<_> = (0..8)
            .map(|_| {
                let service = h.service.clone();
                let id = created.session.clone();
                tokio::spawn(async move { service.progress(&id).await })
            })
            .collect();

        for check in futures::future::join_all(checks).await {
            assert!(check.unwrap().unwrap().completed);
        }
        assert_eq!(h.storage.completions().len(), 1);
    }
}
