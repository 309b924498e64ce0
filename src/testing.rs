//! In-memory test doubles for storage and source

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::kv::MemoryKvStore;
use crate::source::{SourceError, SourceFetcher, SourceMetadata};
use crate::storage::{MultipartUpload, ObjectBackend, UploadedPart};
use crate::upload::{ByteRange, UploadService, DEFAULT_CHUNK_SIZE};

pub const MIB: u64 = 1024 * 1024;

// ============================================================================
// Object storage
// ============================================================================

/// Multipart backend that keeps part sizes in memory and counts calls
#[derive(Default)]
pub struct MemoryBackend {
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    abort_calls: AtomicUsize,
    offline: AtomicBool,
    fail_create: AtomicBool,
    fail_upload: AtomicBool,
    fail_complete: AtomicBool,
    created_keys: Mutex<Vec<String>>,
    /// upload id -> part number -> (etag, size)
    uploads: Mutex<HashMap<String, HashMap<i32, (String, u64)>>>,
    completions: Mutex<Vec<Vec<UploadedPart>>>,
    /// key -> size
    objects: Mutex<HashMap<String, u64>>,
}

impl MemoryBackend {
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn abort_calls(&self) -> usize {
        self.abort_calls.load(Ordering::SeqCst)
    }

    pub fn created_keys(&self) -> Vec<String> {
        self.created_keys.lock().clone()
    }

    /// Part lists passed to successful completions
    pub fn completions(&self) -> Vec<Vec<UploadedPart>> {
        self.completions.lock().clone()
    }

    pub fn object_size(&self, key: &str) -> Option<u64> {
        self.objects.lock().get(key).copied()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upload(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    pub fn fail_complete(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::SeqCst);
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) || flag.load(Ordering::SeqCst) {
            return Err(StorageError::SdkError(format!("{} unavailable", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn create_multipart_upload(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_create, "create")?;

        let upload_id = format!("upload-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.created_keys.lock().push(key.to_string());
        self.uploads.lock().insert(upload_id.clone(), HashMap::new());
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        data: Bytes,
    ) -> Result<UploadedPart, StorageError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_upload, "upload")?;

        let etag = format!("\"{}-{}\"", upload.upload_id, part_number);
        let mut uploads = self.uploads.lock();
        let parts = uploads
            .get_mut(&upload.upload_id)
            .ok_or_else(|| StorageError::SdkError("NoSuchUpload".to_string()))?;
        parts.insert(part_number, (etag.clone(), data.len() as u64));

        Ok(UploadedPart { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: &[UploadedPart],
    ) -> Result<(), StorageError> {
        self.check(&self.fail_complete, "complete")?;

        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StorageError::SdkError("InvalidPartOrder".to_string()));
        }

        let stored = self
            .uploads
            .lock()
            .remove(&upload.upload_id)
            .ok_or_else(|| StorageError::SdkError("NoSuchUpload".to_string()))?;

        let mut size = 0;
        for part in parts {
            match stored.get(&part.part_number) {
                Some((etag, len)) if *etag == part.etag => size += len,
                _ => return Err(StorageError::SdkError("InvalidPart".to_string())),
            }
        }

        self.objects.lock().insert(upload.key.clone(), size);
        self.completions.lock().push(parts.to_vec());
        Ok(())
    }

    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> Result<(), StorageError> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        self.check(&self.offline, "abort")?;
        self.uploads.lock().remove(&upload.upload_id);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool, StorageError> {
        self.check(&self.offline, "head")?;
        Ok(self.objects.lock().contains_key(key))
    }
}

// ============================================================================
// Source
// ============================================================================

/// Source serving zero-filled bytes of a fixed size
pub struct StaticSource {
    size: u64,
    content_type: String,
    declared_length: Mutex<Option<u64>>,
    probe_failure: Mutex<Option<u16>>,
    range_failure: Mutex<Option<u16>>,
    probe_calls: AtomicUsize,
    fetched: Mutex<Vec<ByteRange>>,
}

impl StaticSource {
    pub fn new(size: u64, content_type: &str) -> Self {
        Self {
            size,
            content_type: content_type.to_string(),
            declared_length: Mutex::new(Some(size)),
            probe_failure: Mutex::new(None),
            range_failure: Mutex::new(None),
            probe_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn set_declared_length(&self, length: Option<u64>) {
        *self.declared_length.lock() = length;
    }

    pub fn fail_probe(&self, status: u16) {
        *self.probe_failure.lock() = Some(status);
    }

    pub fn fail_ranges(&self, status: u16) {
        *self.range_failure.lock() = Some(status);
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetched.lock().len()
    }

    pub fn fetched_ranges(&self) -> Vec<ByteRange> {
        self.fetched.lock().clone()
    }
}

fn status_error(status: u16) -> SourceError {
    SourceError::Status {
        status,
        reason: reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string(),
    }
}

#[async_trait]
impl SourceFetcher for StaticSource {
    async fn probe(&self, _url: &str) -> Result<SourceMetadata, SourceError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.probe_failure.lock() {
            return Err(status_error(status));
        }
        Ok(SourceMetadata {
            content_length: *self.declared_length.lock(),
            content_type: Some(self.content_type.clone()),
        })
    }

    async fn fetch_range(&self, _url: &str, range: ByteRange) -> Result<Bytes, SourceError> {
        if let Some(status) = *self.range_failure.lock() {
            return Err(status_error(status));
        }
        self.fetched.lock().push(range);
        let end = range.end.min(self.size);
        Ok(Bytes::from(vec![0u8; end.saturating_sub(range.start) as usize]))
    }
}

// ============================================================================
// Harness
// ============================================================================

/// An upload service wired to in-memory collaborators
pub struct Harness {
    pub service: UploadService,
    pub storage: Arc<MemoryBackend>,
    pub source: Arc<StaticSource>,
    pub url: String,
}

impl Harness {
    /// Source of `size` bytes relayed in default-sized chunks
    pub fn with_source(size: u64) -> Self {
        Self::with_chunk_size(size, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(size: u64, chunk_size: u64) -> Self {
        let storage = Arc::new(MemoryBackend::default());
        let source = Arc::new(StaticSource::new(size, "video/mp4"));
        let service = UploadService::new(
            Arc::new(MemoryKvStore::new()),
            storage.clone(),
            source.clone(),
            chunk_size,
        );

        Self {
            service,
            storage,
            source,
            url: "https://files.example.com/media/video.mp4".to_string(),
        }
    }
}
