//! Object storage backend trait

use async_trait::async_trait;
use axum::body::Bytes;

use super::types::{MultipartUpload, UploadedPart};
use crate::error::StorageError;

/// Multipart-capable object storage
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Start a multipart upload and return its upload id
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Upload one part of a multipart upload
    async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: i32,
        data: Bytes,
    ) -> Result<UploadedPart, StorageError>;

    /// Assemble the object from `parts`, which must be sorted by part number
    async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: &[UploadedPart],
    ) -> Result<(), StorageError>;

    /// Discard a multipart upload and any parts stored for it
    async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> Result<(), StorageError>;

    /// Check if an object exists
    async fn object_exists(&self, key: &str) -> Result<bool, StorageError>;
}
