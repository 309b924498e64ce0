//! Storage types

use serde::{Deserialize, Serialize};

/// Handle to an in-progress multipart upload
///
/// Resuming an upload needs nothing but the object key and the upload id
/// handed out when it was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
}

impl MultipartUpload {
    pub fn resume(key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }
}

/// A part accepted by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    /// 1-indexed part number
    pub part_number: i32,
    pub etag: String,
}
