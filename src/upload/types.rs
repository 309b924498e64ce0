//! Upload types for the chunk relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::naming::destination_key;
use super::plan::ChunkPlan;
use crate::error::RelayError;
use crate::storage::{MultipartUpload, UploadedPart};

// ============================================================================
// Constants
// ============================================================================

/// Default chunk size: 25MB
pub const DEFAULT_CHUNK_SIZE: u64 = 25 * 1024 * 1024;

/// Content type assumed when the source declares none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Session Types
// ============================================================================

/// Persisted state of one relay session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Unique session ID
    pub id: String,

    /// URL the file is relayed from
    pub source_url: String,

    /// Total file size in bytes
    pub size: u64,

    /// MIME type declared by the source
    #[serde(rename = "type")]
    pub content_type: String,

    /// Chunk size used for this session
    pub chunk_size: u64,

    pub total_chunks: u64,

    /// One flag per chunk, true once its part is stored
    pub uploaded: Vec<bool>,

    /// Destination folder, without surrounding slashes
    pub folder: String,

    /// Destination file name
    pub filename: String,

    /// Object key, fixed when the multipart upload is created
    pub destination_key: Option<String>,

    pub multipart_upload_id: Option<String>,

    /// Part per chunk index; `None` until that chunk is uploaded
    pub parts: Vec<Option<UploadedPart>>,

    pub created_at: DateTime<Utc>,

    pub completed: bool,

    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// Create a new upload session
    pub fn new(
        source_url: impl Into<String>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
        plan: ChunkPlan,
    ) -> Self {
        let now = Utc::now();
        let chunks = plan.total_chunks() as usize;

        Self {
            id: generate_session_id(now),
            source_url: source_url.into(),
            size: plan.total_size(),
            content_type: content_type.into(),
            chunk_size: plan.chunk_size(),
            total_chunks: plan.total_chunks(),
            uploaded: vec![false; chunks],
            folder: String::new(),
            filename: filename.into(),
            destination_key: None,
            multipart_upload_id: None,
            parts: vec![None; chunks],
            created_at: now,
            completed: false,
            completed_at: None,
        }
    }

    /// Chunk plan this session was created with
    pub fn plan(&self) -> Result<ChunkPlan, RelayError> {
        ChunkPlan::new(self.size, self.chunk_size)
    }

    /// Check whether chunk `index` has been uploaded
    pub fn is_chunk_uploaded(&self, index: u64) -> bool {
        self.uploaded.get(index as usize).copied().unwrap_or(false)
    }

    /// Number of uploaded chunks
    pub fn uploaded_count(&self) -> u64 {
        self.uploaded.iter().filter(|&&done| done).count() as u64
    }

    /// Check if all chunks have been uploaded
    pub fn all_chunks_uploaded(&self) -> bool {
        self.uploaded.iter().all(|&done| done)
    }

    /// Handle for the session's multipart upload, once created
    pub fn multipart(&self) -> Option<MultipartUpload> {
        match (&self.destination_key, &self.multipart_upload_id) {
            (Some(key), Some(id)) => Some(MultipartUpload::resume(key, id)),
            _ => None,
        }
    }

    /// Whether the completion call should run now
    pub fn ready_to_complete(&self) -> bool {
        !self.completed && self.all_chunks_uploaded() && self.multipart().is_some()
    }

    /// Whether clearing the session must abort a multipart upload
    pub fn needs_abort(&self) -> bool {
        !self.completed && self.multipart().is_some()
    }

    /// The object key, or the key it would get with the current folder
    pub fn resolved_key(&self) -> String {
        self.destination_key
            .clone()
            .unwrap_or_else(|| destination_key(&self.folder, &self.filename))
    }

    /// Bind the multipart upload to this session
    ///
    /// Only the first binding sticks; returns `false` if one already existed.
    pub fn bind_multipart(&mut self, folder: &str, key: &str, upload_id: &str) -> bool {
        if self.multipart_upload_id.is_some() {
            return false;
        }
        self.folder = folder.to_string();
        self.destination_key = Some(key.to_string());
        self.multipart_upload_id = Some(upload_id.to_string());
        true
    }

    /// Record the part stored for chunk `index`
    pub fn record_part(&mut self, index: u64, part: UploadedPart) {
        let i = index as usize;
        if i < self.uploaded.len() {
            self.parts[i] = Some(part);
            self.uploaded[i] = true;
        }
    }

    /// Parts sorted by part number, ready for completion
    pub fn ordered_parts(&self) -> Vec<UploadedPart> {
        let mut parts: Vec<UploadedPart> = self.parts.iter().flatten().cloned().collect();
        parts.sort_by_key(|p| p.part_number);
        parts
    }

    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(at);
        }
    }
}

/// Random component plus creation time
fn generate_session_id(now: DateTime<Utc>) -> String {
    format!("session_{}_{}", Uuid::new_v4().simple(), now.timestamp_millis())
}

// ============================================================================
// Request Types
// ============================================================================

/// Query for `GET /?url=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSessionQuery {
    pub url: Option<String>,
}

/// Query for endpoints addressing one session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

impl SessionQuery {
    pub fn session_id(&self) -> Result<&str, RelayError> {
        self.session
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RelayError::MissingParameter("session"))
    }
}

/// Raw query for `GET /upload`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkQuery {
    pub session: Option<String>,
    pub chunk: Option<String>,
    pub folder: Option<String>,
}

/// A validated chunk relay request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    pub session_id: String,
    /// Requested index; may still be out of range for the session
    pub index: i64,
    pub folder: Option<String>,
}

impl ChunkRequest {
    pub fn new(session_id: impl Into<String>, index: i64) -> Self {
        Self {
            session_id: session_id.into(),
            index,
            folder: None,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }
}

impl TryFrom<ChunkQuery> for ChunkRequest {
    type Error = RelayError;

    fn try_from(query: ChunkQuery) -> Result<Self, Self::Error> {
        let session_id = query
            .session
            .filter(|s| !s.is_empty())
            .ok_or(RelayError::MissingParameter("session"))?;
        let index = query
            .chunk
            .as_deref()
            .and_then(|c| c.trim().parse::<i64>().ok())
            .ok_or(RelayError::MissingParameter("chunk"))?;

        Ok(Self {
            session_id,
            index,
            folder: query.folder.filter(|f| !f.is_empty()),
        })
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Response after creating a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session: String,
    pub total_chunks: u64,
    pub chunk_size: u64,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub filename: String,
    pub message: String,
}

/// Response after relaying a chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRelayed {
    pub chunk: u64,
    /// True when the chunk had been uploaded by an earlier call
    pub already: bool,
    pub uploaded: bool,
    pub folder: String,
}

/// Progress of a session, reported after any completion attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub session: String,
    pub uploaded_chunks: u64,
    pub total_chunks: u64,
    pub completed: bool,
    /// Whether the destination object is visible in storage
    pub object_exists: bool,
    pub filename: String,
    pub destination_key: String,
    pub folder: String,
    pub multipart_upload_id: Option<String>,
}

/// What happened to the multipart upload when a session was cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum CleanupStatus {
    /// No incomplete multipart upload existed
    NotNeeded,
    Aborted,
    /// The abort call failed; the incomplete upload may linger in storage
    Failed(String),
}

/// Result of clearing a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOutcome {
    pub session: String,
    /// Whether a session record existed
    pub existed: bool,
    /// Whether the active-session slot pointed at this session
    pub released: bool,
    pub cleanup: CleanupStatus,
}

/// Raw view of a session for debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: String,
    pub session_data: UploadSession,
    pub active_session: Option<String>,
    pub timestamp: DateTime<Utc>,
}
