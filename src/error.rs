//! Error types for the Chunk Relay server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Relay-wide result type
pub type Result<T> = std::result::Result<T, RelayError>;

/// Failure of a relay operation
///
/// Every variant is recoverable from the caller's side; retries are always
/// caller-driven re-invocations of the same operation.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid file size: {0}")]
    InvalidSize(String),

    #[error("File URL not accessible: {0}")]
    SourceUnreachable(String),

    #[error("An upload session is already active")]
    SessionAlreadyActive,

    #[error("Missing or malformed parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Session inactive or expired: {0}")]
    SessionInactive(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid chunk index {index} (total chunks: {total_chunks})")]
    InvalidChunkIndex { index: i64, total_chunks: u64 },

    #[error("Failed to initialize multipart upload: {0}")]
    MultipartInitFailed(String),

    #[error("Failed to download chunk {chunk} ({range}): {detail}")]
    ChunkDownloadFailed {
        chunk: u64,
        range: String,
        detail: String,
    },

    #[error("Failed to upload part {part_number} for chunk {chunk}: {detail}")]
    PartUploadFailed {
        chunk: u64,
        part_number: i32,
        detail: String,
    },

    #[error("Failed to complete multipart upload: {0}")]
    CompletionFailed(String),

    #[error("Session store error: {0}")]
    Store(String),
}

impl RelayError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSize(_) => StatusCode::BAD_REQUEST,
            Self::SourceUnreachable(_) => StatusCode::BAD_REQUEST,
            Self::SessionAlreadyActive => StatusCode::CONFLICT,
            Self::MissingParameter(_) => StatusCode::BAD_REQUEST,
            Self::SessionInactive(_) => StatusCode::FORBIDDEN,
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidChunkIndex { .. } => StatusCode::BAD_REQUEST,
            Self::MultipartInitFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ChunkDownloadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PartUploadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CompletionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSize(_) => "INVALID_SIZE",
            Self::SourceUnreachable(_) => "SOURCE_UNREACHABLE",
            Self::SessionAlreadyActive => "SESSION_ALREADY_ACTIVE",
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::SessionInactive(_) => "SESSION_INACTIVE",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::InvalidChunkIndex { .. } => "INVALID_CHUNK_INDEX",
            Self::MultipartInitFailed(_) => "MULTIPART_INIT_FAILED",
            Self::ChunkDownloadFailed { .. } => "CHUNK_DOWNLOAD_FAILED",
            Self::PartUploadFailed { .. } => "PART_UPLOAD_FAILED",
            Self::CompletionFailed(_) => "COMPLETION_FAILED",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Downstream detail, when the failure came from another system
    fn details(&self) -> Option<String> {
        match self {
            Self::SourceUnreachable(detail)
            | Self::MultipartInitFailed(detail)
            | Self::CompletionFailed(detail)
            | Self::Store(detail) => Some(detail.clone()),
            Self::ChunkDownloadFailed { detail, .. } | Self::PartUploadFailed { detail, .. } => {
                Some(detail.clone())
            }
            _ => None,
        }
    }
}

impl From<KvError> for RelayError {
    fn from(e: KvError) -> Self {
        RelayError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Store(format!("Malformed session record: {}", e))
    }
}

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 SDK error: {0}")]
    SdkError(String),
}

/// Session store errors
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    part_number: Option<i32>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
        }

        let (chunk, range, part_number) = match &self {
            RelayError::ChunkDownloadFailed { chunk, range, .. } => {
                (Some(*chunk), Some(range.clone()), None)
            }
            RelayError::PartUploadFailed {
                chunk, part_number, ..
            } => (Some(*chunk), None, Some(*part_number)),
            _ => (None, None, None),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code(),
            details: self.details(),
            chunk,
            range,
            part_number,
        });

        (status, body).into_response()
    }
}
