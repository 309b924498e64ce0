//! Source fetching
//!
//! The remote server a session relays from. Only two requests are ever made
//! against it: a metadata probe when the session is created, and one
//! range-restricted GET per chunk.

mod http;

pub use http::HttpSource;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::upload::ByteRange;

/// Headers declared by the source for the whole file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Declared `Content-Length`, if present and a valid integer
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// Source request errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },
}

/// Trait for fetching source bytes
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Probe the source for its size and content type without a body
    async fn probe(&self, url: &str) -> Result<SourceMetadata, SourceError>;

    /// Fetch exactly `range` from the source
    async fn fetch_range(&self, url: &str, range: ByteRange) -> Result<Bytes, SourceError>;
}
