//! Chunk planning
//!
//! Splits a file of known size into fixed-size, contiguous byte ranges.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Most parts a multipart upload may have
pub const MAX_PARTS: u64 = 10_000;

/// Half-open byte range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Value for an HTTP `Range` header (inclusive end)
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// How a file is divided into chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
    total_chunks: u64,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self, RelayError> {
        if total_size == 0 {
            return Err(RelayError::InvalidSize("file size must be positive".to_string()));
        }
        if chunk_size == 0 {
            return Err(RelayError::InvalidSize("chunk size must be positive".to_string()));
        }

        let total_chunks = total_size.div_ceil(chunk_size);
        if total_chunks > MAX_PARTS {
            return Err(RelayError::InvalidSize(format!(
                "{} bytes needs {} chunks of {} bytes, at most {} are allowed",
                total_size, total_chunks, chunk_size, MAX_PARTS
            )));
        }

        Ok(Self {
            total_size,
            chunk_size,
            total_chunks,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Byte range of chunk `index`, or `None` past the last chunk
    pub fn range(&self, index: u64) -> Option<ByteRange> {
        if index >= self.total_chunks {
            return None;
        }
        let start = index * self.chunk_size;
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        Some(ByteRange { start, end })
    }

    /// All chunk ranges in order
    pub fn ranges(&self) -> impl Iterator<Item = ByteRange> + '_ {
        (0..self.total_chunks).filter_map(move |i| self.range(i))
    }
}
