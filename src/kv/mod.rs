//! Key-value session store
//!
//! Durable mapping from string keys to opaque byte values. Every entry
//! carries a version counter so callers can do compare-and-set updates:
//! a write made with a stale version is refused instead of silently
//! overwriting a concurrent writer.

mod memory;

pub use memory::MemoryKvStore;

use async_trait::async_trait;

use crate::error::KvError;

/// A stored value together with its version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: i64,
}

/// Trait for session store backends
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a key
    async fn get(&self, key: &str) -> Result<Option<Versioned>, KvError>;

    /// Write a key only if it does not exist yet
    ///
    /// Returns `false` when the key was already present.
    async fn insert_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, KvError>;

    /// Replace a key only if its version is still `version`
    ///
    /// Returns `false` when the key is gone or was written in between.
    async fn replace_if_version(
        &self,
        key: &str,
        value: Vec<u8>,
        version: i64,
    ) -> Result<bool, KvError>;

    /// Delete a key unconditionally
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Delete a key only if it still holds `expected` at `version`
    ///
    /// Versions restart after a delete, so the value is checked as well.
    async fn delete_if_matches(
        &self,
        key: &str,
        expected: &[u8],
        version: i64,
    ) -> Result<bool, KvError>;
}
