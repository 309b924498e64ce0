//! In-process session store

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{KvStore, Versioned};
use crate::error::KvError;

/// Session store kept in process memory
///
/// Sessions do not survive a restart. Selected with `DATABASE_URL=memory`.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Versioned>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, KvError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn insert_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, KvError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Versioned { value, version: 1 });
        Ok(true)
    }

    async fn replace_if_version(
        &self,
        key: &str,
        value: Vec<u8>,
        version: i64,
    ) -> Result<bool, KvError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.version == version => {
                entry.value = value;
                entry.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn delete_if_matches(
        &self,
        key: &str,
        expected: &[u8],
        version: i64,
    ) -> Result<bool, KvError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.version == version && entry.value == expected => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_if_absent_refuses_overwrite() {
        let store = MemoryKvStore::new();

        assert!(store.insert_if_absent("k", b"one".to_vec()).await.unwrap());
        assert!(!store.insert_if_absent("k", b"two".to_vec()).await.unwrap());

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, b"one");
        assert_eq!(entry.version, 1);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let store = MemoryKvStore::new();
        store.insert_if_absent("k", b"v1".to_vec()).await.unwrap();

        assert!(store.replace_if_version("k", b"v2".to_vec(), 1).await.unwrap());
        // A writer still holding version 1 loses
        assert!(!store.replace_if_version("k", b"v3".to_vec(), 1).await.unwrap());

        let entry = store.get("k").await.unwrap().unwrap();
        assert_eq!(entry.value, b"v2");
        assert_eq!(entry.version, 2);
    }

    #[tokio::test]
    async fn test_conditional_delete() {
        let store = MemoryKvStore::new();
        store.insert_if_absent("k", b"v".to_vec()).await.unwrap();

        assert!(!store.delete_if_matches("k", b"v", 7).await.unwrap());
        assert!(!store.delete_if_matches("k", b"other", 1).await.unwrap());
        assert!(store.delete_if_matches("k", b"v", 1).await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());

        // Re-inserted key starts over at version 1; a stale delete still loses
        store.insert_if_absent("k", b"w".to_vec()).await.unwrap();
        assert!(!store.delete_if_matches("k", b"v", 1).await.unwrap());
        assert!(store.get("k").await.unwrap().is_some());

        // Unconditional delete of a missing key is fine
        store.delete("k").await.unwrap();
    }
}
