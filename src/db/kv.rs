//! SQLite-backed session store

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::KvError;
use crate::kv::{KvStore, Versioned};

/// Session store persisted in the `kv_entries` table
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, KvError> {
        let row = sqlx::query_as::<_, (Vec<u8>, i64)>(
            "SELECT value, version FROM kv_entries WHERE key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value, version)| Versioned { value, version }))
    }

    async fn insert_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool, KvError> {
        let result = sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, version)
            VALUES (?, ?, 1)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_if_version(
        &self,
        key: &str,
        value: Vec<u8>,
        version: i64,
    ) -> Result<bool, KvError> {
        let result = sqlx::query(
            r#"
            UPDATE kv_entries
            SET value = ?, version = version + 1, updated_at = datetime('now')
            WHERE key = ? AND version = ?
            "#,
        )
        .bind(value)
        .bind(key)
        .bind(version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_if_matches(
        &self,
        key: &str,
        expected: &[u8],
        version: i64,
    ) -> Result<bool, KvError> {
        let result =
            sqlx::query("DELETE FROM kv_entries WHERE key = ? AND value = ? AND version = ?")
                .bind(key)
                .bind(expected)
                .bind(version)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }
}
