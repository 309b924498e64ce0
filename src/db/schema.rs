//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::KvError;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), KvError> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Session records and the active-session pointer
CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
