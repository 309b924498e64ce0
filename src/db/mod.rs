//! Database module for SQLite persistence
//!
//! Backs the session store with a single versioned key-value table.

mod kv;
mod schema;

pub use kv::SqliteKvStore;
pub use schema::initialize_schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::KvError;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, KvError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Run migrations
    initialize_schema(&pool).await?;

    Ok(pool)
}
