//! Chunk Relay Library
//!
//! Relays large files from an HTTP source into S3-compatible object storage
//! through resumable multipart uploads. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `upload`: Sessions, chunk relaying and completion
//! - `source`: Range requests against the source server
//! - `storage`: Multipart uploads against object storage
//! - `kv`: Versioned key-value store holding session state

pub mod config;
pub mod db;
pub mod error;
pub mod kv;
pub mod routes;
pub mod source;
pub mod state;
pub mod storage;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;
