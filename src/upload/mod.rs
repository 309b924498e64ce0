//! Chunked Relay Module
//!
//! Copies a remote file into object storage one byte range at a time:
//! - A session is created from the source's declared size and split into
//!   fixed-size chunks
//! - Each chunk is fetched with an HTTP range request and uploaded as one
//!   multipart part, in any order and any number of times
//! - Once every chunk is in, a progress check completes the upload
//!
//! Protocol Flow:
//! 1. `GET /?url=` probes the source and starts the (single) active session
//! 2. `GET /upload?session=&chunk=&folder=` relays one chunk
//! 3. `GET /progress?session=` reports progress and completes when ready
//! 4. `GET /clear?session=` aborts leftovers and frees the active slot

pub mod completion;
pub mod naming;
pub mod plan;
pub mod registry;
pub mod relay;
pub mod service;
pub mod session;
pub mod types;

pub use naming::{derive_filename, destination_key, normalize_folder};
pub use plan::{ByteRange, ChunkPlan, MAX_PARTS};
pub use registry::ActiveSessionRegistry;
pub use relay::part_number_for;
pub use service::UploadService;
pub use session::SessionManager;
pub use types::*;
