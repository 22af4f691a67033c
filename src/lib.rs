//! blobvault - chunked blob storage engine with a metadata catalog
//!
//! Persists arbitrarily large binary objects by splitting them into
//! fixed-size chunks keyed by `(file_id, sequence_number)`, reconstructs
//! them on read as an ordered byte stream, and keeps a catalog recording
//! each file's identity, name, size, upload time, and description.
//!
//! The crate exposes three layers:
//! - [`store::ChunkStore`] persists and retrieves individual chunks
//! - [`catalog::Catalog`] holds one record per logical file
//! - [`engine::BlobEngine`] orchestrates both, owning atomic visibility
//!   on upload, contiguity validation on download, and delete ordering
//!
//! HTTP transport, multipart parsing, and response shaping are the
//! caller's concern; the engine is consumed through plain upload /
//! download / list / delete calls.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod store;

pub use catalog::{Catalog, FileRecord, FileRecordRepository, NewFileRecord};
pub use config::Config;
pub use engine::{BlobEngine, Download, MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
pub use error::{Result, VaultError};
pub use store::{ChunkStore, ChunkStream, DirChunkStore, DEFAULT_CHUNK_SIZE};
