//! Filesystem chunk store for blobvault.
//!
//! Chunks are stored one file per chunk in a directory per owning file:
//!
//! ```text
//! {root}/
//! ├── ab/
//! │   └── ab12cd34-5678-90ab-cdef-123456789012/
//! │       ├── 00000000.chunk
//! │       ├── 00000001.chunk
//! │       └── 00000002.chunk
//! └── ...
//! ```
//!
//! The shard directory is the first 2 characters of the file id, keeping
//! any single directory from growing unbounded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::ChunkStore;
use crate::{Result, VaultError};

const CHUNK_EXT: &str = "chunk";

/// Directory-per-file chunk store.
#[derive(Debug, Clone)]
pub struct DirChunkStore {
    /// Base directory for chunk storage.
    root: PathBuf,
}

impl DirChunkStore {
    /// Create a new DirChunkStore rooted at the given path.
    ///
    /// The root directory will be created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    /// Get the root path of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all chunks of one file: {root}/{shard}/{file_id}.
    fn file_dir(&self, file_id: Uuid) -> PathBuf {
        let id = file_id.to_string();
        self.root.join(&id[..2]).join(&id)
    }

    fn chunk_path(&self, file_id: Uuid, sequence: u32) -> PathBuf {
        self.file_dir(file_id)
            .join(format!("{sequence:08}.{CHUNK_EXT}"))
    }

    /// Parse a sequence number out of a chunk filename.
    fn parse_sequence(path: &Path) -> Option<u32> {
        if path.extension().and_then(|s| s.to_str()) != Some(CHUNK_EXT) {
            return None;
        }
        path.file_stem()?.to_str()?.parse().ok()
    }
}

impl ChunkStore for DirChunkStore {
    fn put_chunk(&self, file_id: Uuid, sequence: u32, payload: &[u8]) -> Result<()> {
        let path = self.chunk_path(file_id, sequence);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, payload)?;
        debug!(
            "Wrote chunk {} of file {} ({} bytes)",
            sequence,
            file_id,
            payload.len()
        );

        Ok(())
    }

    fn sequence_numbers(&self, file_id: Uuid) -> Result<Vec<u32>> {
        let dir = self.file_dir(file_id);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound(file_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut sequences: Vec<u32> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if let Some(sequence) = Self::parse_sequence(&entry.path()) {
                sequences.push(sequence);
            }
        }

        if sequences.is_empty() {
            return Err(VaultError::NotFound(file_id.to_string()));
        }

        sequences.sort_unstable();
        Ok(sequences)
    }

    fn read_chunk(&self, file_id: Uuid, sequence: u32) -> Result<Vec<u8>> {
        let path = self.chunk_path(file_id, sequence);

        match fs::read(&path) {
            Ok(payload) => Ok(payload),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(VaultError::Storage(format!(
                "chunk {sequence} of file {file_id} is missing"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_all(&self, file_id: Uuid) -> Result<usize> {
        let dir = self.file_dir(file_id);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let count = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| Self::parse_sequence(&entry.path()).is_some())
            .count();

        fs::remove_dir_all(&dir)?;
        debug!("Removed {} chunks of file {}", count, file_id);

        // Drop the shard directory too if this was its last file
        if let Some(shard) = dir.parent() {
            if let Ok(mut shard_entries) = fs::read_dir(shard) {
                if shard_entries.next().is_none() && fs::remove_dir(shard).is_err() {
                    warn!("Could not remove empty shard directory {:?}", shard);
                }
            }
        }

        Ok(count)
    }
}
