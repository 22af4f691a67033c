//! Chunk storage for blobvault.
//!
//! A chunk is one bounded-length slice of a file's byte content, stored
//! and retrieved independently, keyed by `(file_id, sequence_number)`.
//! The [`ChunkStore`] trait abstracts the backend so any key-value or
//! file-based store can implement it; [`DirChunkStore`] is the concrete
//! filesystem backend.

mod dir;

pub use dir::DirChunkStore;

use std::sync::Arc;

use uuid::Uuid;

use crate::Result;

/// Default chunk payload size: 256 KiB.
///
/// All components writing and reading one store must agree on this value;
/// sequence numbering and last-chunk-length validation depend on it.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Storage backend for fixed-size binary chunks.
///
/// The store owns no knowledge of files as a whole: it does not validate
/// that a file record exists for `file_id`, and completeness of a chunk
/// set is the engine's concern.
pub trait ChunkStore: Send + Sync {
    /// Write one chunk. Overwriting the same key is permitted (last write
    /// wins), though the engine never relies on overwrite semantics.
    fn put_chunk(&self, file_id: Uuid, sequence: u32, payload: &[u8]) -> Result<()>;

    /// List the stored sequence numbers for a file, ascending.
    ///
    /// Fails with `NotFound` if zero chunks exist for `file_id`.
    fn sequence_numbers(&self, file_id: Uuid) -> Result<Vec<u32>>;

    /// Read one chunk's payload.
    fn read_chunk(&self, file_id: Uuid, sequence: u32) -> Result<Vec<u8>>;

    /// Remove every chunk for a file, returning the count removed.
    ///
    /// Succeeds with count 0 if none exist. Any underlying I/O error
    /// aborts the removal and the file's chunk set must be treated as
    /// indeterminate.
    fn delete_all(&self, file_id: Uuid) -> Result<usize>;
}

/// Lazy, ordered sequence of chunk payloads for one file.
///
/// Each `next()` call performs at most one chunk read, so a whole file is
/// never buffered in memory. Dropping the stream early needs no cleanup.
pub struct ChunkStream {
    store: Arc<dyn ChunkStore>,
    file_id: Uuid,
    sequences: std::vec::IntoIter<u32>,
}

impl ChunkStream {
    /// Create a stream over the given sequence numbers, in order.
    pub fn new(store: Arc<dyn ChunkStore>, file_id: Uuid, sequences: Vec<u32>) -> Self {
        Self {
            store,
            file_id,
            sequences: sequences.into_iter(),
        }
    }

    /// Create a stream that yields nothing (an empty file).
    pub fn empty(store: Arc<dyn ChunkStore>, file_id: Uuid) -> Self {
        Self::new(store, file_id, Vec::new())
    }

    /// Number of chunks remaining.
    pub fn remaining(&self) -> usize {
        self.sequences.len()
    }
}

impl Iterator for ChunkStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let sequence = self.sequences.next()?;
        Some(self.store.read_chunk(self.file_id, sequence))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.sequences.size_hint()
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("file_id", &self.file_id)
            .field("remaining", &self.sequences.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_chunk_stream_yields_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn ChunkStore> =
            Arc::new(DirChunkStore::new(temp_dir.path()).unwrap());
        let file_id = Uuid::new_v4();

        store.put_chunk(file_id, 0, b"first").unwrap();
        store.put_chunk(file_id, 1, b"second").unwrap();
        store.put_chunk(file_id, 2, b"third").unwrap();

        let stream = ChunkStream::new(Arc::clone(&store), file_id, vec![0, 1, 2]);
        let chunks: Vec<Vec<u8>> = stream.collect::<Result<_>>().unwrap();

        assert_eq!(chunks, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn test_chunk_stream_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn ChunkStore> =
            Arc::new(DirChunkStore::new(temp_dir.path()).unwrap());

        let mut stream = ChunkStream::empty(store, Uuid::new_v4());

        assert_eq!(stream.remaining(), 0);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_chunk_stream_remaining_counts_down() {
        let temp_dir = TempDir::new().unwrap();
        let store: Arc<dyn ChunkStore> =
            Arc::new(DirChunkStore::new(temp_dir.path()).unwrap());
        let file_id = Uuid::new_v4();

        store.put_chunk(file_id, 0, b"a").unwrap();
        store.put_chunk(file_id, 1, b"b").unwrap();

        let mut stream = ChunkStream::new(store, file_id, vec![0, 1]);
        assert_eq!(stream.remaining(), 2);
        stream.next().unwrap().unwrap();
        assert_eq!(stream.remaining(), 1);
    }
}
