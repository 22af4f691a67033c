//! Blob engine for blobvault.
//!
//! This module orchestrates the chunk store and the metadata catalog to
//! provide whole-file operations:
//! - Upload: stream in, chunks out, catalog record committed last
//! - Download: catalog lookup, then a lazy ordered chunk stream
//! - Listing and deletion
//!
//! The engine is the only component that creates or destroys file records,
//! and the only layer that interprets storage failures into the richer
//! error taxonomy (`UploadFailed`, `CorruptFile`, `PartialDelete`).

use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, FileRecord, FileRecordRepository, NewFileRecord};
use crate::config::Config;
use crate::store::{ChunkStore, ChunkStream, DirChunkStore};
use crate::{Result, VaultError};

/// Maximum length for a file name (in characters).
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum length for a file description (in characters).
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Result of a file download: the catalog record (whose `name` the caller
/// uses as a content disposition) and the lazy ordered chunk stream.
#[derive(Debug)]
pub struct Download {
    /// File metadata.
    pub record: FileRecord,
    /// Ordered chunk payloads; reads one chunk per step.
    pub stream: ChunkStream,
}

/// Chunked blob storage engine.
///
/// Shareable across threads via `Arc`; concurrent operations on different
/// files never interact, and per-file safety relies on operation ordering
/// rather than mutual exclusion (the catalog serializes individual
/// create/get/delete calls, nothing more).
pub struct BlobEngine {
    catalog: Mutex<Catalog>,
    store: Arc<dyn ChunkStore>,
    chunk_size: usize,
}

impl BlobEngine {
    /// Create an engine from an opened catalog and chunk store.
    pub fn new(catalog: Catalog, store: Arc<dyn ChunkStore>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(VaultError::Validation(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            catalog: Mutex::new(catalog),
            store,
            chunk_size,
        })
    }

    /// Open the catalog and chunk store described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let catalog = Catalog::open(&config.catalog.path)?;
        let store = DirChunkStore::new(&config.storage.chunk_root)?;

        Self::new(catalog, Arc::new(store), config.storage.chunk_size_bytes)
    }

    /// The configured chunk payload size in bytes.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn catalog(&self) -> Result<MutexGuard<'_, Catalog>> {
        self.catalog
            .lock()
            .map_err(|_| VaultError::Storage("catalog lock poisoned".to_string()))
    }

    /// Upload a file from a byte stream.
    ///
    /// The stream is consumed in chunk-size windows; each window is written
    /// to the chunk store while the total byte count and a SHA-256 digest
    /// accumulate. The catalog record is created only after the stream is
    /// exhausted, so no `get`/`list` caller can observe the file before its
    /// chunk set is complete.
    ///
    /// An empty stream is a valid upload: zero chunks, size 0.
    ///
    /// If any read or chunk write fails, already-written chunks are removed
    /// best-effort and the operation fails with `UploadFailed` wrapping the
    /// cause.
    pub fn upload(
        &self,
        mut reader: impl Read,
        name: &str,
        description: Option<&str>,
    ) -> Result<FileRecord> {
        if name.is_empty() {
            return Err(VaultError::Validation("file name is empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(VaultError::Validation(format!(
                "file name exceeds {MAX_NAME_LENGTH} characters"
            )));
        }
        if let Some(desc) = description {
            if desc.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(VaultError::Validation(format!(
                    "description exceeds {MAX_DESCRIPTION_LENGTH} characters"
                )));
            }
        }

        let id = Uuid::new_v4();
        let mut window = vec![0u8; self.chunk_size];
        let mut hasher = Sha256::new();
        let mut total_bytes: u64 = 0;
        let mut sequence: u32 = 0;

        // Receiving: one window per chunk, short window only as the last
        loop {
            let filled = match read_window(&mut reader, &mut window) {
                Ok(filled) => filled,
                Err(e) => return Err(self.abort_upload(id, sequence, e.into())),
            };
            if filled == 0 {
                break;
            }

            let payload = &window[..filled];
            if let Err(e) = self.store.put_chunk(id, sequence, payload) {
                return Err(self.abort_upload(id, sequence, e));
            }

            hasher.update(payload);
            total_bytes += filled as u64;
            sequence += 1;
        }

        // Committing: the record insert is the point of atomic visibility
        let checksum = format!("{:x}", hasher.finalize());
        let new = match description {
            Some(desc) => NewFileRecord::new(name, total_bytes as i64)
                .with_description(desc)
                .with_checksum(checksum),
            None => NewFileRecord::new(name, total_bytes as i64).with_checksum(checksum),
        };

        let record = {
            let catalog = self.catalog()?;
            // Same id the chunks were written under
            match FileRecordRepository::create(catalog.conn(), id, &new) {
                Ok(record) => record,
                Err(e) => return Err(self.abort_upload(id, sequence, e)),
            }
        };

        info!(
            "Uploaded file {} ({} bytes in {} chunks)",
            record.id, total_bytes, sequence
        );

        Ok(record)
    }

    /// Best-effort rollback of a failed upload.
    ///
    /// Cleanup failure leaves orphaned chunks, an accepted degraded state;
    /// it is logged, not re-raised.
    fn abort_upload(&self, id: Uuid, chunks_written: u32, cause: VaultError) -> VaultError {
        warn!("Upload of file {} aborted: {}", id, cause);

        if chunks_written > 0 {
            match self.store.delete_all(id) {
                Ok(removed) => debug!("Rolled back {} chunks of file {}", removed, id),
                Err(e) => warn!("Rollback of file {} left orphaned chunks: {}", id, e),
            }
        }

        VaultError::UploadFailed {
            source: Box::new(cause),
        }
    }

    /// Download a file as a lazy ordered chunk stream.
    ///
    /// Fails with `NotFound` if the id has no catalog record, and with
    /// `CorruptFile` if the record exists but the stored chunk set is
    /// empty, non-contiguous, or the wrong length for the recorded size.
    pub fn download(&self, id: Uuid) -> Result<Download> {
        let record = self.get(id)?;

        if record.size_bytes == 0 {
            return Ok(Download {
                stream: ChunkStream::empty(Arc::clone(&self.store), id),
                record,
            });
        }

        let sequences = match self.store.sequence_numbers(id) {
            Ok(sequences) => sequences,
            Err(VaultError::NotFound(_)) => {
                return Err(VaultError::CorruptFile {
                    id: id.to_string(),
                    reason: "catalog record exists but no chunks are stored".to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let expected = chunk_count(record.size_bytes as u64, self.chunk_size);
        if sequences.len() as u64 != expected {
            return Err(VaultError::CorruptFile {
                id: id.to_string(),
                reason: format!("expected {} chunks, found {}", expected, sequences.len()),
            });
        }
        for (i, &sequence) in sequences.iter().enumerate() {
            if sequence as usize != i {
                return Err(VaultError::CorruptFile {
                    id: id.to_string(),
                    reason: format!("chunk sequence gap at {i} (found {sequence})"),
                });
            }
        }

        debug!("Streaming file {} ({} chunks)", id, sequences.len());

        Ok(Download {
            stream: ChunkStream::new(Arc::clone(&self.store), id, sequences),
            record,
        })
    }

    /// Get a file's metadata without its content.
    pub fn get(&self, id: Uuid) -> Result<FileRecord> {
        let catalog = self.catalog()?;
        FileRecordRepository::get(catalog.conn(), id)?
            .ok_or_else(|| VaultError::NotFound(id.to_string()))
    }

    /// List all files, newest first.
    pub fn list(&self) -> Result<Vec<FileRecord>> {
        let catalog = self.catalog()?;
        FileRecordRepository::list_all(catalog.conn())
    }

    /// Delete a file and all of its chunks.
    ///
    /// The catalog record is removed first, so a reader starting after this
    /// point sees `NotFound` immediately instead of racing into missing
    /// chunks; a reader that already resolved the record may still finish
    /// its chunk reads (snapshot semantics). If chunk removal then fails,
    /// the chunks are orphaned and the error surfaces as `PartialDelete`.
    ///
    /// Returns the number of chunks removed.
    pub fn delete(&self, id: Uuid) -> Result<usize> {
        {
            let catalog = self.catalog()?;
            let deleted = FileRecordRepository::delete(catalog.conn(), id)?;
            if !deleted {
                return Err(VaultError::NotFound(id.to_string()));
            }
        }

        match self.store.delete_all(id) {
            Ok(removed) => {
                info!("Deleted file {} ({} chunks)", id, removed);
                Ok(removed)
            }
            Err(e) => {
                warn!("Chunk removal failed for deleted file {}: {}", id, e);
                Err(VaultError::PartialDelete {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for BlobEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobEngine")
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Number of chunks a file of `size_bytes` occupies (0 iff the file is empty).
fn chunk_count(size_bytes: u64, chunk_size: usize) -> u64 {
    size_bytes.div_ceil(chunk_size as u64)
}

/// Fill `window` from the reader, short only at end-of-stream.
///
/// Returns the number of bytes read, 0 at end-of-stream.
fn read_window(reader: &mut impl Read, window: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < window.len() {
        match reader.read(&mut window[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Tiny chunk size so multi-chunk paths are cheap to exercise.
    const TEST_CHUNK_SIZE: usize = 8;

    fn setup() -> (TempDir, DirChunkStore, BlobEngine) {
        let temp_dir = TempDir::new().unwrap();
        let store = DirChunkStore::new(temp_dir.path()).unwrap();
        let catalog = Catalog::open_in_memory().unwrap();
        let engine =
            BlobEngine::new(catalog, Arc::new(store.clone()), TEST_CHUNK_SIZE).unwrap();
        (temp_dir, store, engine)
    }

    fn collect(download: Download) -> Vec<u8> {
        let mut bytes = Vec::new();
        for chunk in download.stream {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        bytes
    }

    #[test]
    fn test_upload_download_roundtrip() {
        let (_temp_dir, _store, engine) = setup();
        let content = b"The quick brown fox jumps over the lazy dog".to_vec();

        let record = engine
            .upload(content.as_slice(), "fox.txt", Some("a pangram"))
            .unwrap();

        assert_eq!(record.name, "fox.txt");
        assert_eq!(record.size_bytes, content.len() as i64);
        assert_eq!(record.description, Some("a pangram".to_string()));

        let download = engine.download(record.id).unwrap();
        assert_eq!(download.record.name, "fox.txt");
        assert_eq!(collect(download), content);
    }

    #[test]
    fn test_returned_id_owns_the_chunks() {
        let (_temp_dir, store, engine) = setup();

        let record = engine
            .upload(&vec![2u8; TEST_CHUNK_SIZE + 1][..], "owned.bin", None)
            .unwrap();

        // The id handed back to the caller keys the stored chunks directly
        assert_eq!(store.sequence_numbers(record.id).unwrap(), vec![0, 1]);
        assert_eq!(engine.get(record.id).unwrap().id, record.id);

        let removed = engine.delete(record.id).unwrap();
        assert_eq!(removed, 2);
        assert!(matches!(
            store.sequence_numbers(record.id),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_upload_empty_stream_is_valid() {
        let (_temp_dir, store, engine) = setup();

        let record = engine.upload(std::io::empty(), "empty.bin", None).unwrap();

        assert_eq!(record.size_bytes, 0);

        // Zero chunks stored
        assert!(matches!(
            store.sequence_numbers(record.id),
            Err(VaultError::NotFound(_))
        ));

        let download = engine.download(record.id).unwrap();
        assert!(collect(download).is_empty());
    }

    #[test]
    fn test_upload_exact_chunk_multiple() {
        let (_temp_dir, store, engine) = setup();
        // Exactly 3 full windows, no short last chunk
        let content = vec![7u8; TEST_CHUNK_SIZE * 3];

        let record = engine.upload(content.as_slice(), "exact.bin", None).unwrap();

        assert_eq!(store.sequence_numbers(record.id).unwrap(), vec![0, 1, 2]);
        assert_eq!(collect(engine.download(record.id).unwrap()), content);
    }

    #[test]
    fn test_upload_short_last_chunk() {
        let (_temp_dir, store, engine) = setup();
        let content = vec![1u8; TEST_CHUNK_SIZE + 3];

        let record = engine.upload(content.as_slice(), "short.bin", None).unwrap();

        assert_eq!(store.sequence_numbers(record.id).unwrap(), vec![0, 1]);
        assert_eq!(store.read_chunk(record.id, 0).unwrap().len(), TEST_CHUNK_SIZE);
        assert_eq!(store.read_chunk(record.id, 1).unwrap().len(), 3);
    }

    #[test]
    fn test_upload_records_checksum() {
        let (_temp_dir, _store, engine) = setup();

        let record = engine.upload(&b"hello"[..], "hello.txt", None).unwrap();

        // SHA-256 of "hello"
        assert_eq!(
            record.checksum.as_deref(),
            Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }

    #[test]
    fn test_upload_empty_name_rejected() {
        let (_temp_dir, _store, engine) = setup();

        let result = engine.upload(&b"data"[..], "", None);
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_upload_name_too_long() {
        let (_temp_dir, _store, engine) = setup();
        let long_name = "a".repeat(MAX_NAME_LENGTH + 1);

        let result = engine.upload(&b"data"[..], &long_name, None);
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_upload_description_too_long() {
        let (_temp_dir, _store, engine) = setup();
        let long_desc = "a".repeat(MAX_DESCRIPTION_LENGTH + 1);

        let result = engine.upload(&b"data"[..], "test.txt", Some(&long_desc));
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_upload_reader_failure_rolls_back() {
        let (_temp_dir, store, engine) = setup();

        struct FailingReader {
            yielded: bool,
        }

        impl Read for FailingReader {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.yielded {
                    Err(std::io::Error::other("stream interrupted"))
                } else {
                    self.yielded = true;
                    let n = buf.len().min(TEST_CHUNK_SIZE);
                    buf[..n].fill(9);
                    Ok(n)
                }
            }
        }

        let result = engine.upload(FailingReader { yielded: false }, "broken.bin", None);

        assert!(matches!(result, Err(VaultError::UploadFailed { .. })));

        // Nothing committed, nothing left behind
        assert!(engine.list().unwrap().is_empty());
        let leftover: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .flatten()
            .collect();
        assert!(leftover.is_empty());
    }

    #[test]
    fn test_download_not_found() {
        let (_temp_dir, _store, engine) = setup();

        let result = engine.download(Uuid::new_v4());
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_download_missing_chunks_is_corrupt() {
        let (_temp_dir, store, engine) = setup();

        let record = engine
            .upload(&vec![5u8; TEST_CHUNK_SIZE * 2][..], "damaged.bin", None)
            .unwrap();

        // Chunks vanish out from under the catalog record
        store.delete_all(record.id).unwrap();

        let result = engine.download(record.id);
        assert!(matches!(result, Err(VaultError::CorruptFile { .. })));
    }

    #[test]
    fn test_download_extra_chunk_is_corrupt() {
        let (_temp_dir, store, engine) = setup();

        let record = engine
            .upload(&vec![5u8; TEST_CHUNK_SIZE][..], "extra.bin", None)
            .unwrap();

        store.put_chunk(record.id, 7, b"stray").unwrap();

        let result = engine.download(record.id);
        assert!(matches!(result, Err(VaultError::CorruptFile { .. })));
    }

    #[test]
    fn test_get_metadata_only() {
        let (_temp_dir, _store, engine) = setup();

        let record = engine.upload(&b"data"[..], "info.txt", Some("meta")).unwrap();

        let found = engine.get(record.id).unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.name, "info.txt");
        assert_eq!(found.description, Some("meta".to_string()));
    }

    #[test]
    fn test_get_not_found() {
        let (_temp_dir, _store, engine) = setup();

        let result = engine.get(Uuid::new_v4());
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_list_files() {
        let (_temp_dir, _store, engine) = setup();

        engine.upload(&b"1"[..], "one.txt", None).unwrap();
        engine.upload(&b"22"[..], "two.txt", None).unwrap();

        let records = engine.list().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_delete_removes_record_and_chunks() {
        let (_temp_dir, store, engine) = setup();

        let record = engine
            .upload(&vec![3u8; TEST_CHUNK_SIZE * 2 + 1][..], "gone.bin", None)
            .unwrap();

        let removed = engine.delete(record.id).unwrap();
        assert_eq!(removed, 3);

        assert!(matches!(engine.get(record.id), Err(VaultError::NotFound(_))));
        assert!(matches!(
            engine.download(record.id),
            Err(VaultError::NotFound(_))
        ));
        assert!(engine.list().unwrap().is_empty());
        assert!(matches!(
            store.sequence_numbers(record.id),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_not_found() {
        let (_temp_dir, _store, engine) = setup();

        let result = engine.delete(Uuid::new_v4());
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_delete_empty_file() {
        let (_temp_dir, _store, engine) = setup();

        let record = engine.upload(std::io::empty(), "empty.bin", None).unwrap();

        let removed = engine.delete(record.id).unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let catalog = Catalog::open_in_memory().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let store = DirChunkStore::new(temp_dir.path()).unwrap();

        let result = BlobEngine::new(catalog, Arc::new(store), 0);
        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let toml = format!(
            r#"
[storage]
chunk_root = "{root}"
chunk_size_bytes = 16

[catalog]
path = "{db}"
"#,
            root = temp_dir.path().join("chunks").display(),
            db = temp_dir.path().join("catalog.db").display(),
        );
        let config = Config::parse(&toml).unwrap();

        let engine = BlobEngine::from_config(&config).unwrap();
        assert_eq!(engine.chunk_size(), 16);

        let record = engine.upload(&b"configured"[..], "c.txt", None).unwrap();
        assert_eq!(collect(engine.download(record.id).unwrap()), b"configured");
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0, 256), 0);
        assert_eq!(chunk_count(1, 256), 1);
        assert_eq!(chunk_count(256, 256), 1);
        assert_eq!(chunk_count(257, 256), 2);
        assert_eq!(chunk_count(614400, 256 * 1024), 3);
    }

    #[test]
    fn test_read_window_handles_partial_reads() {
        // A reader that yields one byte at a time
        struct Trickle(Vec<u8>);

        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() || buf.is_empty() {
                    return Ok(0);
                }
                buf[0] = self.0.remove(0);
                Ok(1)
            }
        }

        let mut reader = Trickle(vec![1, 2, 3, 4, 5]);
        let mut window = [0u8; 4];

        assert_eq!(read_window(&mut reader, &mut window).unwrap(), 4);
        assert_eq!(window, [1, 2, 3, 4]);
        assert_eq!(read_window(&mut reader, &mut window).unwrap(), 1);
        assert_eq!(window[0], 5);
        assert_eq!(read_window(&mut reader, &mut window).unwrap(), 0);
    }
}
