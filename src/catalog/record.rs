//! File record types and repository for the blobvault catalog.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::Result;

/// Catalog entry describing one logical uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Unique file ID, generated at upload time.
    pub id: Uuid,
    /// Original filename (display name), not required unique.
    pub name: String,
    /// Exact byte length of the file content.
    pub size_bytes: i64,
    /// Free-form description, write-once at upload.
    pub description: Option<String>,
    /// Hex-encoded SHA-256 of the content.
    pub checksum: Option<String>,
    /// When the file was uploaded. Immutable after creation.
    pub uploaded_at: DateTime<Utc>,
}

/// Data for creating a new file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    /// Original filename (display name).
    pub name: String,
    /// Exact byte length of the file content.
    pub size_bytes: i64,
    /// Free-form description.
    pub description: Option<String>,
    /// Hex-encoded SHA-256 of the content.
    pub checksum: Option<String>,
}

impl NewFileRecord {
    /// Create a new NewFileRecord.
    pub fn new(name: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            description: None,
            checksum: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the content checksum.
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// Repository for file record operations.
pub struct FileRecordRepository;

impl FileRecordRepository {
    /// Create a new file record under the caller-supplied id.
    ///
    /// The engine generates the id (the same one its chunks are keyed by)
    /// before any chunk write; only the upload timestamp is generated
    /// here. The insert is observed as a whole by every other connection,
    /// so a file becomes visible to `get`/`list_all` only once this
    /// returns.
    pub fn create(conn: &Connection, id: Uuid, new: &NewFileRecord) -> Result<FileRecord> {
        let uploaded_at = Utc::now();

        conn.execute(
            "INSERT INTO files (id, name, size_bytes, description, checksum, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                new.name,
                new.size_bytes,
                new.description,
                new.checksum,
                uploaded_at.to_rfc3339(),
            ],
        )?;

        Ok(FileRecord {
            id,
            name: new.name.clone(),
            size_bytes: new.size_bytes,
            description: new.description.clone(),
            checksum: new.checksum.clone(),
            uploaded_at,
        })
    }

    /// Get a file record by ID.
    pub fn get(conn: &Connection, id: Uuid) -> Result<Option<FileRecord>> {
        let record = conn
            .query_row(
                "SELECT id, name, size_bytes, description, checksum, uploaded_at
                 FROM files WHERE id = ?1",
                [id.to_string()],
                Self::map_row,
            )
            .optional()?;

        Ok(record)
    }

    /// List all file records, newest first.
    pub fn list_all(conn: &Connection) -> Result<Vec<FileRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, size_bytes, description, checksum, uploaded_at
             FROM files ORDER BY uploaded_at DESC, id",
        )?;

        let records: Vec<FileRecord> = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    /// Delete a file record by ID.
    ///
    /// Returns `true` if a record was removed. Does not touch chunks.
    pub fn delete(conn: &Connection, id: Uuid) -> Result<bool> {
        let rows = conn.execute("DELETE FROM files WHERE id = ?1", [id.to_string()])?;
        Ok(rows > 0)
    }

    /// Count all file records.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Map a catalog row to a FileRecord.
    fn map_row(row: &Row) -> rusqlite::Result<FileRecord> {
        let id_str: String = row.get(0)?;
        let uploaded_at_str: String = row.get(5)?;

        Ok(FileRecord {
            id: Uuid::parse_str(&id_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            name: row.get(1)?,
            size_bytes: row.get(2)?,
            description: row.get(3)?,
            checksum: row.get(4)?,
            uploaded_at: DateTime::parse_from_rfc3339(&uploaded_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
