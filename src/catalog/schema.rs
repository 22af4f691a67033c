//! Catalog schema and migrations for blobvault.
//!
//! This module contains all catalog migrations that will be applied
//! sequentially when the catalog is first opened or upgraded.

/// Catalog migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: Initial schema - files table
    r#"
-- One record per logical uploaded file
CREATE TABLE files (
    id           TEXT PRIMARY KEY,        -- UUID, generated at upload time
    name         TEXT NOT NULL,           -- caller-supplied, not unique
    size_bytes   INTEGER NOT NULL,        -- exact byte length of the content
    description  TEXT,
    uploaded_at  TEXT NOT NULL            -- RFC 3339, set once at creation
);

CREATE INDEX idx_files_uploaded_at ON files(uploaded_at);
"#,
    // v2: Add content checksum column
    r#"
ALTER TABLE files ADD COLUMN checksum TEXT;
"#,
];
