//! Metadata catalog for blobvault.
//!
//! This module provides SQLite-backed catalog connectivity and migration
//! management, plus the file record repository.

mod record;
mod schema;

pub use record::{FileRecord, FileRecordRepository, NewFileRecord};
pub use schema::MIGRATIONS;

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::Result;

/// Catalog wrapper for managing SQLite connections and migrations.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open a catalog at the specified path.
    ///
    /// If the catalog file doesn't exist, it will be created.
    /// Migrations are automatically applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening catalog at {:?}", path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;

        let mut catalog = Self { conn };
        catalog.migrate()?;

        Ok(catalog)
    }

    /// Open an in-memory catalog for testing.
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory catalog");
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;

        let mut catalog = Self { conn };
        catalog.migrate()?;

        Ok(catalog)
    }

    /// Configure the connection with recommended settings.
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        // journal_mode and busy_timeout return their value, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        let _: i64 = conn.query_row("PRAGMA busy_timeout = 5000", [], |row| row.get(0))?;
        Ok(())
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> Result<i64> {
        let table_exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        Ok(version)
    }

    /// Apply pending migrations.
    pub fn migrate(&mut self) -> Result<()> {
        let current_version = self.schema_version()?;
        let migrations = MIGRATIONS;

        if current_version as usize >= migrations.len() {
            debug!("Catalog is up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating catalog from version {} to {}",
            current_version,
            migrations.len()
        );

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version     INTEGER PRIMARY KEY,
                applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        for (i, migration) in migrations.iter().enumerate().skip(current_version as usize) {
            let version = (i + 1) as i64;
            info!("Applying catalog migration v{}", version);

            let tx = self.conn.transaction()?;
            tx.execute_batch(migration)?;
            tx.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
            tx.commit()?;

            debug!("Catalog migration v{} applied", version);
        }

        Ok(())
    }

    /// Check if a table exists.
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish()
    }
}
