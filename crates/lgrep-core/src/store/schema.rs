//! Database schema and migrations

use crate::error::{LgrepError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS stores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL,
    root_path TEXT NOT NULL,
    embedding_provider TEXT NOT NULL,
    embedding_model TEXT NOT NULL,
    embedding_dimensions INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_id INTEGER NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    external_id TEXT NOT NULL,
    path TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    hash TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    indexed_at TEXT NOT NULL,
    UNIQUE(store_id, external_id)
);

CREATE INDEX IF NOT EXISTS idx_files_store_id ON files(store_id);
CREATE INDEX IF NOT EXISTS idx_files_hash ON files(store_id, hash);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    UNIQUE(file_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_chunks_file_id ON chunks(file_id);
"#;

/// Handle to the on-disk index. All operations lock the single
/// connection; multi-statement mutations run in one transaction.
pub struct SqliteStore {
    pub(crate) conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and initialize) the database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;

        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Consume the handle and close the underlying connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| LgrepError::Store("store lock poisoned".to_string()))?;
        conn.close().map_err(|(_, e)| e.into())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LgrepError::Store("store lock poisoned".to_string()))
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or(None)
            .unwrap_or(0);

        if version >= SCHEMA_VERSION {
            tracing::debug!(version, "schema is up to date");
            return Ok(());
        }

        tracing::debug!(from = version, to = SCHEMA_VERSION, "migrating schema");

        if version < 1 {
            conn.execute_batch(CREATE_TABLES)
                .map_err(|e| LgrepError::Store(format!("failed to migrate to v1: {}", e)))?;
        }

        // Vector table is created when the first store pins its
        // dimensions; see ensure_vector_index.

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    /// Current schema version, if initialized.
    pub fn schema_version(&self) -> Result<Option<i32>> {
        let conn = self.lock()?;
        let version = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Ensure the vector side-table exists for `dimensions`-wide
    /// embeddings. A mismatch with the pinned width is refused.
    pub(crate) fn ensure_vector_index(conn: &Connection, dimensions: usize) -> Result<()> {
        let existing: Option<i64> = conn
            .query_row("SELECT dimensions FROM vector_meta LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()
            .unwrap_or(None);

        match existing {
            Some(width) if width as usize != dimensions => Err(LgrepError::InvalidInput(format!(
                "vector index is pinned to {} dimensions, store requires {}",
                width, dimensions
            ))),
            Some(_) => Ok(()),
            None => {
                tracing::debug!(dimensions, "creating vector index");
                conn.execute_batch(
                    "CREATE TABLE IF NOT EXISTS chunk_vectors (
                        chunk_id INTEGER PRIMARY KEY,
                        embedding BLOB NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS vector_meta (
                        dimensions INTEGER NOT NULL
                    );",
                )?;
                conn.execute(
                    "INSERT INTO vector_meta (dimensions) VALUES (?1)",
                    params![dimensions as i64],
                )?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_open_on_disk_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/index.db");
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), Some(SCHEMA_VERSION));
        store.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_initialize_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.close().unwrap();
        }
        // Re-opening runs initialize again on the same file
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_vector_index_dimension_pinning() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock().unwrap();
        SqliteStore::ensure_vector_index(&conn, 4).unwrap();
        // Same width is fine
        SqliteStore::ensure_vector_index(&conn, 4).unwrap();
        // Different width is refused
        let err = SqliteStore::ensure_vector_index(&conn, 8).unwrap_err();
        assert!(matches!(err, LgrepError::InvalidInput(_)));
    }
}
