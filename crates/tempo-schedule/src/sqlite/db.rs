//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex. Configures WAL mode and
//! foreign keys on open, then runs pending migrations.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;

use super::migrations;

/// SQLite database shared by the repository types.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file, creating parent directories.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| StoreError::Unavailable(format!("Failed to set pragmas: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("Failed to open in-memory db: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| StoreError::Unavailable(format!("Failed to set pragmas: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run a closure against the connection while holding the lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Poisoned(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM meetings", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_database_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tempo.db");
        let _db = Database::new(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(&dir.path().join("wal.db")).unwrap();
        let mode: String = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
