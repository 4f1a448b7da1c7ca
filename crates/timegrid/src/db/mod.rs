//! SQLite persistence for jobs and timetable artifacts.
//!
//! One rusqlite connection per process, shared behind a [`Database`]
//! handle. Workers, orchestrator and repos all go through
//! [`Database::with_conn`], which serializes access with a mutex.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod timetable_repo;

pub use error::DatabaseError;

/// Cloneable handle to the single SQLite connection. The mutex is the
/// only coordination the pipeline needs: every job mutation is one
/// statement, and SQLite serializes writers anyway. WAL keeps readers
/// off the write lock.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database file, applies the connection
    /// pragmas and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             PRAGMA foreign_keys=ON;",
        )?;
        migrations::run_all(&conn)?;

        log::info!("Database opened at {}", path.display());
        Ok(Self::wrap(conn))
    }

    /// In-memory database with the full schema, for tests and throwaway
    /// embedding.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_all(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration_count(db: &Database) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn test_open_in_memory_applies_schema() {
        let db = Database::open_in_memory().unwrap();
        assert!(migration_count(&db) > 0);
    }

    #[test]
    fn test_open_creates_file_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("timegrid.db");
        let db = Database::open(&path).unwrap();
        assert!(migration_count(&db) > 0);
        assert!(path.exists());
    }

    #[test]
    fn test_clones_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let db2 = db.clone();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO solver_jobs (id, name, requested_by, department_id, semester,
                 academic_year, config, input_snapshot, payload, created_at, updated_at)
                 VALUES ('t1', 'n', 'u1', 'd1', 1, '2026-27', '{}', '{}', '{}',
                 '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        db2.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM solver_jobs", [], |r| r.get(0))?;
            assert_eq!(count, 1);
            Ok(())
        })
        .unwrap();
    }
}
