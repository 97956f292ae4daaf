use crate::error::Error;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite-backed catalog. The connection sits behind a mutex so the store can
/// be shared with scanner workers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, Error> {
        let db = Database {
            conn: Mutex::new(conn),
        };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<(), Error> {
        self.connection()?.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode)");
        Ok(())
    }

    fn migrate_schema(&self) -> Result<(), Error> {
        let conn = self.connection()?;
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        conn.execute_batch(include_str!("schema.sql"))?;
        debug!("SQLite schema initialized (was version {})", version);
        Ok(())
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|e| Error::Other(format!("Failed to lock database: {}", e)))
    }

    pub fn truncate_all(&self) -> Result<(), Error> {
        self.connection()?.execute_batch(
            "DELETE FROM record;
             DELETE FROM owner;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
