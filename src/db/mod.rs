use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{Result, AccordError};

pub mod migrate;

/// Database connection wrapper
///
/// Holds only the path; every call opens its own connection on a blocking
/// thread, so the wrapper is cheap to clone and share between tools.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    read_only: bool,
}

impl Db {
    /// Create a new read-write database connection manager
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            read_only: false,
        }
    }

    /// Create a connection manager that never writes (used for the SQL tool)
    pub fn read_only<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            read_only: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        let read_only = self.read_only;
        task::spawn_blocking(move || {
            let mut conn = open(&path, read_only)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| AccordError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("database task failed: {}", e),
        )))?
    }
}

fn open(path: &Path, read_only: bool) -> Result<Connection> {
    if read_only {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA query_only = ON;")?;
        return Ok(conn);
    }

    let conn = Connection::open(path)?;

    // WAL for crash safety between batches, NORMAL sync for speed
    conn.execute_batch(
        "PRAGMA journal_mode = WAL; \
         PRAGMA synchronous = NORMAL; \
         PRAGMA foreign_keys = ON; \
         PRAGMA temp_store = MEMORY;"
    )?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_db_connection() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Db::new(&db_path);

        let result = db.with_connection(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])?;
            Ok(())
        }).await;

        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_pragmas_set() {
        let temp_dir = TempDir::new().unwrap();
        let db = Db::new(temp_dir.path().join("test.db"));

        db.with_connection(|conn| {
            let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
            assert_eq!(journal_mode.to_uppercase(), "WAL");
            Ok::<(), AccordError>(())
        }).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("ro.db");
        Db::new(&db_path)
            .with_connection(|conn| {
                conn.execute("CREATE TABLE t (id INTEGER)", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let result = Db::read_only(&db_path)
            .with_connection(|conn| {
                conn.execute("INSERT INTO t (id) VALUES (1)", [])?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AccordError::Database(_))));
    }

    #[tokio::test]
    async fn test_read_only_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Db::read_only(temp_dir.path().join("absent.db"))
            .with_connection(|_conn| Ok(()))
            .await;
        assert!(result.is_err());
    }
}
