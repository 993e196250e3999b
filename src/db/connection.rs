// src/db/connection.rs
//
// Database connection management
//
// PRINCIPLES:
// - Explicit connection pooling
// - No hidden connection creation
// - Clear error propagation
// - Blocking SQLite work stays off the async executor

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Default database file path
///
/// Path structure: {APP_DATA}/animenow/animenow.db
pub fn get_database_path() -> AppResult<PathBuf> {
    let app_data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Other("Could not determine app data directory".to_string()))?;

    Ok(app_data_dir.join("animenow").join("animenow.db"))
}

/// Create a connection pool for the database at `db_path`
///
/// Pool configuration:
/// - SQLite in WAL mode so cache readers never block the sync writer
/// - Busy timeout set to avoid immediate errors under contention
pub fn create_connection_pool(db_path: &Path, max_size: u32) -> AppResult<ConnectionPool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| AppError::Other(format!("Failed to create connection pool: {}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &ConnectionPool) -> AppResult<PooledConn> {
    pool.get()
        .map_err(|e| AppError::Pool(format!("Failed to get database connection: {}", e)))
}

/// Run a blocking database closure on the blocking thread pool.
///
/// The closure receives a pooled connection; its error is returned unchanged.
pub async fn run_blocking<T, F>(pool: &Arc<ConnectionPool>, work: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PooledConn) -> AppResult<T> + Send + 'static,
{
    let pool = Arc::clone(pool);

    tokio::task::spawn_blocking(move || {
        let mut conn = get_connection(&pool)?;
        work(&mut conn)
    })
    .await
    .map_err(|e| AppError::Other(format!("Blocking database task failed: {}", e)))?
}

/// Create a standalone in-memory connection (for testing)
#[cfg(test)]
pub fn create_test_connection() -> AppResult<Connection> {
    let conn = Connection::open_in_memory().map_err(AppError::Database)?;
    Ok(conn)
}

/// Create an initialized on-disk pool in a temporary directory (for testing)
///
/// The directory is deleted when the returned TempDir is dropped.
#[cfg(test)]
pub fn create_test_pool() -> AppResult<(tempfile::TempDir, Arc<ConnectionPool>)> {
    let dir = tempfile::tempdir()?;
    let pool = create_connection_pool(&dir.path().join("animenow-test.db"), 4)?;
    {
        let conn = get_connection(&pool)?;
        crate::db::initialize_database(&conn)?;
    }
    Ok((dir, Arc::new(pool)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_path_layout() {
        let path = get_database_path().unwrap();
        assert!(path.ends_with("animenow/animenow.db"));
    }

    #[test]
    fn test_connection_pool_creation() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_connection_pool(&dir.path().join("nested/cache.db"), 2).unwrap();
        let conn = get_connection(&pool).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_test_connection() {
        let conn = create_test_connection().unwrap();

        let result: i32 = conn
            .query_row("SELECT 1 + 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(create_connection_pool(&dir.path().join("cache.db"), 2).unwrap());

        let value = run_blocking(&pool, |conn| {
            Ok(conn.query_row("SELECT 40 + 2", [], |row| row.get::<_, i64>(0))?)
        })
        .await
        .unwrap();
        assert_eq!(value, 42);

        let err = run_blocking(&pool, |_conn| -> AppResult<()> { Err(AppError::NotFound) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
