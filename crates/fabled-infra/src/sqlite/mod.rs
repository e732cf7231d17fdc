//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod conversation;
pub mod persona;
pub mod pool;
pub mod session;

/// A migrated pool on a fresh temp-file database. The database lives as long
/// as the returned directory.
#[cfg(test)]
pub(crate) async fn test_pool() -> (pool::DatabasePool, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = pool::DatabasePool::new(&url).await.unwrap();
    (pool, dir)
}
