//! Database module
//!
//! SQLite persistence for the on-device cache:
//! - Schema and migrations
//! - Model definitions
//! - Repository layer over the key/value cache table

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// The cache is a handful of whole-list rows rewritten by one process.
/// A single connection keeps writes committing in the order they are issued.
const CACHE_CONNECTIONS: u32 = 1;

/// Open (creating if needed) the cache database and bring its schema up to date.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening cache database at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(CACHE_CONNECTIONS)
        .connect_with(options)
        .await?;

    initialize_database(&pool).await?;

    tracing::info!("Cache database ready");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_pool_makes_parent_dirs_and_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("cache.db");

        let pool = create_pool(&db_path).await.unwrap();
        let repo = Repository::new(pool);

        assert!(db_path.exists());
        let entry = repo.put_entry("@todos", "[]").await.unwrap();
        assert_eq!(entry.revision, 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_entries() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");

        let pool = create_pool(&db_path).await.unwrap();
        Repository::new(pool.clone())
            .put_entry("@notes", "[1]")
            .await
            .unwrap();
        pool.close().await;

        let repo = Repository::new(create_pool(&db_path).await.unwrap());
        let entry = repo.get_entry("@notes").await.unwrap().unwrap();
        assert_eq!(entry.value, "[1]");
    }
}
