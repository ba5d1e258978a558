//! Repository layer for database operations
//!
//! Key/value access to the `cache_entries` table. Each write is a single
//! statement, so readers never observe a partially written entry.

use super::models::CacheEntry;
use crate::error::Result;
use chrono::Utc;
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a cache entry by key
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entry = sqlx::query_as::<_, CacheEntry>(
            r#"
            SELECT * FROM cache_entries WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Insert or replace the value stored under a key
    pub async fn put_entry(&self, key: &str, value: &str) -> Result<CacheEntry> {
        let now = Utc::now();

        let entry = sqlx::query_as::<_, CacheEntry>(
            r#"
            INSERT INTO cache_entries (key, value, revision, updated_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                revision = cache_entries.revision + 1,
                updated_at = excluded.updated_at
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            "Stored cache entry: {} (revision {}, {} bytes)",
            key,
            entry.revision,
            value.len()
        );
        Ok(entry)
    }

    /// Delete a cache entry, returns whether it existed
    pub async fn delete_entry(&self, key: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted cache entry: {} ({} rows)", key, rows);
        Ok(rows > 0)
    }
}
