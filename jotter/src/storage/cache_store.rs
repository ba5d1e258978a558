//! On-device collection cache
//!
//! Holds the last known ordered list of every collection so the UI can
//! show something before the backend answers. Reads and writes never fail
//! from the caller's point of view: errors are logged, a failed read yields
//! an empty list and a failed write is dropped.

use crate::database::Repository;
use crate::entity::Collection;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Typed, infallible view over the cache table
#[derive(Clone)]
pub struct CacheStore {
    repo: Repository,
}

impl CacheStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Replace the cached list of a collection
    pub async fn save<T: Serialize>(&self, collection: Collection, records: &[T]) {
        if let Err(e) = self.try_save(collection, records).await {
            tracing::error!("Error saving {} to cache: {}", collection, e);
        }
    }

    /// Most recently saved list of a collection, or empty
    pub async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        match self.try_load(collection).await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Error loading {} from cache: {}", collection, e);
                Vec::new()
            }
        }
    }

    /// Number of writes the collection's entry has seen (0 if never written)
    pub async fn revision(&self, collection: Collection) -> i64 {
        match self.repo.get_entry(collection.cache_key()).await {
            Ok(entry) => entry.map(|e| e.revision).unwrap_or(0),
            Err(e) => {
                tracing::error!("Error reading {} cache revision: {}", collection, e);
                0
            }
        }
    }

    /// Forget the cached list of a collection
    pub async fn clear(&self, collection: Collection) {
        match self.repo.delete_entry(collection.cache_key()).await {
            Ok(true) => tracing::info!("Cleared cached {}", collection),
            Ok(false) => {}
            Err(e) => tracing::error!("Error clearing cached {}: {}", collection, e),
        }
    }

    async fn try_save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        let value = serde_json::to_string(records)?;
        self.repo.put_entry(collection.cache_key(), &value).await?;
        Ok(())
    }

    async fn try_load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        let Some(entry) = self.repo.get_entry(collection.cache_key()).await? else {
            return Ok(Vec::new());
        };

        let records = serde_json::from_str(&entry.value)?;
        Ok(records)
    }
}
