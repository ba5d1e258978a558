//! Remote entity service
//!
//! Typed per-collection CRUD over a [`RemoteBackend`]. Every call is
//! scoped to the signed-in user; when nobody is signed in, lists come back
//! empty and mutations silently do nothing.

use crate::entity::Entity;
use crate::error::Result;
use crate::remote::RemoteBackend;
use serde_json::Value;
use std::sync::Arc;

/// Service for reading and writing entities on the backend
#[derive(Clone)]
pub struct RemoteService {
    backend: Arc<dyn RemoteBackend>,
}

impl RemoteService {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    /// All records of the signed-in user, newest created first
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        let Some(user_id) = self.backend.current_user().await? else {
            tracing::debug!("No signed-in user, {} list is empty", E::COLLECTION);
            return Ok(Vec::new());
        };

        let rows = self.backend.select(E::COLLECTION, &user_id).await?;
        let records = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<E>, _>>()?;

        Ok(records)
    }

    /// Create a record from a validated draft
    pub async fn insert<E: Entity>(&self, draft: &E::Draft) -> Result<()> {
        let Some(user_id) = self.backend.current_user().await? else {
            tracing::debug!("No signed-in user, skipping {} insert", E::COLLECTION);
            return Ok(());
        };

        self.backend
            .insert(E::COLLECTION, E::insert_row(draft, &user_id))
            .await?;

        tracing::info!("Inserted into {}", E::COLLECTION);
        Ok(())
    }

    /// Apply a field patch to one record
    pub async fn update<E: Entity>(&self, id: &str, patch: Value) -> Result<()> {
        if self.backend.current_user().await?.is_none() {
            tracing::debug!("No signed-in user, skipping {} update", E::COLLECTION);
            return Ok(());
        }

        self.backend.update(E::COLLECTION, id, patch).await?;

        tracing::info!("Updated {} record: {}", E::COLLECTION, id);
        Ok(())
    }

    /// Delete one record
    pub async fn delete<E: Entity>(&self, id: &str) -> Result<()> {
        if self.backend.current_user().await?.is_none() {
            tracing::debug!("No signed-in user, skipping {} delete", E::COLLECTION);
            return Ok(());
        }

        self.backend.delete(E::COLLECTION, id).await?;

        tracing::info!("Deleted {} record: {}", E::COLLECTION, id);
        Ok(())
    }
}
