//! Remote entity backend
//!
//! The hosted backend is the source of truth for every collection. It is
//! reached through [`RemoteBackend`], which deals in raw JSON rows so that
//! one implementation serves every entity kind:
//! - `rest`: PostgREST-style HTTP client for the hosted service
//! - `fake`: in-process backend for tests and offline runs

pub mod fake;
pub mod rest;

pub use fake::{FakeBackend, RemoteCall};
pub use rest::RestBackend;

use crate::entity::Collection;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Row-level access to the hosted backend.
///
/// Implementations scope every call to the authenticated user and reject
/// cross-user access themselves.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Id of the authenticated user, `None` when signed out
    async fn current_user(&self) -> Result<Option<String>>;

    /// All rows of a collection owned by `user_id`, newest created first
    async fn select(&self, collection: Collection, user_id: &str) -> Result<Vec<Value>>;

    /// Insert one row; the backend fills in `id` and `created_at`
    async fn insert(&self, collection: Collection, row: Value) -> Result<()>;

    /// Merge `patch` into the row with the given id
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<()>;

    /// Delete the row with the given id
    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}
