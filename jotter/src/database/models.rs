//! Database models
//!
//! Rust structs for the synced entities and the local cache rows.
//! Entities use serde both for the backend wire format and for the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short text note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    /// One of `config::NOTE_COLORS`, fixed at creation
    pub color: String,
    /// Server timestamp, kept verbatim so any format the backend emits survives
    pub created_at: String,
    /// Client-side creation stamp; the backend does not fill it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: String,
}

/// Create note request
#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub color: String,
}

impl NewNote {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            color: color.into(),
        }
    }
}

/// Create todo request
#[derive(Debug, Clone, Deserialize)]
pub struct NewTodo {
    pub text: String,
}

impl NewTodo {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Raw row of the local key/value cache
#[derive(Debug, Clone, FromRow)]
pub struct CacheEntry {
    pub key: String,
    /// JSON-encoded ordered record list
    pub value: String,
    /// Number of writes this key has seen
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}
