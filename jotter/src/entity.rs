//! Entity kinds
//!
//! Notes and todos share one add/delete/reconcile flow. Everything that
//! differs between them (validation, optimistic construction, insert
//! payload, storage names) lives behind the [`Entity`] descriptor so the
//! reconciling store can stay generic.

use crate::config::{
    DEFAULT_NOTE_COLOR, NOTES_CACHE_KEY, NOTE_COLORS, TODOS_CACHE_KEY,
};
use crate::database::{NewNote, NewTodo, Note, Todo};
use crate::error::{AppError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// A named collection, both remotely (table) and locally (cache key)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Notes,
    Todos,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Notes, Collection::Todos];

    /// Backend table name
    pub fn table(self) -> &'static str {
        match self {
            Collection::Notes => "notes",
            Collection::Todos => "todos",
        }
    }

    /// Key under which the collection is cached on the device
    pub fn cache_key(self) -> &'static str {
        match self {
            Collection::Notes => NOTES_CACHE_KEY,
            Collection::Todos => TODOS_CACHE_KEY,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// UTC timestamp in the millisecond ISO 8601 form clients send
fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Descriptor for a record type managed by the reconciling store
pub trait Entity:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// User input for creating a record
    type Draft: Send + Sync;

    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Normalize a draft, or reject it with `AppError::Validation`.
    fn validate(draft: Self::Draft) -> Result<Self::Draft>;

    /// Build the locally-complete record shown before the backend answers.
    fn optimistic(draft: &Self::Draft, id: String, user_id: &str, now: DateTime<Utc>) -> Self;

    /// Row sent to the backend; it assigns `id` and `created_at` itself.
    fn insert_row(draft: &Self::Draft, user_id: &str) -> Value;

    /// Same user-visible content, ignoring identity and timestamps.
    fn same_content(&self, other: &Self) -> bool;
}

impl Entity for Note {
    type Draft = NewNote;

    const COLLECTION: Collection = Collection::Notes;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(draft: NewNote) -> Result<NewNote> {
        let title = draft.title.trim().to_string();
        let content = draft.content.trim().to_string();

        if title.is_empty() && content.is_empty() {
            return Err(AppError::Validation(
                "note needs a title or content".to_string(),
            ));
        }

        let color = if NOTE_COLORS.contains(&draft.color.as_str()) {
            draft.color
        } else {
            tracing::warn!(
                "Unknown note color {:?}, using {}",
                draft.color,
                DEFAULT_NOTE_COLOR
            );
            DEFAULT_NOTE_COLOR.to_string()
        };

        Ok(NewNote {
            title,
            content,
            color,
        })
    }

    fn optimistic(draft: &NewNote, id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        let now = iso_timestamp(now);
        Note {
            id,
            user_id: user_id.to_string(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            color: draft.color.clone(),
            created_at: now.clone(),
            timestamp: Some(now),
        }
    }

    fn insert_row(draft: &NewNote, user_id: &str) -> Value {
        json!({
            "user_id": user_id,
            "title": draft.title,
            "content": draft.content,
            "color": draft.color,
        })
    }

    fn same_content(&self, other: &Self) -> bool {
        self.title == other.title && self.content == other.content && self.color == other.color
    }
}

impl Entity for Todo {
    type Draft = NewTodo;

    const COLLECTION: Collection = Collection::Todos;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(draft: NewTodo) -> Result<NewTodo> {
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("todo text is blank".to_string()));
        }
        Ok(NewTodo::new(text))
    }

    fn optimistic(draft: &NewTodo, id: String, user_id: &str, now: DateTime<Utc>) -> Self {
        Todo {
            id,
            user_id: user_id.to_string(),
            text: draft.text.clone(),
            completed: false,
            created_at: iso_timestamp(now),
        }
    }

    fn insert_row(draft: &NewTodo, user_id: &str) -> Value {
        json!({
            "user_id": user_id,
            "text": draft.text,
            "completed": false,
        })
    }

    fn same_content(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
