//! Home data service
//!
//! The interface screens use: the current note and todo lists plus the
//! operations on them. Each collection is an [`EntityStore`]; this type
//! only adds the per-kind entry points and a background refresher.

use crate::database::{NewNote, NewTodo, Note, Todo};
use crate::services::remote::RemoteService;
use crate::services::sync::{EntityStore, LoadOutcome, MutationOutcome, SyncPolicy};
use crate::storage::CacheStore;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Counters shown on the analytics screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HomeStats {
    pub total_notes: usize,
    pub total_todos: usize,
    pub completed_todos: usize,
    pub open_todos: usize,
}

/// Notes and todos of the signed-in user
pub struct HomeData {
    notes: EntityStore<Note>,
    todos: EntityStore<Todo>,
}

impl HomeData {
    pub fn new(
        cache: CacheStore,
        remote: RemoteService,
        policy: SyncPolicy,
        user_id: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            notes: EntityStore::new(cache.clone(), remote.clone(), policy, user_id.clone()),
            todos: EntityStore::new(cache, remote, policy, user_id),
        }
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.snapshot()
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.todos.snapshot()
    }

    pub fn subscribe_notes(&self) -> watch::Receiver<Vec<Note>> {
        self.notes.subscribe()
    }

    pub fn subscribe_todos(&self) -> watch::Receiver<Vec<Todo>> {
        self.todos.subscribe()
    }

    /// Whether any optimistic insert is still unconfirmed
    pub async fn has_pending_writes(&self) -> bool {
        !self.notes.pending().await.is_empty() || !self.todos.pending().await.is_empty()
    }

    pub async fn load_notes(&self) -> LoadOutcome {
        self.notes.load().await
    }

    pub async fn load_todos(&self) -> LoadOutcome {
        self.todos.load().await
    }

    /// Reload both collections, as when a screen regains focus
    pub async fn refresh_all(&self) -> (LoadOutcome, LoadOutcome) {
        let notes = self.load_notes().await;
        let todos = self.load_todos().await;
        (notes, todos)
    }

    pub async fn add_note(&self, title: &str, content: &str, color: &str) -> MutationOutcome {
        self.notes.add(NewNote::new(title, content, color)).await
    }

    pub async fn delete_note(&self, id: &str) -> MutationOutcome {
        self.notes.remove(id).await
    }

    pub async fn add_todo(&self, text: &str) -> MutationOutcome {
        self.todos.add(NewTodo::new(text)).await
    }

    /// Flip `completed` on a todo
    pub async fn toggle_todo(&self, id: &str) -> MutationOutcome {
        self.todos
            .update(id, |todo| {
                todo.completed = !todo.completed;
                json!({ "completed": todo.completed })
            })
            .await
    }

    pub async fn delete_todo(&self, id: &str) -> MutationOutcome {
        self.todos.remove(id).await
    }

    pub fn stats(&self) -> HomeStats {
        let todos = self.todos();
        let completed_todos = todos.iter().filter(|t| t.completed).count();

        HomeStats {
            total_notes: self.notes().len(),
            total_todos: todos.len(),
            completed_todos,
            open_todos: todos.len() - completed_todos,
        }
    }

    /// Start a background task that refreshes both collections every `period`
    pub fn start_refresher(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Starting background refresh every {:?}", period);

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let (notes, todos) = self.refresh_all().await;
                tracing::debug!("Background refresh: notes {:?}, todos {:?}", notes, todos);
            }
        })
    }
}
