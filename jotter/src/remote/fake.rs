//! In-process backend
//!
//! Behaves like the hosted service closely enough to drive the sync layer
//! without a network: rows are scoped per user, the server assigns ids and
//! creation times, and lists come back newest first. Failures and
//! in-flight writes can be injected to exercise offline paths.

use super::RemoteBackend;
use crate::entity::Collection;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

/// A call received by the fake backend, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Select(Collection),
    Insert(Collection, Value),
    Update(Collection, String, Value),
    Delete(Collection, String),
}

impl RemoteCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RemoteCall::Select(_))
    }
}

pub struct FakeBackend {
    user: Mutex<Option<String>>,
    rows: Mutex<HashMap<Collection, Vec<Value>>>,
    calls: Mutex<Vec<RemoteCall>>,
    read_failures: AtomicU32,
    write_failures: AtomicU32,
    write_gate: Arc<RwLock<()>>,
    clock: AtomicI64,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            user: Mutex::new(None),
            rows: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            read_failures: AtomicU32::new(0),
            write_failures: AtomicU32::new(0),
            write_gate: Arc::new(RwLock::new(())),
            clock: AtomicI64::new(0),
        }
    }
}

impl FakeBackend {
    /// Backend with a signed-in user
    pub fn with_user(user_id: impl Into<String>) -> Self {
        Self {
            user: Mutex::new(Some(user_id.into())),
            ..Self::default()
        }
    }

    pub async fn set_user(&self, user_id: Option<String>) {
        *self.user.lock().await = user_id;
    }

    /// Replace the stored rows of a collection
    pub async fn seed(&self, collection: Collection, rows: Vec<Value>) {
        self.rows.lock().await.insert(collection, rows);
    }

    /// All stored rows of a collection, any owner, newest first
    pub async fn rows(&self, collection: Collection) -> Vec<Value> {
        let mut rows = self
            .rows
            .lock()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default();
        sort_newest_first(&mut rows);
        rows
    }

    pub async fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().await.clone()
    }

    pub async fn mutation_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| call.is_mutation())
            .count()
    }

    /// Fail the next `n` reads (`u32::MAX` to stay offline)
    pub fn fail_reads(&self, n: u32) {
        self.read_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` writes (`u32::MAX` to fail forever)
    pub fn fail_writes(&self, n: u32) {
        self.write_failures.store(n, Ordering::SeqCst);
    }

    /// Hold every write until the returned guard is dropped
    pub async fn pause_writes(&self) -> OwnedRwLockWriteGuard<()> {
        self.write_gate.clone().write_owned().await
    }

    async fn record(&self, call: RemoteCall) {
        self.calls.lock().await.push(call);
    }

    async fn require_user(&self) -> Result<String> {
        self.user.lock().await.clone().ok_or(AppError::Remote {
            status: 401,
            message: "not signed in".to_string(),
        })
    }

    /// Strictly increasing creation time, one second per insert
    fn next_created_at(&self) -> DateTime<Utc> {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let epoch = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        epoch + Duration::seconds(tick)
    }

    async fn before_write(&self) -> Result<()> {
        let _pass = self.write_gate.read().await;
        take_failure(&self.write_failures)
    }
}

fn take_failure(counter: &AtomicU32) -> Result<()> {
    let failing = counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
            0 => None,
            u32::MAX => Some(u32::MAX),
            n => Some(n - 1),
        })
        .is_ok();

    if failing {
        return Err(AppError::Remote {
            status: 503,
            message: "backend unavailable".to_string(),
        });
    }
    Ok(())
}

fn created_at(row: &Value) -> &str {
    row.get("created_at").and_then(Value::as_str).unwrap_or_default()
}

/// Timestamps of one format order lexically, which is all the fake needs
fn sort_newest_first(rows: &mut [Value]) {
    rows.sort_by(|a, b| created_at(b).cmp(created_at(a)));
}

fn owned_by(row: &Value, user_id: &str) -> bool {
    row.get("user_id").and_then(Value::as_str) == Some(user_id)
}

fn has_id(row: &Value, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl RemoteBackend for FakeBackend {
    async fn current_user(&self) -> Result<Option<String>> {
        Ok(self.user.lock().await.clone())
    }

    async fn select(&self, collection: Collection, user_id: &str) -> Result<Vec<Value>> {
        self.record(RemoteCall::Select(collection)).await;
        take_failure(&self.read_failures)?;

        let mut rows: Vec<Value> = self
            .rows
            .lock()
            .await
            .get(&collection)
            .map(|rows| rows.iter().filter(|r| owned_by(r, user_id)).cloned().collect())
            .unwrap_or_default();

        sort_newest_first(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, mut row: Value) -> Result<()> {
        self.record(RemoteCall::Insert(collection, row.clone())).await;
        self.before_write().await?;

        let user_id = self.require_user().await?;
        if !owned_by(&row, &user_id) {
            return Err(AppError::Remote {
                status: 403,
                message: "row owner does not match session".to_string(),
            });
        }

        let Some(fields) = row.as_object_mut() else {
            return Err(AppError::Remote {
                status: 400,
                message: "row must be an object".to_string(),
            });
        };

        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        let stamp = self.next_created_at();
        fields.entry("created_at").or_insert_with(|| {
            Value::String(stamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        });

        self.rows
            .lock()
            .await
            .entry(collection)
            .or_default()
            .push(row);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> Result<()> {
        self.record(RemoteCall::Update(collection, id.to_string(), patch.clone()))
            .await;
        self.before_write().await?;

        let user_id = self.require_user().await?;
        let mut rows = self.rows.lock().await;

        let target = rows
            .get_mut(&collection)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|r| has_id(r, id) && owned_by(r, &user_id))
            })
            .and_then(Value::as_object_mut);

        if let (Some(fields), Some(changes)) = (target, patch.as_object()) {
            for (key, value) in changes {
                fields.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.record(RemoteCall::Delete(collection, id.to_string()))
            .await;
        self.before_write().await?;

        let user_id = self.require_user().await?;
        if let Some(rows) = self.rows.lock().await.get_mut(&collection) {
            rows.retain(|r| !(has_id(r, id) && owned_by(r, &user_id)));
        }
        Ok(())
    }
}
