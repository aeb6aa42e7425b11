//! In-process realtime task collection.
//!
//! Tasks are kept as raw JSON documents shaped like the persisted schema
//! (`title`, `completed`, `groupId`, `createdAt`) and validated whenever a
//! subscription reads them, so a malformed document fails the subscription
//! instead of leaking half-typed data.
//!
//! `createdAt` is a server timestamp taken from the injected clock and forced
//! to be strictly increasing across writes; documents inserted with equal
//! stamps fall back to insertion order (newest first).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{Instrument, Span, debug};
use uuid::Uuid;

use crate::domain::ports::{SnapshotResult, TaskStore, TaskStoreError, TaskSubscription};
use crate::domain::{GroupId, NewTask, Task, TaskId, TaskQuery, TaskTitle};
use crate::outbound::change_feed::ChangeFeed;

/// Snapshots buffered per subscription before the feed task waits.
const SUBSCRIPTION_BUFFER: usize = 16;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDocumentDto {
    title: String,
    completed: bool,
    group_id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredDocument {
    seq: u64,
    body: Value,
}

#[derive(Debug, Default)]
struct Collection {
    next_seq: u64,
    last_stamp: Option<DateTime<Utc>>,
    documents: HashMap<String, StoredDocument>,
}

impl Collection {
    fn insert(&mut self, id: String, body: Value) {
        self.next_seq += 1;
        self.documents.insert(
            id,
            StoredDocument {
                seq: self.next_seq,
                body,
            },
        );
    }

    fn server_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let stamp = match self.last_stamp {
            Some(previous) if now <= previous => previous + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    /// Validated tasks of `group`, newest first.
    fn query(&self, group: &GroupId) -> Result<Vec<Task>, TaskStoreError> {
        let mut matching: Vec<(u64, Task)> = self
            .documents
            .iter()
            .filter(|(_, stored)| {
                stored.body.get("groupId").and_then(Value::as_str) == Some(group.as_ref())
            })
            .map(|(id, stored)| parse_document(id, &stored.body).map(|task| (stored.seq, task)))
            .collect::<Result<_, _>>()?;
        matching.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| seq_b.cmp(seq_a))
        });
        Ok(matching.into_iter().map(|(_, task)| task).collect())
    }
}

fn parse_document(id: &str, body: &Value) -> Result<Task, TaskStoreError> {
    let malformed = |message: String| TaskStoreError::malformed_document(id, message);
    let dto: TaskDocumentDto =
        serde_json::from_value(body.clone()).map_err(|error| malformed(error.to_string()))?;
    let task_id = TaskId::new(id).map_err(|error| malformed(error.to_string()))?;
    let title = TaskTitle::new(&dto.title).map_err(|error| malformed(error.to_string()))?;
    let group = GroupId::new(dto.group_id).map_err(|error| malformed(error.to_string()))?;
    Ok(Task::new(task_id, title, dto.completed, group, dto.created_at))
}

/// [`TaskStore`] holding documents in memory.
///
/// Clones share the same collection.
#[derive(Clone)]
pub struct InMemoryTaskStore {
    collection: Arc<Mutex<Collection>>,
    clock: Arc<dyn Clock>,
    feed: ChangeFeed,
    span: Span,
}

impl InMemoryTaskStore {
    /// Create an empty store stamping documents with `clock`.
    pub fn new(clock: Arc<dyn Clock>, span: Span) -> Self {
        Self {
            collection: Arc::new(Mutex::new(Collection::default())),
            clock,
            feed: ChangeFeed::new(),
            span,
        }
    }

    /// Store `body` verbatim under `id`, bypassing validation.
    #[cfg(any(test, feature = "test-support"))]
    pub fn insert_raw(&self, id: &str, body: Value) {
        self.lock().insert(id.to_owned(), body);
        self.feed.notify();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collection> {
        self.collection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_feed(
    collection: Arc<Mutex<Collection>>,
    feed: ChangeFeed,
    group: GroupId,
    sender: mpsc::Sender<SnapshotResult>,
) {
    let mut changes = feed.subscribe();
    let mut last: Option<Vec<Task>> = None;
    loop {
        changes.borrow_and_update();
        let result = collection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .query(&group);
        match result {
            Ok(tasks) => {
                if last.as_ref() != Some(&tasks) {
                    if sender.send(Ok(tasks.clone())).await.is_err() {
                        return;
                    }
                    last = Some(tasks);
                }
            }
            Err(error) => {
                debug!(group = %group, error = %error, "subscription read failed");
                if sender.send(Err(error)).await.is_err() {
                    debug!(group = %group, "subscription closed before its failure was delivered");
                }
                return;
            }
        }
        if changes.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn subscribe(&self, query: &TaskQuery) -> Result<TaskSubscription, TaskStoreError> {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let group = query.group_id().clone();
        let span = self.span.clone();
        span.in_scope(|| debug!(group = %group, "opening subscription"));
        let feed = tokio::spawn(
            run_feed(
                Arc::clone(&self.collection),
                self.feed.clone(),
                group,
                sender,
            )
            .instrument(span),
        );
        Ok(TaskSubscription::new(receiver, feed))
    }

    async fn create(&self, task: &NewTask) -> Result<TaskId, TaskStoreError> {
        let id = Uuid::new_v4().simple().to_string();
        {
            let mut collection = self.lock();
            let created_at = collection.server_timestamp(self.clock.utc());
            collection.insert(
                id.clone(),
                json!({
                    "title": task.title.as_ref(),
                    "completed": task.completed,
                    "groupId": task.group_id.as_ref(),
                    "createdAt": created_at,
                }),
            );
        }
        self.feed.notify();
        TaskId::new(id).map_err(|error| TaskStoreError::unavailable(error.to_string()))
    }

    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<(), TaskStoreError> {
        {
            let mut collection = self.lock();
            let stored = collection
                .documents
                .get_mut(id.as_ref())
                .ok_or_else(|| TaskStoreError::not_found(id.as_ref()))?;
            match stored.body.as_object_mut() {
                Some(fields) => {
                    fields.insert("completed".to_owned(), Value::Bool(completed));
                }
                None => {
                    return Err(TaskStoreError::malformed_document(
                        id.as_ref(),
                        "document is not an object",
                    ));
                }
            }
        }
        self.feed.notify();
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        self.lock()
            .documents
            .remove(id.as_ref())
            .ok_or_else(|| TaskStoreError::not_found(id.as_ref()))?;
        self.feed.notify();
        Ok(())
    }
}
