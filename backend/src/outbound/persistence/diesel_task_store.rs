//! PostgreSQL-backed `TaskStore` implementation using Diesel ORM.
//!
//! PostgreSQL has no document-level push, so subscriptions re-run their
//! query after every write made through this store and on a fixed polling
//! interval (to pick up writes from other processes). A snapshot is only
//! emitted when the result differs from the last one sent.

use std::time::Duration;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{Instrument, Span, debug};
use uuid::Uuid;

use crate::domain::ports::{SnapshotResult, TaskStore, TaskStoreError, TaskSubscription};
use crate::domain::{GroupId, NewTask, Task, TaskId, TaskQuery};
use crate::outbound::change_feed::ChangeFeed;

use super::diesel_error_mapping::{map_task_pool_error, map_task_query_error, map_task_write_error};
use super::models::{NewTaskRow, TaskRow};
use super::pool::DbPool;
use super::schema::tasks;

const SUBSCRIPTION_BUFFER: usize = 16;

/// Diesel-backed implementation of the `TaskStore` port.
#[derive(Clone)]
pub struct DieselTaskStore {
    pool: DbPool,
    feed: ChangeFeed,
    poll_interval: Duration,
    span: Span,
}

impl DieselTaskStore {
    /// Create a store refreshing open subscriptions every `poll_interval`.
    pub fn new(pool: DbPool, poll_interval: Duration, span: Span) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
            poll_interval,
            span,
        }
    }
}

/// Load one group's tasks, newest first.
async fn load_snapshot(pool: &DbPool, group: &GroupId) -> Result<Vec<Task>, TaskStoreError> {
    let mut conn = pool.checkout().await.map_err(map_task_pool_error)?;
    let rows: Vec<TaskRow> = tasks::table
        .filter(tasks::group_id.eq(group.as_ref()))
        .order((tasks::created_at.desc(), tasks::seq.desc()))
        .select(TaskRow::as_select())
        .load(&mut conn)
        .await
        .map_err(map_task_query_error)?;
    rows.into_iter().map(TaskRow::into_task).collect()
}

/// Store ids are UUIDs; anything else cannot name a row.
fn row_id(id: &TaskId) -> Result<Uuid, TaskStoreError> {
    Uuid::parse_str(id.as_ref()).map_err(|_| TaskStoreError::not_found(id.as_ref()))
}

async fn run_feed(
    pool: DbPool,
    feed: ChangeFeed,
    poll_interval: Duration,
    group: GroupId,
    mut last: Vec<Task>,
    sender: mpsc::Sender<SnapshotResult>,
) {
    let mut changes = feed.subscribe();
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = ticker.tick() => {}
        }
        changes.borrow_and_update();
        match load_snapshot(&pool, &group).await {
            Ok(tasks) if tasks == last => {}
            Ok(tasks) => {
                if sender.send(Ok(tasks.clone())).await.is_err() {
                    return;
                }
                last = tasks;
            }
            Err(error) => {
                debug!(group = %group, error = %error, "subscription refresh failed");
                if sender.send(Err(error)).await.is_err() {
                    debug!(group = %group, "subscription closed before its failure was delivered");
                }
                return;
            }
        }
    }
}

#[async_trait]
impl TaskStore for DieselTaskStore {
    async fn subscribe(&self, query: &TaskQuery) -> Result<TaskSubscription, TaskStoreError> {
        let group = query.group_id().clone();
        let initial = load_snapshot(&self.pool, &group)
            .instrument(self.span.clone())
            .await?;

        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        sender
            .send(Ok(initial.clone()))
            .await
            .map_err(|_| TaskStoreError::unavailable("subscription closed during setup"))?;
        let feed = tokio::spawn(
            run_feed(
                self.pool.clone(),
                self.feed.clone(),
                self.poll_interval,
                group,
                initial,
                sender,
            )
            .instrument(self.span.clone()),
        );
        Ok(TaskSubscription::new(receiver, feed))
    }

    async fn create(&self, task: &NewTask) -> Result<TaskId, TaskStoreError> {
        let mut conn = self.pool.checkout().await.map_err(map_task_pool_error)?;
        let row = NewTaskRow {
            title: task.title.as_ref(),
            completed: task.completed,
            group_id: task.group_id.as_ref(),
        };
        let id: Uuid = diesel::insert_into(tasks::table)
            .values(&row)
            .returning(tasks::id)
            .get_result(&mut conn)
            .await
            .map_err(map_task_write_error)?;
        self.feed.notify();
        TaskId::new(id.to_string()).map_err(|err| TaskStoreError::unavailable(err.to_string()))
    }

    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<(), TaskStoreError> {
        let row_id = row_id(id)?;
        let mut conn = self.pool.checkout().await.map_err(map_task_pool_error)?;
        let updated = diesel::update(tasks::table.find(row_id))
            .set(tasks::completed.eq(completed))
            .execute(&mut conn)
            .await
            .map_err(map_task_write_error)?;
        if updated == 0 {
            return Err(TaskStoreError::not_found(id.as_ref()));
        }
        self.feed.notify();
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), TaskStoreError> {
        let row_id = row_id(id)?;
        let mut conn = self.pool.checkout().await.map_err(map_task_pool_error)?;
        let deleted = diesel::delete(tasks::table.find(row_id))
            .execute(&mut conn)
            .await
            .map_err(map_task_write_error)?;
        if deleted == 0 {
            return Err(TaskStoreError::not_found(id.as_ref()));
        }
        self.feed.notify();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for helpers that need no database.
    use super::*;

    #[test]
    fn non_uuid_ids_cannot_exist() {
        let id = TaskId::new("abc").expect("valid id");
        assert_eq!(row_id(&id), Err(TaskStoreError::not_found("abc")));
    }

    #[test]
    fn uuid_ids_parse() {
        let raw = Uuid::new_v4();
        let id = TaskId::new(raw.to_string()).expect("valid id");
        assert_eq!(row_id(&id), Ok(raw));
    }
}
