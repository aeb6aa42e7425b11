//! Driven port for the realtime task collection.
//!
//! Adapters expose four operations over a single logical `tasks` collection:
//! a live group-filtered subscription plus single-document writes. Adapters
//! surface failures with the operation context but never retry.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::{Error, NewTask, Task, TaskId, TaskQuery};

use super::define_port_error;

define_port_error! {
    /// Errors raised by task store adapters.
    pub enum TaskStoreError {
        /// The store failed to initialise or cannot be reached.
        Unavailable { message: String } => "task store unavailable: {message}",
        /// The filtered, sorted subscription could not be constructed.
        QuerySetup { message: String } => "task query setup failed: {message}",
        /// The target document does not exist.
        NotFound { id: String } => "task {id} not found",
        /// The store refused the request.
        Unauthorized { message: String } => "task store rejected the request: {message}",
        /// A stored document failed schema validation.
        MalformedDocument { id: String, message: String } => "task document {id} is malformed: {message}",
    }
}

impl From<TaskStoreError> for Error {
    fn from(value: TaskStoreError) -> Self {
        match value {
            TaskStoreError::Unavailable { .. } | TaskStoreError::QuerySetup { .. } => {
                Self::service_unavailable("task store is unavailable")
            }
            TaskStoreError::NotFound { id } => Self::not_found(format!("task {id} not found")),
            TaskStoreError::Unauthorized { .. } => {
                Self::unauthorized("task store rejected the request")
            }
            TaskStoreError::MalformedDocument { id, .. } => {
                Self::internal(format!("task {id} could not be read"))
            }
        }
    }
}

/// One pushed result set; an error ends the subscription.
pub type SnapshotResult = Result<Vec<Task>, TaskStoreError>;

/// Cancellable live subscription returned by [`TaskStore::subscribe`].
///
/// Dropping or cancelling the subscription stops the adapter's feed task so
/// no further snapshots are produced.
pub struct TaskSubscription {
    snapshots: mpsc::Receiver<SnapshotResult>,
    feed: Option<JoinHandle<()>>,
}

impl TaskSubscription {
    /// Wrap a receiver fed by `feed`.
    pub fn new(snapshots: mpsc::Receiver<SnapshotResult>, feed: JoinHandle<()>) -> Self {
        Self {
            snapshots,
            feed: Some(feed),
        }
    }

    /// Wrap a receiver whose sender is owned elsewhere (test doubles).
    pub fn from_receiver(snapshots: mpsc::Receiver<SnapshotResult>) -> Self {
        Self {
            snapshots,
            feed: None,
        }
    }

    /// Wait for the next snapshot; `None` once the feed has stopped.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.snapshots.recv().await
    }

    /// Stop receiving updates and release the adapter's resources.
    pub fn cancel(mut self) {
        self.stop_feed();
    }

    fn stop_feed(&mut self) {
        self.snapshots.close();
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

impl Drop for TaskSubscription {
    fn drop(&mut self) {
        self.stop_feed();
    }
}

impl fmt::Debug for TaskSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSubscription")
            .field("has_feed", &self.feed.is_some())
            .finish_non_exhaustive()
    }
}

/// Port for the realtime task collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Open a live query; the first snapshot is delivered immediately and a
    /// new full snapshot follows every change to a matching document.
    async fn subscribe(&self, query: &TaskQuery) -> Result<TaskSubscription, TaskStoreError>;

    /// Insert a task; the store assigns its identifier and creation time.
    async fn create(&self, task: &NewTask) -> Result<TaskId, TaskStoreError>;

    /// Set the `completed` field of an existing task.
    async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<(), TaskStoreError>;

    /// Delete a task.
    async fn delete(&self, id: &TaskId) -> Result<(), TaskStoreError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[rstest]
    #[case(TaskStoreError::unavailable("down"), ErrorCode::ServiceUnavailable)]
    #[case(TaskStoreError::query_setup("bad index"), ErrorCode::ServiceUnavailable)]
    #[case(TaskStoreError::not_found("t1"), ErrorCode::NotFound)]
    #[case(TaskStoreError::unauthorized("rules"), ErrorCode::Unauthorized)]
    #[case(TaskStoreError::malformed_document("t1", "no title"), ErrorCode::InternalError)]
    fn store_errors_map_to_domain_codes(#[case] error: TaskStoreError, #[case] code: ErrorCode) {
        assert_eq!(Error::from(error).code(), code);
    }

    #[tokio::test]
    async fn cancel_stops_the_feed() {
        let (tx, rx) = mpsc::channel::<SnapshotResult>(1);
        let feed = tokio::spawn(async move {
            loop {
                if tx.send(Ok(Vec::new())).await.is_err() {
                    break;
                }
            }
        });
        let mut subscription = TaskSubscription::new(rx, feed);
        assert!(subscription.next().await.is_some());
        subscription.cancel();
    }

    #[tokio::test]
    async fn next_returns_none_when_sender_is_gone() {
        let (tx, rx) = mpsc::channel::<SnapshotResult>(1);
        drop(tx);
        let mut subscription = TaskSubscription::from_receiver(rx);
        assert!(subscription.next().await.is_none());
    }
}
