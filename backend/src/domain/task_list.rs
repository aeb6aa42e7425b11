//! Live task list for one group.
//!
//! [`TaskListSynchronizer`] owns at most one store subscription at a time and
//! republishes each pushed snapshot as [`TaskListState::Ready`]. Opening a
//! new group, retrying, or closing always cancels the previous subscription
//! before anything else happens, and a generation counter stops a cancelled
//! worker from publishing after its replacement has started.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};

use super::ports::TaskStore;
use super::{GroupId, Task, TaskQuery, TaskSnapshot};

/// Observable state of a group's task list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskListState {
    /// No group is open.
    #[default]
    Idle,
    /// A subscription was requested and no snapshot has arrived yet.
    Loading {
        /// Group being loaded.
        group: GroupId,
    },
    /// The latest snapshot.
    Ready {
        /// Validated, ordered tasks.
        snapshot: TaskSnapshot,
        /// Strictly increasing across every snapshot this synchronizer
        /// publishes.
        revision: u64,
    },
    /// The subscription ended with an error; terminal until retried.
    Failed {
        /// Group whose subscription failed.
        group: GroupId,
        /// Human-readable failure.
        message: String,
    },
}

impl TaskListState {
    /// Group the state refers to.
    pub fn group(&self) -> Option<&GroupId> {
        match self {
            Self::Idle => None,
            Self::Loading { group } | Self::Failed { group, .. } => Some(group),
            Self::Ready { snapshot, .. } => Some(snapshot.group_id()),
        }
    }

    /// Tasks of a ready list; empty otherwise.
    pub fn tasks(&self) -> &[Task] {
        match self {
            Self::Ready { snapshot, .. } => snapshot.tasks(),
            _ => &[],
        }
    }

    /// Snapshot revision of a ready list.
    pub fn revision(&self) -> Option<u64> {
        match self {
            Self::Ready { revision, .. } => Some(*revision),
            _ => None,
        }
    }
}

struct ActiveSubscription {
    group: GroupId,
    worker: JoinHandle<()>,
}

#[derive(Clone)]
struct Publisher {
    state: Arc<watch::Sender<TaskListState>>,
    generation: Arc<AtomicU64>,
    revision: Arc<AtomicU64>,
}

impl Publisher {
    /// Publish `next` only while `generation` is still current.
    fn publish(&self, generation: u64, next: TaskListState) -> bool {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            *current = next;
            true
        })
    }

    fn publish_snapshot(&self, generation: u64, snapshot: TaskSnapshot) -> bool {
        let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
        self.publish(generation, TaskListState::Ready { snapshot, revision })
    }
}

/// Keeps exactly one live subscription for the open group.
pub struct TaskListSynchronizer {
    store: Arc<dyn TaskStore>,
    publisher: Publisher,
    active: Mutex<Option<ActiveSubscription>>,
    span: Span,
}

impl TaskListSynchronizer {
    /// Create an idle synchronizer over `store`, logging into `span`.
    pub fn new(store: Arc<dyn TaskStore>, span: Span) -> Self {
        let (state, _) = watch::channel(TaskListState::Idle);
        Self {
            store,
            publisher: Publisher {
                state: Arc::new(state),
                generation: Arc::new(AtomicU64::new(0)),
                revision: Arc::new(AtomicU64::new(0)),
            },
            active: Mutex::new(None),
            span,
        }
    }

    /// Receiver observing every state transition.
    pub fn watch(&self) -> watch::Receiver<TaskListState> {
        self.publisher.state.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> TaskListState {
        self.publisher.state.borrow().clone()
    }

    /// Cancel any active subscription and start loading `group`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn open(&self, group: GroupId) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = self.cancel_active(&mut active);

        self.publisher.state.send_replace(TaskListState::Loading {
            group: group.clone(),
        });

        let worker = tokio::spawn(
            run_subscription(
                Arc::clone(&self.store),
                group.clone(),
                generation,
                self.publisher.clone(),
            )
            .instrument(self.span.clone()),
        );
        self.span.in_scope(|| debug!(group = %group, generation, "opened task subscription"));
        *active = Some(ActiveSubscription { group, worker });
    }

    /// Re-open the most recently opened group.
    ///
    /// Returns `false` when no group has been opened.
    pub fn retry(&self) -> bool {
        let group = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active
                .as_ref()
                .map(|subscription| subscription.group.clone())
        };
        match group {
            Some(group) => {
                self.span.in_scope(|| info!(group = %group, "retrying task subscription"));
                self.open(group);
                true
            }
            None => false,
        }
    }

    /// Cancel the active subscription and return to [`TaskListState::Idle`].
    pub fn close(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.as_ref() {
            let group = previous.group.clone();
            self.span.in_scope(|| debug!(group = %group, "closed task subscription"));
        }
        self.cancel_active(&mut active);
        self.publisher.state.send_replace(TaskListState::Idle);
    }

    /// Invalidate the running worker and return the next generation.
    fn cancel_active(&self, active: &mut Option<ActiveSubscription>) -> u64 {
        let generation = self.publisher.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(previous) = active.take() {
            previous.worker.abort();
        }
        generation
    }
}

impl Drop for TaskListSynchronizer {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = active.take() {
            previous.worker.abort();
        }
    }
}

async fn run_subscription(
    store: Arc<dyn TaskStore>,
    group: GroupId,
    generation: u64,
    publisher: Publisher,
) {
    let query = TaskQuery::for_group(group.clone());
    let mut subscription = match store.subscribe(&query).await {
        Ok(subscription) => subscription,
        Err(error) => {
            fail(&publisher, generation, group, &error.to_string());
            return;
        }
    };

    loop {
        match subscription.next().await {
            Some(Ok(tasks)) => match TaskSnapshot::new(group.clone(), tasks) {
                Ok(snapshot) => {
                    let count = snapshot.tasks().len();
                    if publisher.publish_snapshot(generation, snapshot) {
                        debug!(group = %group, count, "applied task snapshot");
                    } else {
                        debug!(group = %group, "discarded snapshot for superseded subscription");
                        return;
                    }
                }
                Err(foreign) => {
                    fail(&publisher, generation, group, &foreign.to_string());
                    return;
                }
            },
            Some(Err(error)) => {
                fail(&publisher, generation, group, &error.to_string());
                return;
            }
            None => {
                fail(&publisher, generation, group, "task subscription ended unexpectedly");
                return;
            }
        }
    }
}

fn fail(publisher: &Publisher, generation: u64, group: GroupId, message: &str) {
    warn!(group = %group, error = message, "task subscription failed");
    publisher.publish(
        generation,
        TaskListState::Failed {
            group,
            message: message.to_owned(),
        },
    );
}

#[cfg(test)]
#[path = "task_list_tests.rs"]
mod tests;
