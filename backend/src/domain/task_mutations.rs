//! Optimistic task mutations for one group.
//!
//! The gateway keeps a small overlay on top of the synchronizer's latest
//! snapshot: `completed` overrides tagged with the snapshot revision they were
//! made against, and `deleting` marks. An override only applies while its
//! revision is still current, so the next pushed snapshot always wins.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{Instrument, Span, debug, warn};

use super::ports::{TaskStore, TaskStoreError};
use super::{Error, GroupId, NewTask, Task, TaskId, TaskItemView, TaskListState, TaskTitle};

/// Which write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Task creation.
    Create,
    /// Completion toggle.
    Toggle,
    /// Task deletion.
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Toggle => "toggle",
            Self::Delete => "delete",
        })
    }
}

/// Mutation failures surfaced to the caller after local state is restored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Title was empty after trimming; the store was not contacted.
    #[error("task title must not be empty")]
    EmptyTitle,
    /// The task is not in the current list.
    #[error("task {id} is not in the current list")]
    UnknownTask {
        /// Requested task.
        id: TaskId,
    },
    /// The store rejected the write.
    #[error("{kind} failed for {target}: {source}")]
    WriteFailed {
        /// Operation kind.
        kind: MutationKind,
        /// Task id, or the group for creates.
        target: String,
        /// Adapter failure.
        #[source]
        source: TaskStoreError,
    },
}

impl From<MutationError> for Error {
    fn from(value: MutationError) -> Self {
        match value {
            MutationError::EmptyTitle => Self::invalid_request("task title must not be empty"),
            MutationError::UnknownTask { id } => {
                Self::not_found(format!("task {id} is not in the current list"))
            }
            MutationError::WriteFailed {
                kind,
                target,
                source,
            } => {
                let code = Error::from(source).code();
                Self::new(code, format!("{kind} failed for {target}"))
                    .with_details(json!({ "kind": kind, "target": target }))
            }
        }
    }
}

/// Result of a create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The store accepted the task.
    Created(TaskId),
    /// Another create is still in flight; nothing was sent.
    Busy,
}

/// Result of a toggle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The new value was written.
    Applied {
        /// Value written to the store.
        completed: bool,
    },
    /// The task is being deleted; nothing was sent.
    Ignored,
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The store removed the task.
    Deleted,
    /// A delete for this task is already in flight; nothing was sent.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CompletedOverride {
    completed: bool,
    revision: Option<u64>,
}

#[derive(Debug, Default)]
struct Overlay {
    completed: HashMap<TaskId, CompletedOverride>,
    deleting: HashSet<TaskId>,
}

impl Overlay {
    fn completed_for(&self, task: &Task, revision: Option<u64>) -> bool {
        match self.completed.get(task.id()) {
            Some(entry) if entry.revision == revision => entry.completed,
            _ => task.completed(),
        }
    }

    /// Drop overrides made against older snapshots and marks for tasks that
    /// have left the list.
    fn prune(&mut self, state: &TaskListState) {
        let revision = state.revision();
        self.completed.retain(|_, entry| entry.revision == revision);
        if revision.is_some() {
            let present: HashSet<&TaskId> = state.tasks().iter().map(Task::id).collect();
            self.deleting.retain(|id| present.contains(id));
        }
    }
}

/// Create, toggle and delete with optimistic local state.
pub struct TaskMutationGateway {
    store: Arc<dyn TaskStore>,
    group: GroupId,
    list: watch::Receiver<TaskListState>,
    overlay: Mutex<Overlay>,
    creating: AtomicBool,
    changes: watch::Sender<u64>,
    span: Span,
}

impl TaskMutationGateway {
    /// Create a gateway for `group` reading list state from `list`.
    pub fn new(
        store: Arc<dyn TaskStore>,
        group: GroupId,
        list: watch::Receiver<TaskListState>,
        span: Span,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            store,
            group,
            list,
            overlay: Mutex::new(Overlay::default()),
            creating: AtomicBool::new(false),
            changes,
            span,
        }
    }

    /// Group the gateway writes to.
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Receiver ticking on every local state change.
    pub fn watch(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Whether a create is in flight.
    pub fn is_creating(&self) -> bool {
        self.creating.load(Ordering::Acquire)
    }

    /// Merge the overlay into `state`'s tasks.
    ///
    /// When `state` is the latest list state, overlay entries it has
    /// superseded are dropped.
    pub fn decorate(&self, state: &TaskListState) -> Vec<TaskItemView> {
        let revision = state.revision();
        let current = self.list.borrow().revision();
        let mut overlay = self.overlay.lock().unwrap_or_else(PoisonError::into_inner);
        if revision == current {
            overlay.prune(state);
        }
        state
            .tasks()
            .iter()
            .map(|task| TaskItemView {
                completed: overlay.completed_for(task, revision),
                deleting: overlay.deleting.contains(task.id()),
                task: task.clone(),
            })
            .collect()
    }

    /// Create an open task titled `title` in the gateway's group.
    ///
    /// At most one create is in flight; a concurrent call returns
    /// [`CreateOutcome::Busy`] without contacting the store.
    pub async fn create(&self, title: &str) -> Result<CreateOutcome, MutationError> {
        let title = TaskTitle::new(title).map_err(|_| MutationError::EmptyTitle)?;
        let Some(_busy) = CreatingGuard::acquire(self) else {
            self.span.in_scope(|| debug!("create ignored while another is in flight"));
            return Ok(CreateOutcome::Busy);
        };

        let task = NewTask::open(title, self.group.clone());
        match self
            .store
            .create(&task)
            .instrument(self.span.clone())
            .await
        {
            Ok(id) => {
                self.span.in_scope(|| debug!(task = %id, "created task"));
                Ok(CreateOutcome::Created(id))
            }
            Err(source) => Err(self.write_failed(MutationKind::Create, self.group.to_string(), source)),
        }
    }

    /// Flip the displayed `completed` value of `id` and write it through.
    ///
    /// On failure the displayed value returns to its pre-toggle state.
    pub async fn toggle(&self, id: &TaskId) -> Result<ToggleOutcome, MutationError> {
        let (previous, next, revision) = {
            let state = self.list.borrow();
            let task = state
                .tasks()
                .iter()
                .find(|task| task.id() == id)
                .ok_or_else(|| MutationError::UnknownTask { id: id.clone() })?;
            let revision = state.revision();
            let mut overlay = self.overlay.lock().unwrap_or_else(PoisonError::into_inner);
            overlay.prune(&state);
            if overlay.deleting.contains(id) {
                return Ok(ToggleOutcome::Ignored);
            }
            let previous = overlay.completed_for(task, revision);
            overlay.completed.insert(
                id.clone(),
                CompletedOverride {
                    completed: !previous,
                    revision,
                },
            );
            (previous, !previous, revision)
        };
        self.notify();

        match self
            .store
            .set_completed(id, next)
            .instrument(self.span.clone())
            .await
        {
            Ok(()) => Ok(ToggleOutcome::Applied { completed: next }),
            Err(source) => {
                {
                    let mut overlay = self.overlay.lock().unwrap_or_else(PoisonError::into_inner);
                    let ours = CompletedOverride {
                        completed: next,
                        revision,
                    };
                    if overlay.completed.get(id) == Some(&ours) {
                        overlay.completed.insert(
                            id.clone(),
                            CompletedOverride {
                                completed: previous,
                                revision,
                            },
                        );
                    }
                }
                self.notify();
                Err(self.write_failed(MutationKind::Toggle, id.to_string(), source))
            }
        }
    }

    /// Mark `id` as deleting and delete it from the store.
    ///
    /// The task does not need to be in the current list; the store decides
    /// whether it still exists. On failure the mark is cleared.
    pub async fn delete(&self, id: &TaskId) -> Result<DeleteOutcome, MutationError> {
        {
            let state = self.list.borrow();
            let mut overlay = self.overlay.lock().unwrap_or_else(PoisonError::into_inner);
            overlay.prune(&state);
            if !overlay.deleting.insert(id.clone()) {
                return Ok(DeleteOutcome::Ignored);
            }
        }
        self.notify();

        match self.store.delete(id).instrument(self.span.clone()).await {
            Ok(()) => {
                self.span.in_scope(|| debug!(task = %id, "deleted task"));
                Ok(DeleteOutcome::Deleted)
            }
            Err(source) => {
                self.overlay
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .deleting
                    .remove(id);
                self.notify();
                Err(self.write_failed(MutationKind::Delete, id.to_string(), source))
            }
        }
    }

    fn write_failed(&self, kind: MutationKind, target: String, source: TaskStoreError) -> MutationError {
        self.span.in_scope(|| {
            warn!(group = %self.group, %kind, target = %target, error = %source, "task write failed");
        });
        MutationError::WriteFailed {
            kind,
            target,
            source,
        }
    }

    fn notify(&self) {
        self.changes.send_modify(|tick| *tick = tick.wrapping_add(1));
    }
}

/// Holds the single create slot; released on drop.
struct CreatingGuard<'a> {
    gateway: &'a TaskMutationGateway,
}

impl<'a> CreatingGuard<'a> {
    fn acquire(gateway: &'a TaskMutationGateway) -> Option<Self> {
        gateway
            .creating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        gateway.notify();
        Some(Self { gateway })
    }
}

impl Drop for CreatingGuard<'_> {
    fn drop(&mut self) {
        self.gateway.creating.store(false, Ordering::Release);
        self.gateway.notify();
    }
}

#[cfg(test)]
#[path = "task_mutations_tests.rs"]
mod tests;
