//! A mounted task board: one group's live list plus its mutations.
//!
//! [`TaskBoard`] wires a [`TaskListSynchronizer`] and a
//! [`TaskMutationGateway`] to the same store and group, and composes their
//! state into the [`BoardView`] the display layer renders.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{Span, debug};

use super::ports::TaskStore;
use super::{
    CreateOutcome, DeleteOutcome, GroupId, MutationError, Task, TaskId, TaskListState,
    TaskListSynchronizer, TaskMutationGateway, ToggleOutcome,
};

/// A task with its locally displayed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItemView {
    /// Task as last pushed by the store.
    pub task: Task,
    /// Displayed completion flag, including optimistic changes.
    pub completed: bool,
    /// A delete is in flight; the item is not interactive.
    pub deleting: bool,
}

/// Loading state of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardStatus {
    /// Waiting for the first snapshot.
    Loading,
    /// Showing the latest snapshot.
    Ready,
    /// The subscription failed; retry to reload.
    Failed {
        /// Human-readable failure.
        message: String,
    },
    /// The board was unmounted.
    Closed,
}

/// Everything the display layer renders for a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    /// Group shown by the board.
    pub group: GroupId,
    /// Loading state.
    pub status: BoardStatus,
    /// Tasks, newest first.
    pub items: Vec<TaskItemView>,
    /// A create is in flight; the create control is disabled.
    pub creating: bool,
}

/// Live task board for one group.
pub struct TaskBoard {
    group: GroupId,
    synchronizer: TaskListSynchronizer,
    gateway: TaskMutationGateway,
    span: Span,
}

impl TaskBoard {
    /// Mount a board for `group` and open its subscription.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn mount(store: Arc<dyn TaskStore>, group: GroupId, span: Span) -> Self {
        let synchronizer = TaskListSynchronizer::new(Arc::clone(&store), span.clone());
        let gateway =
            TaskMutationGateway::new(store, group.clone(), synchronizer.watch(), span.clone());
        synchronizer.open(group.clone());
        span.in_scope(|| debug!(group = %group, "mounted task board"));
        Self {
            group,
            synchronizer,
            gateway,
            span,
        }
    }

    /// Group shown by the board.
    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Compose the current view.
    pub fn view(&self) -> BoardView {
        let state = self.synchronizer.state();
        let status = match &state {
            TaskListState::Idle => BoardStatus::Closed,
            TaskListState::Loading { .. } => BoardStatus::Loading,
            TaskListState::Ready { .. } => BoardStatus::Ready,
            TaskListState::Failed { message, .. } => BoardStatus::Failed {
                message: message.clone(),
            },
        };
        BoardView {
            group: self.group.clone(),
            status,
            items: self.gateway.decorate(&state),
            creating: self.gateway.is_creating(),
        }
    }

    /// Change notifications for [`TaskBoard::view`].
    pub fn changes(&self) -> BoardChanges {
        BoardChanges {
            list: self.synchronizer.watch(),
            overlay: self.gateway.watch(),
        }
    }

    /// Create a task; see [`TaskMutationGateway::create`].
    pub async fn create(&self, title: &str) -> Result<CreateOutcome, MutationError> {
        self.gateway.create(title).await
    }

    /// Toggle a task; see [`TaskMutationGateway::toggle`].
    pub async fn toggle(&self, id: &TaskId) -> Result<ToggleOutcome, MutationError> {
        self.gateway.toggle(id).await
    }

    /// Delete a task; see [`TaskMutationGateway::delete`].
    pub async fn delete(&self, id: &TaskId) -> Result<DeleteOutcome, MutationError> {
        self.gateway.delete(id).await
    }

    /// Replace the subscription with a fresh one for the same group.
    pub fn retry(&self) {
        if !self.synchronizer.retry() {
            self.synchronizer.open(self.group.clone());
        }
    }

    /// Cancel the subscription; the board shows [`BoardStatus::Closed`].
    pub fn unmount(&self) {
        self.synchronizer.close();
        self.span
            .in_scope(|| debug!(group = %self.group, "unmounted task board"));
    }
}

/// Waits for the next change to a board's view.
#[derive(Debug)]
pub struct BoardChanges {
    list: watch::Receiver<TaskListState>,
    overlay: watch::Receiver<u64>,
}

impl BoardChanges {
    /// Resolve once the view may have changed; `false` once the board is
    /// gone.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            result = self.list.changed() => result.is_ok(),
            result = self.overlay.changed() => result.is_ok(),
        }
    }
}

/// Create form state: the title input is cleared only after a create
/// succeeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    input: String,
}

impl TaskForm {
    /// Current input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the input text.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Submit the input to `board`.
    pub async fn submit(&mut self, board: &TaskBoard) -> Result<CreateOutcome, MutationError> {
        let outcome = board.create(&self.input).await?;
        if matches!(outcome, CreateOutcome::Created(_)) {
            self.input.clear();
        }
        Ok(outcome)
    }
}
