//! Task data model.
//!
//! Tasks are created with a trimmed, non-empty title inside exactly one group.
//! The store assigns the identifier and the creation timestamp; only the
//! `completed` flag changes afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GroupId;

/// Validation errors for task value types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskValidationError {
    /// The store returned an empty identifier.
    #[error("task id must not be empty")]
    EmptyId,
    /// The title was empty once trimmed.
    #[error("task title must not be empty")]
    EmptyTitle,
}

/// Store-assigned opaque task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Validate and construct a [`TaskId`].
    pub fn new(id: impl Into<String>) -> Result<Self, TaskValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TaskValidationError::EmptyId);
        }
        Ok(Self(id))
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Task title with surrounding whitespace removed.
///
/// # Examples
/// ```
/// use taskboard::domain::TaskTitle;
///
/// let title = TaskTitle::new("  Buy milk  ").expect("non-empty title");
/// assert_eq!(title.as_ref(), "Buy milk");
/// assert!(TaskTitle::new(" \t ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskTitle(String);

impl TaskTitle {
    /// Trim and validate a title.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, TaskValidationError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for TaskTitle {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TaskTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TaskTitle> for String {
    fn from(value: TaskTitle) -> Self {
        value.0
    }
}

impl TryFrom<String> for TaskTitle {
    type Error = TaskValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A task as observed through a group subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    id: TaskId,
    title: TaskTitle,
    completed: bool,
    group_id: GroupId,
    created_at: DateTime<Utc>,
}

impl Task {
    /// Assemble a task from validated parts.
    pub fn new(
        id: TaskId,
        title: TaskTitle,
        completed: bool,
        group_id: GroupId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            completed,
            group_id,
            created_at,
        }
    }

    /// Store-assigned identifier.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Trimmed title.
    pub fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Completion flag as persisted.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Owning group.
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Server-assigned creation time; the sole sort key.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Fields supplied by the client when creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Trimmed title.
    pub title: TaskTitle,
    /// Initial completion flag; always `false` from the mutation gateway.
    pub completed: bool,
    /// Owning group.
    pub group_id: GroupId,
}

impl NewTask {
    /// A not-yet-completed task for `group_id`.
    pub fn open(title: TaskTitle, group_id: GroupId) -> Self {
        Self {
            title,
            completed: false,
            group_id,
        }
    }
}

/// Live query for one group's tasks, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    group_id: GroupId,
}

impl TaskQuery {
    /// Query filtered to `group_id` and sorted by `createdAt` descending.
    pub fn for_group(group_id: GroupId) -> Self {
        Self { group_id }
    }

    /// Group equality filter.
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }
}

/// A task observed in a snapshot for a different group.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task {task_id} belongs to group {found}, not {expected}")]
pub struct ForeignTaskError {
    /// Offending task.
    pub task_id: TaskId,
    /// Group the snapshot was opened for.
    pub expected: GroupId,
    /// Group recorded on the task.
    pub found: GroupId,
}

/// Full replacement view of one group's tasks.
///
/// ## Invariants
/// - every task belongs to `group_id`
/// - tasks are ordered by `created_at` descending; ties keep the order the
///   store delivered them in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    group_id: GroupId,
    tasks: Vec<Task>,
}

impl TaskSnapshot {
    /// Validate group membership and order tasks newest first.
    pub fn new(group_id: GroupId, mut tasks: Vec<Task>) -> Result<Self, ForeignTaskError> {
        if let Some(foreign) = tasks.iter().find(|task| task.group_id != group_id) {
            return Err(ForeignTaskError {
                task_id: foreign.id.clone(),
                expected: group_id,
                found: foreign.group_id.clone(),
            });
        }
        // `sort_by` is stable, so store-defined tie order survives.
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Self { group_id, tasks })
    }

    /// Group the snapshot belongs to.
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Tasks, newest first.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    #[fixture]
    fn group() -> GroupId {
        GroupId::new("g1").expect("valid group")
    }

    fn task(id: &str, group: &GroupId, second: u32) -> Task {
        Task::new(
            TaskId::new(id).expect("valid id"),
            TaskTitle::new(format!("task {id}")).expect("valid title"),
            false,
            group.clone(),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, second)
                .single()
                .expect("valid timestamp"),
        )
    }

    #[rstest]
    #[case("Buy milk", "Buy milk")]
    #[case("  Buy milk  ", "Buy milk")]
    #[case("\tline\n", "line")]
    fn title_is_trimmed(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(TaskTitle::new(raw).expect("valid").as_ref(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn blank_title_is_rejected(#[case] raw: &str) {
        assert_eq!(TaskTitle::new(raw), Err(TaskValidationError::EmptyTitle));
    }

    #[rstest]
    fn snapshot_orders_newest_first(group: GroupId) {
        let snapshot = TaskSnapshot::new(
            group.clone(),
            vec![task("a", &group, 1), task("b", &group, 3), task("c", &group, 2)],
        )
        .expect("same group");
        let ids: Vec<&str> = snapshot.tasks().iter().map(|t| t.id().as_ref()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[rstest]
    fn snapshot_keeps_store_order_for_ties(group: GroupId) {
        let snapshot = TaskSnapshot::new(
            group.clone(),
            vec![task("x", &group, 5), task("y", &group, 5), task("z", &group, 5)],
        )
        .expect("same group");
        let ids: Vec<&str> = snapshot.tasks().iter().map(|t| t.id().as_ref()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[rstest]
    fn snapshot_rejects_foreign_group(group: GroupId) {
        let other = GroupId::new("g2").expect("valid group");
        let error = TaskSnapshot::new(group.clone(), vec![task("a", &other, 1)])
            .expect_err("foreign task rejected");
        assert_eq!(error.expected, group);
        assert_eq!(error.found, other);
    }

    #[rstest]
    fn task_serializes_with_camel_case_fields(group: GroupId) {
        let value = serde_json::to_value(task("a", &group, 1)).expect("serialize");
        assert_eq!(value["groupId"], "g1");
        assert_eq!(value["completed"], false);
        assert!(value.get("createdAt").is_some());
    }
}
