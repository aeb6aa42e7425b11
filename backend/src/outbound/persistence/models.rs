//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ports::TaskStoreError;
use crate::domain::{GroupId, Task, TaskId, TaskTitle};

use super::schema::{tasks, users};

/// Row struct for reading from the tasks table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TaskRow {
    pub id: Uuid,
    #[expect(dead_code, reason = "read for tie ordering only")]
    pub seq: i64,
    pub title: String,
    pub completed: bool,
    pub group_id: String,
    pub created_at: DateTime<Utc>,
}

impl TaskRow {
    /// Validate the row into a domain task.
    pub(crate) fn into_task(self) -> Result<Task, TaskStoreError> {
        let id = self.id.to_string();
        let malformed = |message: String| TaskStoreError::malformed_document(id.as_str(), message);
        let task_id = TaskId::new(id.as_str()).map_err(|err| malformed(err.to_string()))?;
        let title = TaskTitle::new(&self.title).map_err(|err| malformed(err.to_string()))?;
        let group = GroupId::new(self.group_id).map_err(|err| malformed(err.to_string()))?;
        Ok(Task::new(
            task_id,
            title,
            self.completed,
            group,
            self.created_at,
        ))
    }
}

/// Insertable struct for creating tasks; the database fills the rest.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tasks)]
pub(crate) struct NewTaskRow<'a> {
    pub title: &'a str,
    pub completed: bool,
    pub group_id: &'a str,
}

/// Insertable struct for upserting user documents.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserDocumentRow<'a> {
    pub id: &'a str,
    pub document: &'a serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
