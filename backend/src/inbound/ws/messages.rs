//! Wire-level message definitions for the WebSocket adapter.
//!
//! Board views and domain errors are transformed into these payloads before
//! being serialized to JSON and sent to the mini-app.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    BoardStatus, BoardView, Error, ErrorCode, GroupId, PlatformIdentity, TaskItemView,
};

/// Inbound command sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Create a task with `title`.
    Create { title: String },
    /// Flip the completion flag of task `id`.
    Toggle { id: String },
    /// Delete task `id`.
    Delete { id: String },
    /// Re-subscribe after a failed load.
    Retry,
}

/// Outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    Hello(HelloFrame),
    Board(BoardFrame),
    Error(ErrorFrame),
}

/// First frame of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelloFrame {
    pub group: String,
    /// `null` when the identity could not be resolved.
    pub identity: Option<PlatformIdentity>,
}

impl HelloFrame {
    pub fn new(group: &GroupId, identity: Option<PlatformIdentity>) -> Self {
        Self {
            group: group.to_string(),
            identity,
        }
    }
}

/// A rendered board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardFrame {
    pub group: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub tasks: Vec<TaskFrame>,
    pub creating: bool,
}

impl From<&BoardView> for BoardFrame {
    fn from(view: &BoardView) -> Self {
        let (status, message) = match &view.status {
            BoardStatus::Loading => ("loading", None),
            BoardStatus::Ready => ("ready", None),
            BoardStatus::Failed { message } => ("failed", Some(message.clone())),
            BoardStatus::Closed => ("closed", None),
        };
        Self {
            group: view.group.to_string(),
            status,
            message,
            tasks: view.items.iter().map(TaskFrame::from).collect(),
            creating: view.creating,
        }
    }
}

/// One displayed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFrame {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub deleting: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&TaskItemView> for TaskFrame {
    fn from(item: &TaskItemView) -> Self {
        Self {
            id: item.task.id().to_string(),
            title: item.task.title().to_string(),
            completed: item.completed,
            deleting: item.deleting,
            created_at: item.task.created_at(),
        }
    }
}

/// A failed request or session setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorFrame {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&Error> for ErrorFrame {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code(),
            message: error.message().to_owned(),
        }
    }
}
