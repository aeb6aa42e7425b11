//! Domain primitives, services and ports.
//!
//! Purpose: model group-scoped tasks and the components that keep a board in
//! sync with the realtime store. Types stay transport agnostic; inbound
//! adapters render [`Error`] and the view types, outbound adapters implement
//! the traits in [`ports`].
//!
//! Public surface:
//! - `GroupContextResolver`, `IdentityResolver` resolve session context.
//! - `TaskListSynchronizer`, `TaskMutationGateway` and `TaskBoard` drive a
//!   mounted board.
//! - `BotCommandHandler` and `BotService` answer companion bot commands.
//! - `Error` is the transport-neutral failure payload.

pub mod bot;
pub mod error;
pub mod group;
pub mod identity;
pub mod ports;
pub mod run_mode;
pub mod task;
pub mod task_board;
pub mod task_list;
pub mod task_mutations;
pub mod user;

pub use self::bot::{
    BotCommand, BotCommandHandler, BotService, BotUpdate, IncomingMessage, OutgoingMessage,
    UrlButton,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::group::{
    FALLBACK_GROUP_ID, GROUP_ID_MAX, GroupContextResolver, GroupId, GroupIdValidationError,
    GroupResolutionError, LAUNCH_PARAM, decode_group_id, deep_link, encode_group_id,
};
pub use self::identity::{IdentityError, IdentityResolver, LaunchContext, development_identity};
pub use self::run_mode::{RunMode, RunModeParseError};
pub use self::task::{
    ForeignTaskError, NewTask, Task, TaskId, TaskQuery, TaskSnapshot, TaskTitle,
    TaskValidationError,
};
pub use self::task_board::{
    BoardChanges, BoardStatus, BoardView, TaskBoard, TaskForm, TaskItemView,
};
pub use self::task_list::{TaskListState, TaskListSynchronizer};
pub use self::task_mutations::{
    CreateOutcome, DeleteOutcome, MutationError, MutationKind, TaskMutationGateway, ToggleOutcome,
};
pub use self::user::{
    PlatformIdentity, PlatformUserId, UserDocument, UserDocumentError, UserRecord,
};
