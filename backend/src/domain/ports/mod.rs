//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod bot_api;
mod task_store;
mod user_repository;

#[cfg(test)]
pub use bot_api::MockBotApi;
pub use bot_api::{BotApi, BotApiError};
#[cfg(test)]
pub use task_store::MockTaskStore;
pub use task_store::{SnapshotResult, TaskStore, TaskStoreError, TaskSubscription};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{FixtureUserRepository, UserPersistenceError, UserRepository};
