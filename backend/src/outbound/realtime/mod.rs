//! In-process realtime adapters.
//!
//! Used when no database URL is configured and by the integration tests. The
//! task store behaves like a hosted realtime document store: one live query
//! per subscription, full snapshots on every relevant change, server
//! timestamps.

mod memory_task_store;
mod memory_user_repository;

pub use memory_task_store::InMemoryTaskStore;
pub use memory_user_repository::InMemoryUserRepository;
