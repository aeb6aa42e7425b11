//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the task store and user repository ports
//! backed by PostgreSQL via `diesel-async` with `bb8` connection pooling.
//!
//! - **Thin adapters**: implementations only translate between Diesel rows
//!   and domain types.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: database failures map to the port error
//!   enums.
//!
//! # Example
//!
//! ```ignore
//! use taskboard::outbound::persistence::{DbPool, DieselTaskStore, PoolConfig};
//!
//! let pool = DbPool::connect(PoolConfig::new("postgres://localhost/taskboard")).await?;
//! let store = DieselTaskStore::new(pool, Duration::from_secs(2), Span::current());
//! ```

mod diesel_error_mapping;
mod diesel_task_store;
mod diesel_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_task_store::DieselTaskStore;
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DEFAULT_MAX_CONNECTIONS, DbPool, PoolConfig, PoolError};
