//! Diesel and pool error mapping shared by the PostgreSQL adapters.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::ports::{TaskStoreError, UserPersistenceError};

use super::pool::PoolError;

/// Map pool errors into an adapter-specific connection error constructor.
pub(super) fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map common Diesel error variants into query/connection constructors.
pub(super) fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: Fn(&'static str) -> E,
    C: Fn(&'static str) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query("record not found"),
        DieselError::QueryBuilderError(_) => query("database query error"),
        DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand,
            _,
        ) => connection("database connection error"),
        DieselError::DatabaseError(DatabaseErrorKind::ReadOnlyTransaction, _) => {
            query("database is read-only")
        }
        _ => query("database error"),
    }
}

/// Failures while building or running a task query.
pub(super) fn map_task_query_error(error: DieselError) -> TaskStoreError {
    map_basic_diesel_error(error, TaskStoreError::query_setup, TaskStoreError::unavailable)
}

/// Failures while writing a task.
pub(super) fn map_task_write_error(error: DieselError) -> TaskStoreError {
    map_basic_diesel_error(error, TaskStoreError::unavailable, TaskStoreError::unavailable)
}

pub(super) fn map_task_pool_error(error: PoolError) -> TaskStoreError {
    map_basic_pool_error(error, TaskStoreError::unavailable)
}

pub(super) fn map_user_diesel_error(error: DieselError) -> UserPersistenceError {
    map_basic_diesel_error(
        error,
        UserPersistenceError::query,
        UserPersistenceError::connection,
    )
}

pub(super) fn map_user_pool_error(error: PoolError) -> UserPersistenceError {
    map_basic_pool_error(error, UserPersistenceError::connection)
}
