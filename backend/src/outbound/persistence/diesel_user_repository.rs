//! PostgreSQL-backed `UserRepository` implementation using Diesel ORM.
//!
//! Documents are stored as `jsonb` so legacy field names survive until the
//! domain merges them on read.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;
use mockable::Clock;

use crate::domain::ports::{UserPersistenceError, UserRepository};
use crate::domain::{PlatformUserId, UserDocument};

use super::diesel_error_mapping::{map_user_diesel_error, map_user_pool_error};
use super::models::NewUserDocumentRow;
use super::pool::DbPool;
use super::schema::users;

/// Diesel-backed implementation of the `UserRepository` port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_document(
        &self,
        id: &PlatformUserId,
    ) -> Result<Option<UserDocument>, UserPersistenceError> {
        let mut conn = self.pool.checkout().await.map_err(map_user_pool_error)?;
        let stored: Option<serde_json::Value> = users::table
            .find(id.document_key())
            .select(users::document)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_user_diesel_error)?;
        stored
            .map(UserDocument::from_value)
            .transpose()
            .map_err(|err| UserPersistenceError::query(err.to_string()))
    }

    async fn save(
        &self,
        id: &PlatformUserId,
        document: &UserDocument,
    ) -> Result<(), UserPersistenceError> {
        let mut conn = self.pool.checkout().await.map_err(map_user_pool_error)?;
        let key = id.document_key();
        let value = document.clone().into_value();
        let row = NewUserDocumentRow {
            id: key.as_str(),
            document: &value,
            updated_at: self.clock.utc(),
        };
        diesel::insert_into(users::table)
            .values(&row)
            .on_conflict(users::id)
            .do_update()
            .set((
                users::document.eq(excluded(users::document)),
                users::updated_at.eq(excluded(users::updated_at)),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_user_diesel_error)?;
        Ok(())
    }
}
