//! Port abstraction for user document persistence adapters and their errors.
//!
//! Documents are keyed by the platform user id rendered as text. The port
//! deals in raw [`UserDocument`]s so legacy field names survive until the
//! domain merges them.

use async_trait::async_trait;

use crate::domain::{Error, PlatformUserId, UserDocument};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserPersistenceError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
    }
}

impl From<UserPersistenceError> for Error {
    fn from(value: UserPersistenceError) -> Self {
        match value {
            UserPersistenceError::Connection { .. } => {
                Self::service_unavailable("user store is unavailable")
            }
            UserPersistenceError::Query { .. } => Self::internal("user store query failed"),
        }
    }
}

/// Port for the `users` document collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch the raw document stored for `id`.
    async fn find_document(
        &self,
        id: &PlatformUserId,
    ) -> Result<Option<UserDocument>, UserPersistenceError>;

    /// Replace the document stored for `id`.
    async fn save(
        &self,
        id: &PlatformUserId,
        document: &UserDocument,
    ) -> Result<(), UserPersistenceError>;
}

/// Fixture implementation that remembers nothing.
///
/// Lookups always miss and saves are discarded. Use it where user
/// bookkeeping is not under test.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserRepository;

#[async_trait]
impl UserRepository for FixtureUserRepository {
    async fn find_document(
        &self,
        _id: &PlatformUserId,
    ) -> Result<Option<UserDocument>, UserPersistenceError> {
        Ok(None)
    }

    async fn save(
        &self,
        _id: &PlatformUserId,
        _document: &UserDocument,
    ) -> Result<(), UserPersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;

    #[tokio::test]
    async fn fixture_repository_lookup_returns_none() {
        let repo = FixtureUserRepository;
        let found = repo
            .find_document(&PlatformUserId::new(1))
            .await
            .expect("fixture lookup should succeed");
        assert!(found.is_none());
    }

    #[rstest]
    #[case(UserPersistenceError::connection("refused"), ErrorCode::ServiceUnavailable)]
    #[case(UserPersistenceError::query("syntax"), ErrorCode::InternalError)]
    fn persistence_errors_map_to_domain_codes(
        #[case] error: UserPersistenceError,
        #[case] code: ErrorCode,
    ) {
        assert_eq!(Error::from(error).code(), code);
    }
}
