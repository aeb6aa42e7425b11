//! Identity resolution from the platform launch context.
//!
//! The mini-app receives the platform's URL-encoded init data on connect.
//! Its `user` field carries the profile as JSON. Signatures are not checked;
//! the identity only drives display and user bookkeeping, never task access.

use std::sync::Arc;

use mockable::Clock;
use tracing::{Instrument, Span, debug, info, warn};

use super::ports::{UserPersistenceError, UserRepository};
use super::{
    Error, PlatformIdentity, PlatformUserId, RunMode, UserDocument, UserDocumentError, UserRecord,
};

/// Parsed platform launch context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    user: Option<PlatformIdentity>,
}

impl LaunchContext {
    /// Context with no platform bridge data.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context carrying `user`.
    pub fn with_user(user: PlatformIdentity) -> Self {
        Self { user: Some(user) }
    }

    /// Parse the platform's URL-encoded init data.
    ///
    /// A missing or unreadable `user` field yields a context without a user.
    ///
    /// # Examples
    /// ```
    /// use taskboard::domain::LaunchContext;
    ///
    /// let raw = "query_id=AA&user=%7B%22id%22%3A7%2C%22first_name%22%3A%22Ada%22%7D";
    /// let context = LaunchContext::from_init_data(raw);
    /// assert_eq!(context.user().map(|u| u.first_name.as_str()), Some("Ada"));
    /// ```
    pub fn from_init_data(raw: &str) -> Self {
        let user = url::form_urlencoded::parse(raw.trim_start_matches('?').as_bytes())
            .find(|(key, _)| key == "user")
            .and_then(|(_, value)| serde_json::from_str::<PlatformIdentity>(&value).ok());
        Self { user }
    }

    /// Platform user, if the bridge supplied one.
    pub fn user(&self) -> Option<&PlatformIdentity> {
        self.user.as_ref()
    }
}

/// Identity resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// No user in the launch context outside development.
    #[error("platform identity is not available")]
    NotAvailable,
    /// The user document could not be read or written.
    #[error(transparent)]
    Persistence(#[from] UserPersistenceError),
    /// The stored user document could not be decoded.
    #[error(transparent)]
    Document(#[from] UserDocumentError),
}

impl From<IdentityError> for Error {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::NotAvailable => Self::unauthorized("platform identity is not available"),
            IdentityError::Persistence(error) => error.into(),
            IdentityError::Document(_) => Self::internal("stored user document is invalid"),
        }
    }
}

/// Identity used by development sessions opened outside the platform.
pub fn development_identity() -> PlatformIdentity {
    PlatformIdentity {
        id: PlatformUserId::new(12345),
        first_name: "Test".to_owned(),
        last_name: Some("User".to_owned()),
        username: Some("testuser".to_owned()),
        language_code: Some("en".to_owned()),
        is_premium: None,
    }
}

/// Resolves the session identity and records the sighting.
pub struct IdentityResolver<U: ?Sized> {
    users: Arc<U>,
    clock: Arc<dyn Clock>,
    mode: RunMode,
    span: Span,
}

impl<U: ?Sized> Clone for IdentityResolver<U> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
            clock: Arc::clone(&self.clock),
            mode: self.mode,
            span: self.span.clone(),
        }
    }
}

impl<U> IdentityResolver<U>
where
    U: UserRepository + ?Sized,
{
    /// Create a resolver writing sightings to `users`.
    pub fn new(users: Arc<U>, clock: Arc<dyn Clock>, mode: RunMode, span: Span) -> Self {
        Self {
            users,
            clock,
            mode,
            span,
        }
    }

    /// Resolve the identity in `context` and upsert its user document.
    ///
    /// Upsert failures are logged. Development still returns the identity;
    /// production returns the failure.
    pub async fn resolve(&self, context: &LaunchContext) -> Result<PlatformIdentity, IdentityError> {
        let span = self.span.clone();
        async move {
            let identity = match context.user() {
                Some(user) => user.clone(),
                None if self.mode.is_development() => {
                    debug!("no platform user; using development identity");
                    development_identity()
                }
                None => {
                    info!("platform identity unavailable");
                    return Err(IdentityError::NotAvailable);
                }
            };

            match self.record_sighting(&identity).await {
                Ok(()) => Ok(identity),
                Err(error) if self.mode.is_development() => {
                    warn!(user = %identity.id, error = %error, "user upsert failed; continuing");
                    Ok(identity)
                }
                Err(error) => {
                    warn!(user = %identity.id, error = %error, "user upsert failed");
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn record_sighting(&self, identity: &PlatformIdentity) -> Result<(), IdentityError> {
        let now = self.clock.utc();
        let record = match self.users.find_document(&identity.id).await? {
            Some(existing) => existing.into_record()?.refreshed(identity, now),
            None => UserRecord::first_sighting(identity, now),
        };
        let document: UserDocument = record.to_document()?;
        self.users.save(&identity.id, &document).await?;
        debug!(user = %identity.id, "recorded user sighting");
        Ok(())
    }
}
