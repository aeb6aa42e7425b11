//! Store lifecycle: one explicit initialisation call per process.
//!
//! [`initialize`] picks the backend from [`StoreSettings`]: the in-process
//! realtime store when no database URL is configured, PostgreSQL otherwise.
//! Failures are returned as [`StoreConfigError`] so the entry point decides
//! how to report them.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{info, info_span};
use url::Url;

use crate::domain::ports::{TaskStore, UserRepository};

use super::persistence::{
    DEFAULT_MAX_CONNECTIONS, DbPool, DieselTaskStore, DieselUserRepository, MigrationError,
    PoolConfig, PoolError, run_pending_migrations,
};
use super::realtime::{InMemoryTaskStore, InMemoryUserRepository};

/// Default PostgreSQL refresh interval for open subscriptions.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Inputs for [`initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// PostgreSQL URL; `None` selects the in-process store.
    pub database_url: Option<String>,
    /// How often PostgreSQL subscriptions re-run their query.
    pub poll_interval: Duration,
    /// PostgreSQL connection cap.
    pub max_connections: u32,
}

impl StoreSettings {
    /// Settings for the in-process store.
    pub fn in_memory() -> Self {
        Self {
            database_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Settings for a PostgreSQL store at `database_url`.
    pub fn postgres(database_url: impl Into<String>) -> Self {
        Self {
            database_url: Some(database_url.into()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Replace the refresh interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Replace the PostgreSQL connection cap.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Initialisation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreConfigError {
    /// The database URL is not a PostgreSQL URL.
    #[error("invalid database url: {message}")]
    InvalidDatabaseUrl {
        /// Parse failure or rejected scheme.
        message: String,
    },
    /// The refresh interval must be positive.
    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,
    /// Schema migrations could not be applied.
    #[error(transparent)]
    Migration(#[from] MigrationError),
    /// The connection pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Handles to the initialised store.
#[derive(Clone)]
pub struct StoreHandle {
    /// Task collection.
    pub tasks: Arc<dyn TaskStore>,
    /// User collection.
    pub users: Arc<dyn UserRepository>,
}

fn validate_database_url(raw: &str) -> Result<(), StoreConfigError> {
    let url = Url::parse(raw).map_err(|err| StoreConfigError::InvalidDatabaseUrl {
        message: err.to_string(),
    })?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(StoreConfigError::InvalidDatabaseUrl {
            message: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// Build the store described by `settings`.
///
/// For PostgreSQL this applies pending migrations before building the pool.
///
/// # Errors
///
/// Returns [`StoreConfigError`] when the settings are invalid or the database
/// cannot be prepared.
pub async fn initialize(
    settings: &StoreSettings,
    clock: Arc<dyn Clock>,
) -> Result<StoreHandle, StoreConfigError> {
    if settings.poll_interval.is_zero() {
        return Err(StoreConfigError::InvalidPollInterval);
    }

    let Some(database_url) = settings.database_url.as_deref() else {
        info!(backend = "memory", "task store initialised");
        let span = info_span!("task_store", backend = "memory");
        return Ok(StoreHandle {
            tasks: Arc::new(InMemoryTaskStore::new(clock, span)),
            users: Arc::new(InMemoryUserRepository::new()),
        });
    };

    validate_database_url(database_url)?;
    run_pending_migrations(database_url).await?;
    let pool_config = PoolConfig::new(database_url).with_max_size(settings.max_connections);
    let pool = DbPool::connect(pool_config).await?;
    info!(backend = "postgres", "task store initialised");
    let span = info_span!("task_store", backend = "postgres");
    Ok(StoreHandle {
        tasks: Arc::new(DieselTaskStore::new(
            pool.clone(),
            settings.poll_interval,
            span,
        )),
        users: Arc::new(DieselUserRepository::new(pool, clock)),
    })
}
