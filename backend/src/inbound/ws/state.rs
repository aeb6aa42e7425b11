//! Shared WebSocket adapter state.
//!
//! Sessions depend on the task store port and the two context resolvers
//! rather than on concrete adapters, so tests can run the full session
//! against the in-process store.

use std::sync::Arc;

use url::{Origin, Url};

use crate::domain::ports::{TaskStore, UserRepository};
use crate::domain::{GroupContextResolver, IdentityResolver};

/// Origin of the platform's web client.
pub const PLATFORM_WEB_ORIGIN: &str = "https://web.telegram.org";

/// Origins permitted to open a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginAllowList {
    origins: Vec<Origin>,
}

impl OriginAllowList {
    /// Build the allow-list for a server listening on `port`.
    ///
    /// Always admits the platform web client and `http://localhost:<port>`;
    /// the mini-app origin and `extras` are added when given.
    pub fn new(webapp_url: Option<&Url>, extras: &[Url], port: u16) -> Self {
        let mut list = Self::default();
        if let Ok(platform) = Url::parse(PLATFORM_WEB_ORIGIN) {
            list.allow(&platform);
        }
        if let Ok(local) = Url::parse(&format!("http://localhost:{port}")) {
            list.allow(&local);
        }
        if let Some(webapp) = webapp_url {
            list.allow(webapp);
        }
        for extra in extras {
            list.allow(extra);
        }
        list
    }

    fn allow(&mut self, url: &Url) {
        let origin = url.origin();
        if origin.is_tuple() && !self.origins.contains(&origin) {
            self.origins.push(origin);
        }
    }

    /// Whether `origin` matches an allowed scheme, host and port.
    pub fn permits(&self, origin: &Url) -> bool {
        self.origins.contains(&origin.origin())
    }
}

/// Dependency bundle for WebSocket sessions.
#[derive(Clone)]
pub struct WsState {
    pub tasks: Arc<dyn TaskStore>,
    pub identities: IdentityResolver<dyn UserRepository>,
    pub groups: GroupContextResolver,
    pub origins: OriginAllowList,
}

impl WsState {
    /// Construct state from explicit port implementations.
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        identities: IdentityResolver<dyn UserRepository>,
        groups: GroupContextResolver,
        origins: OriginAllowList,
    ) -> Self {
        Self {
            tasks,
            identities,
            groups,
            origins,
        }
    }
}
