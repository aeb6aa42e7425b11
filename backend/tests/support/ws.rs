//! WebSocket-focused test helpers.
//!
//! Integration tests under `backend/tests/` compile as separate crates, so
//! sharing small WebSocket setup helpers helps avoid copy/paste drift.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use taskboard::domain::ports::{TaskStore, UserRepository};
use taskboard::domain::{GroupContextResolver, IdentityResolver, RunMode};
use taskboard::inbound::ws::{OriginAllowList, WsState};
use taskboard::outbound::realtime::{InMemoryTaskStore, InMemoryUserRepository};
use tracing::Span;
use url::Url;

/// Mini-app origin used by the test allow-list.
pub const WEBAPP_URL: &str = "https://tasks.example.com/app";

/// Port the test allow-list treats as the local server port.
pub const LOCAL_PORT: u16 = 3000;

/// Build a `WsState` over the in-process stores.
///
/// This helper hides the resolver and store wiring and keeps setup
/// consistent across integration test crates.
pub fn ws_state(mode: RunMode) -> WsState {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let tasks: Arc<dyn TaskStore> =
        Arc::new(InMemoryTaskStore::new(Arc::clone(&clock), Span::none()));
    let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
    let webapp = Url::parse(WEBAPP_URL).expect("webapp url");
    WsState::new(
        tasks,
        IdentityResolver::new(users, clock, mode, Span::none()),
        GroupContextResolver::new(mode, Span::none()),
        OriginAllowList::new(Some(&webapp), &[], LOCAL_PORT),
    )
}
