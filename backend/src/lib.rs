//! Group-scoped task board backend.
//!
//! The domain layer holds the board components and their ports; inbound
//! adapters serve the mini-app session, health probes and the companion bot;
//! outbound adapters implement the realtime task store and the bot API.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

pub use middleware::Trace;
