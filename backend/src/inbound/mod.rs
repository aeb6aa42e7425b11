//! Inbound adapters that translate external traffic into domain calls while
//! keeping framework details at the edge.
//!
//! - [`http`]: health probes and domain error rendering.
//! - [`ws`]: the mini-app task board session.
//! - [`bot`]: long polling for the companion bot.
//! - [`shutdown`]: `SIGINT`/`SIGTERM` handling for both binaries.

pub mod bot;
pub mod http;
pub mod shutdown;
pub mod ws;
