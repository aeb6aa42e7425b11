//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **realtime**: in-process task and user collections
//! - **persistence**: PostgreSQL-backed adapters using Diesel ORM
//! - **store**: picks and initialises one of the two at start-up
//! - **telegram**: Bot API client for the companion bot
//!
//! Adapters are thin translators between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod change_feed;
pub mod persistence;
pub mod realtime;
pub mod store;
pub mod telegram;
