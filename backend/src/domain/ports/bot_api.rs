//! Driven port for the messaging platform's bot API.

use async_trait::async_trait;

use crate::domain::{BotUpdate, OutgoingMessage};

use super::define_port_error;

define_port_error! {
    /// Errors raised by bot API adapters.
    pub enum BotApiError {
        /// The API could not be reached.
        Transport { message: String } => "bot api transport failed: {message}",
        /// The API answered with an error description.
        Rejected { message: String } => "bot api rejected the request: {message}",
    }
}

/// Port for receiving updates and sending replies.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Long-poll for updates with an id of at least `offset`.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<BotUpdate>, BotApiError>;

    /// Send one message.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), BotApiError>;
}
