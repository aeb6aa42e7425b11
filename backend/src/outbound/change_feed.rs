//! Write notifications shared by a store and its live subscriptions.
//!
//! Every successful write bumps a version counter; subscription feed tasks
//! wait on the counter and re-run their query when it moves. Receivers only
//! ever see the latest version, so bursts of writes collapse into one
//! refresh.

use std::sync::Arc;

use tokio::sync::watch;

/// Broadcasts "something changed" to every open subscription.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    version: Arc<watch::Sender<u64>>,
}

impl ChangeFeed {
    /// Create a feed at version zero.
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            version: Arc::new(version),
        }
    }

    /// Record a write.
    pub fn notify(&self) {
        self.version
            .send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Receiver woken after each [`ChangeFeed::notify`].
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
