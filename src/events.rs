//! State-change notifications for embedding shells.
//!
//! The reconciler publishes a [`StateChange`] on every transition; shells
//! subscribe and re-render from the latest payload. Sends are
//! fire-and-forget — a shell that is not listening misses nothing it cannot
//! rebuild from the next snapshot.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::backend::Role;

/// Payload published on every reconciler transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub phase: String,
    pub attempt: u64,
    pub retry_count: u32,
    pub authenticated_email: Option<String>,
    pub role: Option<Role>,
    pub show_login: bool,
    pub error: Option<String>,
}

/// Broadcasts state changes to every subscribed shell.
#[derive(Clone)]
pub struct StateBroadcaster {
    tx: broadcast::Sender<StateChange>,
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish a transition. No subscribers is fine.
    pub fn publish(&self, change: StateChange) {
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.tx.subscribe()
    }
}
