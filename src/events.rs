// Publish/subscribe bus for session and wishlist changes

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MarketEvent {
    LoginChanged { role: Option<Role>, name: Option<String> },
    LoggedOut,
    // vehicle_id is unknown when an entry is removed by its own id
    WishlistUpdated { vehicle_id: Option<String> },
    InventoryChanged { vehicle_id: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MarketEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers received the event; zero is not an error.
    pub fn publish(&self, event: MarketEvent) -> usize {
        tracing::debug!(?event, "Publishing marketplace event");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(32)
    }
}
