use crate::models::UserId;
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TipEvent {
    pub user_id: UserId,
    pub tip: String,
}

/// Fire-and-forget fan-out of freshly generated tips.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<TipEvent>,
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TipEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn tip_generated(&self, event: TipEvent) -> usize {
        // no subscribers is fine
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
