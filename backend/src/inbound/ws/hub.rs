//! Fan-out of domain notifications to connected WebSocket sessions.
//!
//! Services publish through the [`NotificationPublisher`] port; every session
//! holds a broadcast receiver and filters events by its own subscriptions.
//! Publishing never blocks: with no sessions attached the event is dropped,
//! and slow sessions observe a lag instead of stalling producers.

use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::Notification;
use crate::domain::ports::NotificationPublisher;

/// Default number of buffered events per receiver.
pub const DEFAULT_HUB_CAPACITY: usize = 256;

/// Broadcast hub shared by the WebSocket adapter and domain services.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    /// Create a hub buffering up to `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach a new receiver; it sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Number of attached receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

impl NotificationPublisher for NotificationHub {
    fn publish(&self, notification: Notification) {
        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(notification) {
            trace!(kind = ?dropped.kind, "no websocket sessions attached; dropping notification");
        }
    }
}
