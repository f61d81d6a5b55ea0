//! Port used by services to push real-time notifications.

use crate::domain::Notification;

/// Fan-out of notifications to connected sessions.
///
/// Publishing never fails: a notification with no listening session is
/// simply dropped.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationPublisher: Send + Sync {
    /// Publish one notification.
    fn publish(&self, notification: Notification);
}

/// Publisher that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotificationPublisher;

impl NotificationPublisher for NullNotificationPublisher {
    fn publish(&self, notification: Notification) {
        tracing::trace!(kind = ?notification.kind, "dropping notification");
    }
}
