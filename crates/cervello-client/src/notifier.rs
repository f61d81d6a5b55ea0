//! User-facing notices raised by the client runtime.

use tracing::{error, info};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Something finished well.
    Success,
    /// Something went wrong.
    Error,
}

/// Surface for toasts, banners or logs.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Show `message` at `level`.
    fn notify(&self, level: NoticeLevel, message: &str);

    /// Shorthand for a success notice.
    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    /// Shorthand for an error notice.
    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Default notifier writing through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => info!(notice = message, "client notice"),
            NoticeLevel::Error => error!(notice = message, "client notice"),
        }
    }
}
