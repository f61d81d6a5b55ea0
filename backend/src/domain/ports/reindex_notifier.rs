//! Port telling the indexing service that a source changed.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::SourceId;

use super::define_port_error;

define_port_error! {
    /// Reindex notification failures. Callers log these and carry on.
    pub enum ReindexNotifierError {
        /// The request never produced a response.
        Transport { message: String } => "reindex request failed: {message}",
        /// The indexing service rejected the request.
        Status { status: u16 } => "reindex service returned {status}",
    }
}

/// What happened to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReindexAction {
    /// Index a new source.
    Create,
    /// Re-index changed content.
    Update,
    /// Drop the source from the index.
    Delete,
}

/// Notifies the indexing service about source lifecycle changes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReindexNotifier: Send + Sync {
    /// Send one notification.
    async fn notify(
        &self,
        source_id: &SourceId,
        action: ReindexAction,
    ) -> Result<(), ReindexNotifierError>;
}

/// Notifier used when no indexing service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledReindexNotifier;

#[async_trait]
impl ReindexNotifier for DisabledReindexNotifier {
    async fn notify(
        &self,
        source_id: &SourceId,
        action: ReindexAction,
    ) -> Result<(), ReindexNotifierError> {
        tracing::debug!(%source_id, ?action, "reindex notifier disabled; skipping");
        Ok(())
    }
}
