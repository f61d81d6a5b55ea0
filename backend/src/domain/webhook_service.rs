//! Webhook ingestion service.
//!
//! Verifies the shared-secret signature, decodes the event, applies it to
//! the source and query stores, tells the indexing service and pushes an
//! `update` notification on the sources topic. Reindex failures are logged
//! and never fail the delivery. `system.alert` deliveries are broadcast to
//! every session as `system_alert` frames.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::domain::ports::{
    NotificationPublisher, QueryRepository, ReindexAction, ReindexNotifier, SourceRepository,
    SourceRepositoryError, WebhookCommand, WebhookDelivery,
};
use crate::domain::{
    Error, Feedback, Notification, NotificationKind, SOURCES_TOPIC, Source, SourceId,
    WebhookEvent,
};

/// Signature policy for inbound webhooks.
#[derive(Clone, Default)]
pub struct WebhookSecurity {
    secret: Option<Zeroizing<String>>,
    enforce: bool,
}

impl WebhookSecurity {
    /// Build a policy. With `enforce` set, deliveries must carry a signature
    /// equal to `secret`; a missing secret then rejects everything.
    pub fn new(secret: Option<String>, enforce: bool) -> Self {
        Self {
            secret: secret.filter(|value| !value.is_empty()).map(Zeroizing::new),
            enforce,
        }
    }

    fn verify(&self, signature: Option<&str>) -> Result<(), Error> {
        if !self.enforce {
            return Ok(());
        }
        let Some(secret) = self.secret.as_deref() else {
            warn!("webhook secret is not configured; rejecting delivery");
            return Err(Error::unauthorized("Invalid webhook signature"));
        };
        let supplied = Sha256::digest(signature.unwrap_or_default().as_bytes());
        let expected = Sha256::digest(secret.as_bytes());
        let difference = supplied
            .iter()
            .zip(expected.iter())
            .fold(0_u8, |acc, (left, right)| acc | (left ^ right));
        if difference == 0 {
            Ok(())
        } else {
            Err(Error::unauthorized("Invalid webhook signature"))
        }
    }
}

/// Collaborators required by [`WebhookService`].
#[derive(Clone)]
pub struct WebhookServicePorts {
    /// Source storage.
    pub sources: Arc<dyn SourceRepository>,
    /// Query storage, for external feedback.
    pub queries: Arc<dyn QueryRepository>,
    /// Indexing service notifier.
    pub reindex: Arc<dyn ReindexNotifier>,
    /// Real-time push channel.
    pub notifications: Arc<dyn NotificationPublisher>,
}

/// Webhook service implementing [`WebhookCommand`].
#[derive(Clone)]
pub struct WebhookService {
    ports: WebhookServicePorts,
    security: WebhookSecurity,
    clock: Arc<dyn Clock>,
}

impl WebhookService {
    /// Create a new service.
    pub fn new(
        ports: WebhookServicePorts,
        security: WebhookSecurity,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ports,
            security,
            clock,
        }
    }

    fn map_source_error(error: SourceRepositoryError) -> Error {
        match error {
            SourceRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("source repository unavailable: {message}"))
            }
            SourceRepositoryError::Query { message } => {
                Error::internal(format!("source repository error: {message}"))
            }
        }
    }

    async fn notify_reindex(&self, source_id: &SourceId, action: ReindexAction) {
        if let Err(error) = self.ports.reindex.notify(source_id, action).await {
            warn!(%source_id, ?action, %error, "reindex notification failed");
        }
    }

    fn announce(&self, kind: &str, source_id: &SourceId) {
        self.ports.notifications.publish(Notification::to_topic(
            NotificationKind::Update,
            SOURCES_TOPIC,
            json!({ "event": kind, "sourceId": source_id }),
        ));
    }

    async fn apply(&self, event: WebhookEvent) -> Result<(), Error> {
        let kind = event.kind();
        match event {
            WebhookEvent::SourceUpdated {
                source_id,
                content,
                metadata,
            } => {
                match self
                    .ports
                    .sources
                    .find_by_id(&source_id)
                    .await
                    .map_err(Self::map_source_error)?
                {
                    Some(mut source) => {
                        source.mark_updated(content, metadata, self.clock.utc());
                        self.ports
                            .sources
                            .update(&source)
                            .await
                            .map_err(Self::map_source_error)?;
                    }
                    None => warn!(%source_id, "update for unknown source"),
                }
                self.notify_reindex(&source_id, ReindexAction::Update).await;
                self.announce(kind, &source_id);
            }
            WebhookEvent::SourceCreated(new) => {
                let source = Source::create(new, self.clock.utc());
                self.ports
                    .sources
                    .insert(&source)
                    .await
                    .map_err(Self::map_source_error)?;
                self.notify_reindex(&source.id, ReindexAction::Create).await;
                self.announce(kind, &source.id);
            }
            WebhookEvent::SourceDeleted { source_id } => {
                let removed = self
                    .ports
                    .sources
                    .delete(&source_id)
                    .await
                    .map_err(Self::map_source_error)?;
                if !removed {
                    warn!(%source_id, "delete for unknown source");
                }
                self.notify_reindex(&source_id, ReindexAction::Delete).await;
                self.announce(kind, &source_id);
            }
            WebhookEvent::QueryFeedback {
                query_id,
                rating,
                comment,
            } => {
                let record = self
                    .ports
                    .queries
                    .find_by_id(&query_id)
                    .await
                    .map_err(|err| Error::internal(format!("query repository error: {err}")))?;
                let Some(mut record) = record else {
                    warn!(%query_id, "feedback for unknown query");
                    return Ok(());
                };
                record.feedback = Some(Feedback {
                    rating,
                    comment: comment.unwrap_or_default(),
                    timestamp: self.clock.utc(),
                });
                self.ports
                    .queries
                    .update(&record)
                    .await
                    .map_err(|err| Error::internal(format!("query repository error: {err}")))?;
            }
            WebhookEvent::SystemAlert { message, priority } => {
                let mut data = json!({ "message": message });
                if let (Some(level), Some(fields)) = (priority, data.as_object_mut()) {
                    fields.insert("priority".to_owned(), level.into());
                }
                self.ports
                    .notifications
                    .publish(Notification::broadcast(NotificationKind::SystemAlert, data));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookCommand for WebhookService {
    async fn handle(&self, delivery: WebhookDelivery) -> Result<(), Error> {
        self.security.verify(delivery.signature.as_deref())?;
        let event = WebhookEvent::parse(&delivery.kind, delivery.payload)?;
        let kind = event.kind();
        self.apply(event).await?;
        info!(webhook_type = kind, "webhook processed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "webhook_service_tests.rs"]
mod tests;
