//! Driving port for inbound webhook deliveries.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Error;

/// Raw webhook delivery as received over HTTP.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookDelivery {
    /// Value of the `x-webhook-signature` header.
    pub signature: Option<String>,
    /// Value of the `x-webhook-type` header.
    pub kind: String,
    /// JSON body.
    pub payload: Value,
}

/// Webhook handling invoked by the HTTP adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookCommand: Send + Sync {
    /// Verify, decode and apply one delivery.
    async fn handle(&self, delivery: WebhookDelivery) -> Result<(), Error>;
}
