//! Reqwest-backed `ReindexNotifier`.
//!
//! Posts `{sourceId, action}` to `{api_base_url}/reindex`. The webhook
//! service logs failures and carries on, so this adapter only reports them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;

use crate::domain::SourceId;
use crate::domain::ports::{ReindexAction, ReindexNotifier, ReindexNotifierError};

/// Deadline for a single reindex notification.
pub const DEFAULT_REINDEX_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReindexRequestDto {
    source_id: SourceId,
    action: ReindexAction,
}

/// Notifier posting to the indexing service.
pub struct HttpReindexNotifier {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpReindexNotifier {
    /// Build a notifier for the service rooted at `api_base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ReindexNotifierError::Transport`] when the base URL cannot
    /// be extended or the reqwest client cannot be constructed.
    pub fn new(
        api_base_url: &Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ReindexNotifierError> {
        let endpoint = reindex_endpoint(api_base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ReindexNotifierError::transport(err.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }
}

/// Append `/reindex` to the base URL, keeping any existing path.
fn reindex_endpoint(base: &Url) -> Result<Url, ReindexNotifierError> {
    let mut endpoint = base.clone();
    endpoint
        .path_segments_mut()
        .map_err(|()| ReindexNotifierError::transport(format!("cannot extend base URL {base}")))?
        .pop_if_empty()
        .push("reindex");
    Ok(endpoint)
}

#[async_trait]
impl ReindexNotifier for HttpReindexNotifier {
    async fn notify(
        &self,
        source_id: &SourceId,
        action: ReindexAction,
    ) -> Result<(), ReindexNotifierError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(&ReindexRequestDto {
            source_id: *source_id,
            action,
        });
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ReindexNotifierError::transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReindexNotifierError::status(status.as_u16()));
        }
        debug!(%source_id, ?action, "reindex notification accepted");
        Ok(())
    }
}
