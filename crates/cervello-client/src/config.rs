//! Client configuration loaded via OrthoConfig.
//!
//! Values come from configuration files, `CERVELLO_CLIENT_*` environment
//! variables and command-line flags, in that order of precedence.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_DEDUPE_INTERVAL_MS: u64 = 2_000;

/// A configured URL that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid URL for {name} '{value}': {message}")]
pub struct ClientConfigError {
    /// Setting name.
    pub name: &'static str,
    /// Raw value.
    pub value: String,
    /// Parser message.
    pub message: String,
}

/// Runtime settings for the client.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CERVELLO_CLIENT")]
pub struct ClientConfig {
    /// REST base URL, including the `/api` prefix.
    pub api_base_url: Option<String>,
    /// Push channel endpoint.
    pub ws_url: Option<String>,
    /// Per-request deadline in milliseconds.
    #[ortho_config(default = 30_000)]
    pub request_timeout_ms: u64,
    /// Window in which identical fetches share one request.
    #[ortho_config(default = 2_000)]
    pub dedupe_interval_ms: u64,
    /// Age after which cached data is refreshed in the background; 0 disables.
    pub revalidate_interval_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            ws_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            dedupe_interval_ms: DEFAULT_DEDUPE_INTERVAL_MS,
            revalidate_interval_ms: None,
        }
    }
}

fn parse_url(name: &'static str, configured: Option<&String>, fallback: &str) -> Result<Url, ClientConfigError> {
    let raw = configured
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(fallback);
    Url::parse(raw).map_err(|err| ClientConfigError {
        name,
        value: raw.to_owned(),
        message: err.to_string(),
    })
}

impl ClientConfig {
    /// REST base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientConfigError`] when the value does not parse.
    pub fn api_base_url(&self) -> Result<Url, ClientConfigError> {
        parse_url("api_base_url", self.api_base_url.as_ref(), DEFAULT_API_BASE_URL)
    }

    /// Push channel endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientConfigError`] when the value does not parse.
    pub fn ws_url(&self) -> Result<Url, ClientConfigError> {
        parse_url("ws_url", self.ws_url.as_ref(), DEFAULT_WS_URL)
    }

    /// Request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Fetch dedupe window.
    #[must_use]
    pub const fn dedupe_interval(&self) -> Duration {
        Duration::from_millis(self.dedupe_interval_ms)
    }

    /// Background revalidation age, if enabled.
    #[must_use]
    pub fn revalidate_interval(&self) -> Option<Duration> {
        self.revalidate_interval_ms
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }
}
