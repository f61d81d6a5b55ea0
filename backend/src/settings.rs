//! Server configuration loaded via OrthoConfig.
//!
//! Values are layered from configuration files, `CERVELLO_*` environment
//! variables and command-line flags. Session cookie settings are read
//! separately (see [`crate::inbound::http::session_config`]).

use std::net::SocketAddr;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RAG_URL: &str = "http://127.0.0.1:8000/llm-query";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Errors raised when a configured value cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// The bind address is not `host:port`.
    #[error("invalid bind address '{value}': {message}")]
    BindAddr { value: String, message: String },
    /// A URL setting does not parse.
    #[error("invalid URL for {name} '{value}': {message}")]
    Url {
        name: &'static str,
        value: String,
        message: String,
    },
}

/// Runtime settings for the backend.
#[derive(Debug, Clone, Default, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CERVELLO")]
pub struct CervelloSettings {
    /// Listen address, `host:port`.
    pub bind_addr: Option<String>,
    /// PostgreSQL URL; in-memory repositories are used when absent.
    pub database_url: Option<String>,
    /// Answer service endpoint.
    pub rag_url: Option<String>,
    /// Indexing service base URL; `/reindex` is appended.
    pub api_base_url: Option<String>,
    /// Bearer token for the answer and indexing services.
    pub api_key: Option<String>,
    /// Comma-separated WebSocket origins allowed in addition to localhost.
    pub ws_allowed_origins: Option<String>,
    /// Shared secret expected in `x-webhook-signature`.
    pub webhook_secret: Option<String>,
    /// Reject webhooks whose signature does not match.
    #[ortho_config(default = false)]
    pub enforce_webhook_signature: bool,
    /// Google OAuth client id.
    pub google_client_id: Option<String>,
    /// Google OAuth client secret.
    pub google_client_secret: Option<String>,
    /// Google OAuth callback URL.
    pub oauth_redirect_url: Option<String>,
    /// Overrides `SESSION_COOKIE_SECURE` when set.
    pub cookie_secure: Option<bool>,
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, SettingsError> {
    Url::parse(value).map_err(|err| SettingsError::Url {
        name,
        value: value.to_owned(),
        message: err.to_string(),
    })
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|raw| !raw.is_empty())
}

impl CervelloSettings {
    /// Socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::BindAddr`] when the value does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let raw = non_blank(self.bind_addr.as_ref()).unwrap_or(DEFAULT_BIND_ADDR);
        raw.parse().map_err(|err: std::net::AddrParseError| SettingsError::BindAddr {
            value: raw.to_owned(),
            message: err.to_string(),
        })
    }

    /// Database URL, if persistence is configured.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        non_blank(self.database_url.as_ref())
    }

    /// Answer service endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Url`] when the value does not parse.
    pub fn rag_url(&self) -> Result<Url, SettingsError> {
        parse_url(
            "rag_url",
            non_blank(self.rag_url.as_ref()).unwrap_or(DEFAULT_RAG_URL),
        )
    }

    /// Indexing service base URL.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Url`] when the value does not parse.
    pub fn api_base_url(&self) -> Result<Url, SettingsError> {
        parse_url(
            "api_base_url",
            non_blank(self.api_base_url.as_ref()).unwrap_or(DEFAULT_API_BASE_URL),
        )
    }

    /// Bearer token for outbound services.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        non_blank(self.api_key.as_ref()).map(str::to_owned)
    }

    /// Extra WebSocket origins, split on commas.
    #[must_use]
    pub fn ws_allowed_origins(&self) -> Vec<String> {
        self.ws_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Webhook shared secret.
    #[must_use]
    pub fn webhook_secret(&self) -> Option<String> {
        non_blank(self.webhook_secret.as_ref()).map(str::to_owned)
    }

    /// Google OAuth settings, when all three values are present.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Url`] when the redirect URL does not parse.
    pub fn google_oauth(&self) -> Result<Option<(String, String, Url)>, SettingsError> {
        let (Some(id), Some(secret), Some(redirect)) = (
            non_blank(self.google_client_id.as_ref()),
            non_blank(self.google_client_secret.as_ref()),
            non_blank(self.oauth_redirect_url.as_ref()),
        ) else {
            return Ok(None);
        };
        let redirect = parse_url("oauth_redirect_url", redirect)?;
        Ok(Some((id.to_owned(), secret.to_owned(), redirect)))
    }
}
