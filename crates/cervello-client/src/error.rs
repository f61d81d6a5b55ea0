//! Error types for the client runtime.
//!
//! Each concern gets its own `thiserror` enum: the push channel reports
//! [`ConnectError`], cached fetches report [`FetchError`] and typed API calls
//! report [`ApiError`].

use serde_json::Value;
use thiserror::Error;

/// Failures raised by a WebSocket transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The handshake did not complete.
    #[error("failed to connect to {url}: {message}")]
    Handshake {
        /// Endpoint that was dialled.
        url: String,
        /// Transport message.
        message: String,
    },
    /// The socket failed after it was opened.
    #[error("websocket transport error: {message}")]
    Transport {
        /// Transport message.
        message: String,
    },
}

impl ConnectError {
    /// Handshake failure for `url`.
    pub fn handshake(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handshake {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Transport failure on an open socket.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Failures surfaced by the fetch wrapper.
///
/// Clonable so one in-flight request can resolve every caller that shares it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("Error {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response text, or the status reason when the body was empty.
        body: String,
    },
    /// The request did not finish within the configured deadline.
    #[error("Request timed out after {after_ms}ms")]
    Timeout {
        /// Deadline in milliseconds.
        after_ms: u64,
    },
    /// A newer request for the same key replaced this one, or it was
    /// aborted explicitly.
    #[error("request aborted")]
    Aborted,
    /// The request never reached the server.
    #[error("network error: {message}")]
    Network {
        /// Transport message.
        message: String,
    },
    /// The request could not be built.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Builder message.
        message: String,
    },
}

impl FetchError {
    /// Whether this error should stay out of the visible fetch state.
    #[must_use]
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Error returned by [`crate::ApiClient`] calls.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status, absent for network failures.
    pub status: Option<u16>,
    /// Human-readable message taken from the error body when present.
    pub message: String,
    /// Decoded response body.
    pub data: Value,
}

impl ApiError {
    /// Error for a request that produced no HTTP response.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            data: Value::Null,
        }
    }

    /// Whether the request failed before any HTTP status was received.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        self.status.is_none()
    }

    /// Whether the server reported a missing or expired session.
    #[must_use]
    pub fn is_unauthorised(&self) -> bool {
        self.status == Some(401)
    }
}

impl From<FetchError> for ApiError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Status { status, body } => Self {
                status: Some(status),
                message: format!("API Error: {status}"),
                data: Value::String(body),
            },
            other => Self::network(other.to_string()),
        }
    }
}
