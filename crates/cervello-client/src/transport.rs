//! HTTP transport port and its reqwest implementation.
//!
//! The fetch wrapper and the API client build [`HttpRequest`] values and hand
//! them to an [`HttpTransport`]; tests swap in scripted transports.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::FetchError;

/// HTTP verbs used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

/// Header name and value added to every request.
pub const JSON_CONTENT_TYPE: (&str, &str) = ("Content-Type", "application/json");

/// Request handed to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Verb.
    pub method: Method,
    /// Absolute target.
    pub url: Url,
    /// Headers, including `Content-Type`.
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// JSON request; caller headers win over the default `Content-Type`.
    #[must_use]
    pub fn json(
        method: Method,
        url: Url,
        headers: &BTreeMap<String, String>,
        body: Option<Value>,
    ) -> Self {
        let mut merged = BTreeMap::from([(
            JSON_CONTENT_TYPE.0.to_owned(),
            JSON_CONTENT_TYPE.1.to_owned(),
        )]);
        merged.extend(headers.iter().map(|(name, value)| (name.clone(), value.clone())));
        Self {
            method,
            url,
            headers: merged,
            body,
        }
    }
}

/// Response read from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// `Content-Type` header, if sent.
    pub content_type: Option<String>,
    /// Raw body text.
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Whether the body should be parsed as JSON.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|value| value.contains("application/json"))
    }

    /// JSON value when the body is JSON, otherwise the text as a string.
    #[must_use]
    pub fn decoded_body(&self) -> Value {
        if self.is_json() {
            serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
        } else {
            Value::String(self.body.clone())
        }
    }
}

/// Executes HTTP requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform `request` and read the whole body.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FetchError>;
}

/// Transport backed by a shared `reqwest::Client` with a cookie store, so
/// the backend session survives across calls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidRequest`] when the client cannot be
    /// constructed.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| FetchError::InvalidRequest {
                message: err.to_string(),
            })?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            FetchError::Network {
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;
        let mut builder = self.client.request(method.into(), url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &body {
            builder = builder.json(payload);
        }
        let response = builder.send().await.map_err(|err| self.map_error(&err))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let text = response.text().await.map_err(|err| self.map_error(&err))?;
        Ok(HttpResponse {
            status,
            content_type,
            body: text,
        })
    }
}
