//! Typed client for the backend REST API.
//!
//! ```text
//! GET  {base}/auth/session        -> SessionUser
//! PUT  {base}/auth/preferences    -> Preferences
//! POST {base}/qa {"question":..}  -> answer JSON
//! ```
//!
//! Every call is JSON, bounded by the configured timeout, and maps failures
//! into [`ApiError`]: the message comes from the body's `message` or `error`
//! field when present.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};
use url::Url;

use crate::config::{ClientConfig, ClientConfigError};
use crate::error::{ApiError, FetchError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};

/// Header naming the webhook event type.
pub const WEBHOOK_TYPE_HEADER: &str = "x-webhook-type";

/// Onboarding persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Software developer.
    Developer,
    /// Teacher or educator.
    Teacher,
    /// Business user.
    Business,
    /// Researcher.
    Researcher,
}

/// Colour scheme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light mode.
    Light,
    /// Dark mode.
    Dark,
    /// Follow the operating system.
    #[default]
    System,
}

/// Signed-in user as returned by `/auth/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// User id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Avatar URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Access role.
    #[serde(default)]
    pub role: Option<String>,
    /// Onboarding persona.
    #[serde(default)]
    pub persona: Option<Persona>,
    /// Whether onboarding is complete.
    #[serde(default)]
    pub onboarded: bool,
}

/// Profile with usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Identity fields.
    #[serde(flatten)]
    pub user: SessionUser,
    /// When the email was verified.
    #[serde(default)]
    pub email_verified: Option<String>,
    /// Last sign-in.
    #[serde(default)]
    pub last_login: Option<String>,
    /// Number of sign-ins.
    #[serde(default)]
    pub login_count: u32,
    /// Number of questions asked.
    #[serde(default)]
    pub query_count: u32,
}

/// Profile edit; omitted fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New avatar URL; empty clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Answer-presentation preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Colour scheme.
    pub theme: Theme,
    /// Push notifications.
    pub notifications: bool,
    /// Show cited sources.
    pub show_sources: bool,
    /// Include code snippets.
    pub code_snippets: bool,
    /// Use technical vocabulary.
    pub technical_terms: bool,
    /// Prefer simple explanations.
    pub simplified_explanations: bool,
    /// Suggest learning material.
    pub educational_resources: bool,
    /// Keep question history.
    pub query_saving: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            notifications: true,
            show_sources: true,
            code_snippets: false,
            technical_terms: false,
            simplified_explanations: false,
            educational_resources: false,
            query_saving: true,
        }
    }
}

impl Preferences {
    /// Copy with the fields set in `patch` replaced.
    #[must_use]
    pub fn merged(&self, patch: &PreferencesPatch) -> Self {
        Self {
            theme: patch.theme.unwrap_or(self.theme),
            notifications: patch.notifications.unwrap_or(self.notifications),
            show_sources: patch.show_sources.unwrap_or(self.show_sources),
            code_snippets: patch.code_snippets.unwrap_or(self.code_snippets),
            technical_terms: patch.technical_terms.unwrap_or(self.technical_terms),
            simplified_explanations: patch
                .simplified_explanations
                .unwrap_or(self.simplified_explanations),
            educational_resources: patch
                .educational_resources
                .unwrap_or(self.educational_resources),
            query_saving: patch.query_saving.unwrap_or(self.query_saving),
        }
    }
}

/// Partial preferences update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "fields mirror Preferences")]
pub struct PreferencesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_sources: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippets: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_terms: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplified_explanations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub educational_resources: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_saving: Option<bool>,
}

/// Page selection for history listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Items per page.
    pub limit: u32,
    /// One-based page number.
    pub page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 20, page: 1 }
    }
}

fn error_message(status: u16, body: &Value) -> String {
    ["message", "error"]
        .iter()
        .find_map(|field| body.get(*field).and_then(Value::as_str))
        .map_or_else(
            || {
                let reason = reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|code| code.canonical_reason());
                match reason {
                    Some(text) => format!("API Error: {text}"),
                    None => format!("API Error: {status}"),
                }
            },
            str::to_owned,
        )
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    let body = if response.body.trim().is_empty() {
        Value::Null
    } else {
        response.decoded_body()
    };
    if !response.is_success() {
        return Err(ApiError {
            status: Some(response.status),
            message: error_message(response.status, &body),
            data: body,
        });
    }
    serde_json::from_value(body.clone()).map_err(|err| ApiError {
        status: Some(response.status),
        message: format!("Unexpected response body: {err}"),
        data: body,
    })
}

/// REST client sharing one transport, and so one cookie jar, across calls.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl ApiClient {
    /// Client for endpoints under `base`.
    #[must_use]
    pub fn new(base: Url, transport: Arc<dyn HttpTransport>, timeout: Duration) -> Self {
        Self {
            base,
            transport,
            timeout,
        }
    }

    /// Client over a cookie-keeping reqwest transport.
    ///
    /// # Errors
    ///
    /// Returns [`ClientConfigError`] when the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientConfigError> {
        let timeout = config.request_timeout();
        let transport = ReqwestTransport::new(timeout).map_err(|err| ClientConfigError {
            name: "request_timeout_ms",
            value: timeout.as_millis().to_string(),
            message: err.to_string(),
        })?;
        Ok(Self::new(config.api_base_url()?, Arc::new(transport), timeout))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|err| ApiError {
            status: None,
            message: format!("invalid endpoint {joined}: {err}"),
            data: Value::Null,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        headers: &BTreeMap<String, String>,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        debug!(?method, %url, "api request");
        let request = HttpRequest::json(method, url, headers, body);
        let response = tokio::time::timeout(self.timeout, self.transport.execute(request))
            .await
            .map_err(|_| FetchError::Timeout {
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })
            .and_then(|outcome| outcome)
            .map_err(|err| {
                warn!(?method, path, error = %err, "api request failed");
                ApiError::from(err)
            })?;
        decode(&response)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.call(Method::Get, path, &BTreeMap::new(), None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let payload = serde_json::to_value(body).map_err(|err| ApiError {
            status: None,
            message: format!("request body could not be encoded: {err}"),
            data: Value::Null,
        })?;
        self.call(method, path, &BTreeMap::new(), Some(payload)).await
    }

    /// Current session user.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] with status 401 when not signed in.
    pub async fn session(&self) -> Result<SessionUser, ApiError> {
        self.get("auth/session").await
    }

    /// Credential sign-in.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] with status 401 on bad credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, ApiError> {
        self.send(
            Method::Post,
            "auth/login",
            &json!({ "email": email, "password": password }),
        )
        .await
    }

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.call::<Value>(Method::Post, "auth/logout", &BTreeMap::new(), None)
            .await
            .map(drop)
    }

    /// Profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.get("auth/profile").await
    }

    /// Update name or avatar.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        self.send(Method::Put, "auth/profile", update).await
    }

    /// Stored preferences, defaults filled in.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn preferences(&self) -> Result<Preferences, ApiError> {
        self.get("auth/preferences").await
    }

    /// Persist a partial preferences update.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn update_preferences(&self, patch: &PreferencesPatch) -> Result<Preferences, ApiError> {
        self.send(Method::Put, "auth/preferences", patch).await
    }

    /// Record the onboarding persona.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] with status 400 for personas the backend does
    /// not offer during onboarding.
    pub async fn save_role(&self, persona: Persona) -> Result<Value, ApiError> {
        self.send(Method::Post, "auth/onboarding", &json!({ "role": persona }))
            .await
    }

    /// Ask a question.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the question is empty, the user is not
    /// signed in, or the answer could not be produced.
    pub async fn ask(&self, question: &str, context: Option<&str>) -> Result<Value, ApiError> {
        self.send(
            Method::Post,
            "qa",
            &json!({ "question": question, "context": context }),
        )
        .await
    }

    /// One page of question history.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn history(&self, page: Page) -> Result<Value, ApiError> {
        self.get(&format!("qa/history?limit={}&page={}", page.limit, page.page))
            .await
    }

    /// One stored query.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] with status 404 or 403 for missing or foreign
    /// queries.
    pub async fn query(&self, id: &str) -> Result<Value, ApiError> {
        self.get(&format!("qa/{id}")).await
    }

    /// Rate an answer from 1 to 5.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the rating is rejected.
    pub async fn submit_feedback(
        &self,
        id: &str,
        rating: u8,
        comment: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.send(
            Method::Put,
            &format!("qa/{id}"),
            &json!({ "rating": rating, "comment": comment }),
        )
        .await
    }

    /// Delete one query.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn delete_query(&self, id: &str) -> Result<Value, ApiError> {
        self.call(Method::Delete, &format!("qa/{id}"), &BTreeMap::new(), None)
            .await
    }

    /// Delete the caller's whole history.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the request fails.
    pub async fn clear_history(&self) -> Result<Value, ApiError> {
        self.call(Method::Delete, "qa/history", &BTreeMap::new(), None)
            .await
    }

    /// Forward an indexing-pipeline event.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] when the backend rejects the event.
    pub async fn notify_webhook(&self, event_type: &str, data: Value) -> Result<Value, ApiError> {
        let headers = BTreeMap::from([(WEBHOOK_TYPE_HEADER.to_owned(), event_type.to_owned())]);
        self.call(Method::Post, "webhooks", &headers, Some(data)).await
    }
}
