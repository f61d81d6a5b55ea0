//! Google OAuth 2.0 `IdentityProvider`.
//!
//! Implements the authorisation-code flow: build the consent URL, exchange
//! the returned code for an access token, then read the OpenID userinfo.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::domain::ports::{ExternalIdentity, IdentityProvider, IdentityProviderError};

/// Deadline for each call to Google.
pub const DEFAULT_OAUTH_TIMEOUT: Duration = Duration::from_secs(10);

const SCOPES: &str = "openid email profile";

/// Google endpoints; overridable so tests can point at a local listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleEndpoints {
    /// Consent screen.
    pub authorize: Url,
    /// Code-for-token exchange.
    pub token: Url,
    /// OpenID userinfo.
    pub userinfo: Url,
}

impl GoogleEndpoints {
    /// Production endpoints.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the URLs are constants.
    pub fn google() -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize: Url::parse("https://accounts.google.com/o/oauth2/v2/auth")?,
            token: Url::parse("https://oauth2.googleapis.com/token")?,
            userinfo: Url::parse("https://openidconnect.googleapis.com/v1/userinfo")?,
        })
    }
}

/// Client credentials registered with Google.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Callback URL registered for this client.
    pub redirect_url: Url,
}

/// Google sign-in adapter.
pub struct GoogleIdentityProvider {
    client: Client,
    credentials: GoogleCredentials,
    endpoints: GoogleEndpoints,
}

#[derive(Debug, Deserialize)]
struct TokenResponseDto {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfoDto {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl GoogleIdentityProvider {
    /// Build the adapter.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        credentials: GoogleCredentials,
        endpoints: GoogleEndpoints,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            endpoints,
        })
    }

    async fn access_token(&self, code: &str) -> Result<String, IdentityProviderError> {
        let response = self
            .client
            .post(self.endpoints.token.clone())
            .form(&[
                ("code", code),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|err| IdentityProviderError::exchange(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityProviderError::exchange(format!(
                "token endpoint returned {}",
                status.as_u16()
            )));
        }
        let token: TokenResponseDto = response
            .json()
            .await
            .map_err(|err| IdentityProviderError::exchange(err.to_string()))?;
        Ok(token.access_token)
    }

    async fn user_info(&self, access_token: &str) -> Result<UserInfoDto, IdentityProviderError> {
        let response = self
            .client
            .get(self.endpoints.userinfo.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| IdentityProviderError::profile(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityProviderError::profile(format!(
                "userinfo endpoint returned {}",
                status.as_u16()
            )));
        }
        response
            .json()
            .await
            .map_err(|err| IdentityProviderError::profile(err.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<String, IdentityProviderError> {
        let mut url = self.endpoints.authorize.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", self.credentials.redirect_url.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("prompt", "select_account");
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, IdentityProviderError> {
        let token = self.access_token(code).await?;
        let info = self.user_info(&token).await?;
        let email = info
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| IdentityProviderError::profile("profile has no email address"))?;
        debug!(subject = info.sub.as_str(), "google identity resolved");

        Ok(ExternalIdentity {
            subject: info.sub,
            email,
            email_verified: info.email_verified,
            name: info.name,
            image: info.picture,
        })
    }
}
