//! Port for third-party OAuth sign-in.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// OAuth provider failures.
    pub enum IdentityProviderError {
        /// Client id, secret or redirect URL are missing.
        NotConfigured => "identity provider is not configured",
        /// The authorisation code could not be exchanged for a token.
        Exchange { message: String } => "authorisation code exchange failed: {message}",
        /// The user profile could not be fetched.
        Profile { message: String } => "identity profile lookup failed: {message}",
    }
}

/// Identity asserted by the provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Provider-specific subject id.
    pub subject: String,
    /// Email address as reported by the provider.
    pub email: String,
    /// Whether the provider verified the email.
    pub email_verified: bool,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub image: Option<String>,
}

/// Third-party sign-in provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorisation URL the browser is sent to, carrying the CSRF `state`.
    fn authorization_url(&self, state: &str) -> Result<String, IdentityProviderError>;

    /// Exchange an authorisation code for the signed-in identity.
    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, IdentityProviderError>;
}

/// Provider used when OAuth credentials are absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledIdentityProvider;

#[async_trait]
impl IdentityProvider for DisabledIdentityProvider {
    fn authorization_url(&self, _state: &str) -> Result<String, IdentityProviderError> {
        Err(IdentityProviderError::not_configured())
    }

    async fn exchange(&self, _code: &str) -> Result<ExternalIdentity, IdentityProviderError> {
        Err(IdentityProviderError::not_configured())
    }
}
