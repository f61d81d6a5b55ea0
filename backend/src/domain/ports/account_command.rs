//! Driving port for account mutations: registration, sign-in and profile
//! edits.

use async_trait::async_trait;

use crate::domain::{Error, LoginCredentials, Registration, SessionIdentity, User};

/// Profile fields a user may edit; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New avatar URL.
    pub image: Option<String>,
}

/// Account use-cases invoked by the HTTP adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountCommand: Send + Sync {
    /// Create a credential account. Fails with `409` when the email is taken.
    async fn register(&self, registration: Registration) -> Result<User, Error>;

    /// Verify email/password credentials and record the sign-in.
    async fn login(&self, credentials: LoginCredentials) -> Result<User, Error>;

    /// Authorisation URL for the third-party sign-in flow.
    fn oauth_authorization_url(&self, state: &str) -> Result<String, Error>;

    /// Finish the third-party sign-in flow, creating or updating the user.
    async fn complete_oauth(&self, code: &str) -> Result<User, Error>;

    /// Apply profile edits for the signed-in user.
    async fn update_profile(
        &self,
        identity: &SessionIdentity,
        update: ProfileUpdate,
    ) -> Result<User, Error>;
}
