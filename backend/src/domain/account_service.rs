//! Account domain service: registration, credential and OAuth sign-in,
//! session lookups and profile maintenance.
//!
//! Password hashing runs on the blocking pool so bcrypt never stalls an
//! actix worker.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::domain::ports::{
    AccountCommand, AccountQuery, IdentityProvider, IdentityProviderError, ProfileUpdate,
    UserRepository, UserRepositoryError,
};
use crate::domain::{
    EmailAddress, Error, LoginCredentials, Registration, SessionIdentity, User, UserId,
};

/// bcrypt work factor used for new password hashes.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Account service implementing the account driving ports.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    bcrypt_cost: u32,
}

impl AccountService {
    /// Create a service hashing passwords with [`DEFAULT_BCRYPT_COST`].
    pub fn new(
        users: Arc<dyn UserRepository>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            identity,
            clock,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Override the bcrypt work factor.
    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn map_user_error(error: UserRepositoryError) -> Error {
        match error {
            UserRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("user repository unavailable: {message}"))
            }
            UserRepositoryError::Query { message } => {
                Error::internal(format!("user repository error: {message}"))
            }
            UserRepositoryError::DuplicateEmail { .. } => {
                Error::conflict("Email is already in use")
            }
        }
    }

    fn map_identity_error(error: IdentityProviderError) -> Error {
        match error {
            IdentityProviderError::NotConfigured => {
                Error::service_unavailable("OAuth sign-in is not configured")
            }
            IdentityProviderError::Exchange { message } => {
                warn!(%message, "oauth code exchange failed");
                Error::unauthorized("OAuth sign-in failed")
            }
            IdentityProviderError::Profile { message } => {
                Error::upstream_failure(format!("identity provider error: {message}"))
            }
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, Error> {
        let password = Zeroizing::new(password.to_owned());
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password.as_bytes(), cost))
            .await
            .map_err(|err| Error::internal(format!("password hashing task failed: {err}")))?
            .map_err(|err| Error::internal(format!("password hashing failed: {err}")))
    }

    async fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
        let password = Zeroizing::new(password.to_owned());
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(password.as_bytes(), &hash))
            .await
            .map_err(|err| Error::internal(format!("password check task failed: {err}")))?
            .map_err(|err| Error::internal(format!("password check failed: {err}")))
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, Error> {
        self.users
            .find_by_email(email)
            .await
            .map_err(Self::map_user_error)
    }

    async fn load_or_create(&self, identity: &SessionIdentity) -> Result<User, Error> {
        if let Some(user) = self
            .users
            .find_by_id(&identity.user_id)
            .await
            .map_err(Self::map_user_error)?
        {
            return Ok(user);
        }

        let user = User::new(
            identity.user_id,
            identity.name.clone(),
            identity.email.clone(),
            self.clock.utc(),
        )
        .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.users
            .insert(&user)
            .await
            .map_err(Self::map_user_error)?;
        info!(user_id = %user.id, "created baseline user record");
        Ok(user)
    }

    fn display_name(email: &EmailAddress, name: Option<&str>) -> String {
        name.map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| {
                email
                    .as_str()
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_owned()
            })
    }
}

#[async_trait]
impl AccountCommand for AccountService {
    async fn register(&self, registration: Registration) -> Result<User, Error> {
        let credentials = registration.credentials();
        if self.find_by_email(credentials.email()).await?.is_some() {
            return Err(Error::conflict("Email is already in use"));
        }

        let hash = self.hash_password(credentials.password()).await?;
        let mut user = User::new(
            UserId::random(),
            registration.name(),
            credentials.email().clone(),
            self.clock.utc(),
        )
        .map_err(|err| Error::invalid_request(err.to_string()))?;
        user.password_hash = Some(hash);

        self.users
            .insert(&user)
            .await
            .map_err(Self::map_user_error)?;
        info!(user_id = %user.id, "registered credential account");
        Ok(user)
    }

    async fn login(&self, credentials: LoginCredentials) -> Result<User, Error> {
        let Some(mut user) = self.find_by_email(credentials.email()).await? else {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };
        if !Self::verify_password(credentials.password(), hash).await? {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        }

        user.record_login(self.clock.utc());
        self.users
            .update(&user)
            .await
            .map_err(Self::map_user_error)?;
        Ok(user)
    }

    fn oauth_authorization_url(&self, state: &str) -> Result<String, Error> {
        self.identity
            .authorization_url(state)
            .map_err(Self::map_identity_error)
    }

    async fn complete_oauth(&self, code: &str) -> Result<User, Error> {
        let identity = self
            .identity
            .exchange(code)
            .await
            .map_err(Self::map_identity_error)?;
        if !identity.email_verified {
            return Err(Error::unauthorized("Email address is not verified"));
        }
        let email = EmailAddress::new(&identity.email)
            .map_err(|_| Error::unauthorized("Identity provider returned an invalid email"))?;
        let now = self.clock.utc();

        match self.find_by_email(&email).await? {
            Some(mut user) => {
                if identity.image.is_some() {
                    user.image = identity.image;
                }
                user.email_verified.get_or_insert(now);
                user.record_login(now);
                self.users
                    .update(&user)
                    .await
                    .map_err(Self::map_user_error)?;
                Ok(user)
            }
            None => {
                let name = Self::display_name(&email, identity.name.as_deref());
                let mut user = User::new(UserId::random(), name, email, now)
                    .map_err(|err| Error::invalid_request(err.to_string()))?;
                user.image = identity.image;
                user.email_verified = Some(now);
                user.record_login(now);
                self.users
                    .insert(&user)
                    .await
                    .map_err(Self::map_user_error)?;
                info!(user_id = %user.id, "created account from oauth sign-in");
                Ok(user)
            }
        }
    }

    async fn update_profile(
        &self,
        identity: &SessionIdentity,
        update: ProfileUpdate,
    ) -> Result<User, Error> {
        let mut user = self.load_or_create(identity).await?;
        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::invalid_request("name must not be empty"));
            }
            name.clone_into(&mut user.name);
        }
        if let Some(image) = update.image {
            let image = image.trim();
            user.image = (!image.is_empty()).then(|| image.to_owned());
        }
        user.updated_at = self.clock.utc();
        self.users
            .update(&user)
            .await
            .map_err(Self::map_user_error)?;
        Ok(user)
    }
}

#[async_trait]
impl AccountQuery for AccountService {
    async fn session_user(&self, user_id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(user_id)
            .await
            .map_err(Self::map_user_error)?
            .ok_or_else(|| Error::unauthorized("Session user no longer exists"))
    }

    async fn profile(&self, identity: &SessionIdentity) -> Result<User, Error> {
        self.load_or_create(identity).await
    }
}

#[cfg(test)]
#[path = "account_service_tests.rs"]
mod tests;
