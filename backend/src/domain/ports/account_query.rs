//! Driving port for reading account state.

use async_trait::async_trait;

use crate::domain::{Error, SessionIdentity, User, UserId};

/// Account lookups invoked by the HTTP adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountQuery: Send + Sync {
    /// The user behind a session; `401` when the account no longer exists.
    async fn session_user(&self, user_id: &UserId) -> Result<User, Error>;

    /// Full profile, creating a baseline record from the session identity
    /// when none is stored.
    async fn profile(&self, identity: &SessionIdentity) -> Result<User, Error>;
}
