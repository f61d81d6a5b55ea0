//! Driving port for reading preferences.

use async_trait::async_trait;

use crate::domain::{Error, UserId, UserPreferences};

/// Preference lookups invoked by the HTTP adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferencesQuery: Send + Sync {
    /// Stored preferences, or defaults when none are stored.
    ///
    /// Fails with `404` when the user does not exist.
    async fn preferences(&self, user_id: &UserId) -> Result<UserPreferences, Error>;
}
