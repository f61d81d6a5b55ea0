//! Port for user preferences persistence.
//!
//! Preferences are keyed by user id and written with upsert semantics: the
//! first write creates the row, later writes replace it.

use async_trait::async_trait;

use crate::domain::{UserId, UserPreferences};

use super::define_port_error;

define_port_error! {
    /// Errors raised by preferences repository adapters.
    pub enum PreferencesRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "preferences repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "preferences repository query failed: {message}",
    }
}

/// Port for preferences storage and retrieval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    /// Fetch preferences for a user.
    ///
    /// Returns `None` when nothing has been stored yet; callers fall back to
    /// [`UserPreferences::defaults`].
    async fn find(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserPreferences>, PreferencesRepositoryError>;

    /// Create or replace the preferences row for `preferences.user_id`.
    async fn upsert(&self, preferences: &UserPreferences)
    -> Result<(), PreferencesRepositoryError>;
}
