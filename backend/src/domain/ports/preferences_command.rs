//! Driving port for preference updates and onboarding.

use async_trait::async_trait;

use crate::domain::{Error, Persona, PreferencesPatch, UserId, UserPreferences};

/// Preference mutations invoked by the HTTP adapter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferencesCommand: Send + Sync {
    /// Merge `patch` over the stored preferences (or defaults) and upsert.
    async fn update_preferences(
        &self,
        user_id: &UserId,
        patch: PreferencesPatch,
    ) -> Result<UserPreferences, Error>;

    /// Record the onboarding persona and upsert its preference defaults.
    ///
    /// Only personas offered during onboarding are accepted.
    async fn complete_onboarding(
        &self,
        user_id: &UserId,
        persona: Persona,
    ) -> Result<UserPreferences, Error>;
}
