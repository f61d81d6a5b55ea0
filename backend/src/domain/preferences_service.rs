//! User preferences domain service.
//!
//! Implements the preference driving ports: reads fall back to defaults,
//! updates merge a patch and upsert, onboarding stores the persona and seeds
//! its defaults.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::info;

use crate::domain::ports::{
    PreferencesCommand, PreferencesQuery, PreferencesRepository, PreferencesRepositoryError,
    UserRepository, UserRepositoryError,
};
use crate::domain::{Error, Persona, PreferencesPatch, User, UserId, UserPreferences};

/// Preferences service implementing the driving ports.
#[derive(Clone)]
pub struct PreferencesService {
    users: Arc<dyn UserRepository>,
    preferences: Arc<dyn PreferencesRepository>,
    clock: Arc<dyn Clock>,
}

impl PreferencesService {
    /// Create a new service with the given repositories.
    pub fn new(
        users: Arc<dyn UserRepository>,
        preferences: Arc<dyn PreferencesRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            preferences,
            clock,
        }
    }

    fn map_preferences_error(error: PreferencesRepositoryError) -> Error {
        match error {
            PreferencesRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("preferences repository unavailable: {message}"))
            }
            PreferencesRepositoryError::Query { message } => {
                Error::internal(format!("preferences repository error: {message}"))
            }
        }
    }

    fn map_user_error(error: UserRepositoryError) -> Error {
        match error {
            UserRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("user repository unavailable: {message}"))
            }
            other => Error::internal(format!("user repository error: {other}")),
        }
    }

    async fn require_user(&self, user_id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(user_id)
            .await
            .map_err(Self::map_user_error)?
            .ok_or_else(|| Error::not_found("User not found"))
    }

    async fn stored_or_defaults(&self, user_id: &UserId) -> Result<UserPreferences, Error> {
        let stored = self
            .preferences
            .find(user_id)
            .await
            .map_err(Self::map_preferences_error)?;
        Ok(stored.unwrap_or_else(|| UserPreferences::defaults(*user_id, self.clock.utc())))
    }
}

#[async_trait]
impl PreferencesQuery for PreferencesService {
    async fn preferences(&self, user_id: &UserId) -> Result<UserPreferences, Error> {
        self.require_user(user_id).await?;
        self.stored_or_defaults(user_id).await
    }
}

#[async_trait]
impl PreferencesCommand for PreferencesService {
    async fn update_preferences(
        &self,
        user_id: &UserId,
        patch: PreferencesPatch,
    ) -> Result<UserPreferences, Error> {
        let mut preferences = self.stored_or_defaults(user_id).await?;
        preferences.apply(&patch, self.clock.utc());
        self.preferences
            .upsert(&preferences)
            .await
            .map_err(Self::map_preferences_error)?;
        Ok(preferences)
    }

    async fn complete_onboarding(
        &self,
        user_id: &UserId,
        persona: Persona,
    ) -> Result<UserPreferences, Error> {
        if !persona.is_onboarding_choice() {
            return Err(Error::invalid_request("Invalid role"));
        }

        let now = self.clock.utc();
        let mut user = self.require_user(user_id).await?;
        user.persona = Some(persona);
        user.updated_at = now;
        self.users
            .update(&user)
            .await
            .map_err(Self::map_user_error)?;

        let preferences = UserPreferences::for_persona(*user_id, persona, now);
        self.preferences
            .upsert(&preferences)
            .await
            .map_err(Self::map_preferences_error)?;
        info!(%user_id, persona = persona.as_str(), "onboarding completed");
        Ok(preferences)
    }
}

#[cfg(test)]
#[path = "preferences_service_tests.rs"]
mod tests;
