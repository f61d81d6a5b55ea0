//! Session and preference state kept in sync with the backend.
//!
//! [`AuthProvider`] owns the signed-in user; [`PreferencesProvider`] reads it
//! to decide whether preferences can be loaded or saved. Both report outcomes
//! through a [`Notifier`] and publish snapshots on `watch` channels.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{
    ApiClient, Persona, Preferences, PreferencesPatch, Profile, ProfileUpdate, SessionUser,
};
use crate::error::ApiError;
use crate::notifier::Notifier;

/// Notice after a successful sign-out.
pub const LOGGED_OUT_NOTICE: &str = "Logged out successfully";
/// Notice when saving preferences without a session.
pub const LOGIN_REQUIRED_NOTICE: &str = "You must be logged in to save preferences";
/// Notice when the backend rejects a preferences update.
pub const PREFERENCES_FAILED_NOTICE: &str = "Failed to save preferences";

/// Authentication snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// Signed-in user.
    pub user: Option<SessionUser>,
    /// Profile, loaded after the session.
    pub profile: Option<Profile>,
    /// A session check is running.
    pub loading: bool,
}

impl AuthState {
    /// Whether someone is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Signed in but without an onboarding persona yet.
    #[must_use]
    pub fn needs_onboarding(&self) -> bool {
        self.user.as_ref().is_some_and(|user| !user.onboarded)
    }
}

/// Session holder.
pub struct AuthProvider {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<AuthState>,
}

impl AuthProvider {
    /// Signed-out provider.
    #[must_use]
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            api,
            notifier,
            state,
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Follow session changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    /// Whether someone is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Whether the signed-in user still has to pick a persona.
    #[must_use]
    pub fn needs_onboarding(&self) -> bool {
        self.state.borrow().needs_onboarding()
    }

    /// Re-read the session and, when signed in, the profile.
    ///
    /// A 401 signs the provider out without reporting an error.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of any other failure; the previous state is
    /// kept.
    pub async fn load(&self) -> Result<(), ApiError> {
        self.state.send_modify(|state| state.loading = true);
        let session = match self.api.session().await {
            Ok(user) => user,
            Err(err) if err.is_unauthorised() => {
                debug!("no active session");
                self.state.send_replace(AuthState::default());
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "session check failed");
                self.state.send_modify(|state| state.loading = false);
                return Err(err);
            }
        };
        let profile = self
            .api
            .profile()
            .await
            .inspect_err(|err| warn!(error = %err, "profile could not be loaded"))
            .ok();
        self.state.send_replace(AuthState {
            user: Some(session),
            profile,
            loading: false,
        });
        Ok(())
    }

    /// Sign in with credentials, then reload the session.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] when the credentials are rejected.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        if let Err(err) = self.api.login(email, password).await {
            self.notifier.error(&err.message);
            return Err(err);
        }
        self.load().await
    }

    /// Sign out and forget the user.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] when the backend could not end the session;
    /// local state is left untouched then.
    pub async fn logout(&self) -> Result<(), ApiError> {
        match self.api.logout().await {
            Ok(()) => {
                self.state.send_replace(AuthState::default());
                self.notifier.success(LOGGED_OUT_NOTICE);
                Ok(())
            }
            Err(err) => {
                self.notifier.error("Failed to log out");
                Err(err)
            }
        }
    }

    /// Update name or avatar.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] when the update is rejected.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, ApiError> {
        match self.api.update_profile(update).await {
            Ok(profile) => {
                self.state.send_modify(|state| {
                    state.user = Some(profile.user.clone());
                    state.profile = Some(profile.clone());
                });
                self.notifier.success("Profile updated successfully");
                Ok(profile)
            }
            Err(err) => {
                self.notifier.error("Failed to update profile");
                Err(err)
            }
        }
    }

    /// Complete onboarding with `persona`, then reload the session.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] when the persona is rejected.
    pub async fn save_role(&self, persona: Persona) -> Result<(), ApiError> {
        if let Err(err) = self.api.save_role(persona).await {
            self.notifier.error("Failed to save role");
            return Err(err);
        }
        self.notifier.success("Role saved successfully");
        self.load().await
    }
}

/// Preference defaults seeded by an onboarding persona.
#[must_use]
pub const fn role_defaults(persona: Persona) -> PreferencesPatch {
    let mut patch = PreferencesPatch {
        theme: None,
        notifications: None,
        show_sources: None,
        code_snippets: None,
        technical_terms: None,
        simplified_explanations: None,
        educational_resources: None,
        query_saving: None,
    };
    match persona {
        Persona::Developer => {
            patch.code_snippets = Some(true);
            patch.technical_terms = Some(true);
        }
        Persona::Teacher => {
            patch.simplified_explanations = Some(true);
            patch.educational_resources = Some(true);
        }
        Persona::Business => patch.simplified_explanations = Some(true),
        Persona::Researcher => {
            patch.technical_terms = Some(true);
            patch.show_sources = Some(true);
        }
    }
    patch
}

/// Preferences holder.
///
/// Updates are applied locally before they are persisted and are not rolled
/// back when persisting fails.
pub struct PreferencesProvider {
    api: ApiClient,
    auth: watch::Receiver<AuthState>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<Preferences>,
}

impl PreferencesProvider {
    /// Provider starting from the defaults.
    #[must_use]
    pub fn new(api: ApiClient, auth: &AuthProvider, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(Preferences::default());
        Self {
            api,
            auth: auth.watch(),
            notifier,
            state,
        }
    }

    /// Current preferences.
    #[must_use]
    pub fn preferences(&self) -> Preferences {
        self.state.borrow().clone()
    }

    /// Follow preference changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Preferences> {
        self.state.subscribe()
    }

    fn signed_in(&self) -> bool {
        self.auth.borrow().is_authenticated()
    }

    /// Load stored preferences over the defaults; signed-out users get the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] when the backend read fails.
    pub async fn load(&self) -> Result<(), ApiError> {
        if !self.signed_in() {
            self.state.send_replace(Preferences::default());
            return Ok(());
        }
        let stored = self.api.preferences().await.inspect_err(|err| {
            warn!(error = %err, "preferences could not be loaded");
        })?;
        self.state.send_replace(stored);
        Ok(())
    }

    /// Apply `patch` locally, then persist it.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] with status 401 when signed out, or the
    /// backend's error. The local change stays in place on failure.
    pub async fn update(&self, patch: &PreferencesPatch) -> Result<Preferences, ApiError> {
        if !self.signed_in() {
            self.notifier.error(LOGIN_REQUIRED_NOTICE);
            return Err(ApiError {
                status: Some(401),
                message: LOGIN_REQUIRED_NOTICE.to_owned(),
                data: serde_json::Value::Null,
            });
        }
        self.state.send_modify(|current| *current = current.merged(patch));
        match self.api.update_preferences(patch).await {
            Ok(stored) => {
                self.state.send_replace(stored.clone());
                self.notifier.success("Preferences updated successfully");
                Ok(stored)
            }
            Err(err) => {
                warn!(error = %err, "preferences update failed");
                self.notifier.error(PREFERENCES_FAILED_NOTICE);
                Err(err)
            }
        }
    }

    /// Switch on the defaults associated with `persona`.
    ///
    /// # Errors
    ///
    /// As [`Self::update`].
    pub async fn apply_role_defaults(&self, persona: Persona) -> Result<Preferences, ApiError> {
        self.update(&role_defaults(persona)).await
    }

    /// Back to the defaults, locally only.
    pub fn reset(&self) {
        self.state.send_replace(Preferences::default());
    }
}

#[cfg(test)]
#[path = "providers_tests.rs"]
mod tests;
