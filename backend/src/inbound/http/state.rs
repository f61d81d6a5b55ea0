//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{
    AccountCommand, AccountQuery, PreferencesCommand, PreferencesQuery, QaCommand, QaQuery,
    WebhookCommand,
};

/// Dependency bundle for HTTP handlers.
///
/// # Examples
/// ```no_run
/// use std::sync::Arc;
///
/// use cervello::inbound::http::state::HttpState;
/// use cervello::server::build_in_memory_services;
///
/// let services = build_in_memory_services(&Default::default());
/// let state = HttpState::from(&services);
/// let _qa = Arc::clone(&state.qa);
/// ```
#[derive(Clone)]
pub struct HttpState {
    /// Registration, sign-in and profile edits.
    pub accounts: Arc<dyn AccountCommand>,
    /// Session and profile reads.
    pub accounts_query: Arc<dyn AccountQuery>,
    /// Preference updates and onboarding.
    pub preferences: Arc<dyn PreferencesCommand>,
    /// Preference reads.
    pub preferences_query: Arc<dyn PreferencesQuery>,
    /// Question submission, feedback and deletion.
    pub qa: Arc<dyn QaCommand>,
    /// History reads.
    pub qa_query: Arc<dyn QaQuery>,
    /// Webhook ingestion.
    pub webhooks: Arc<dyn WebhookCommand>,
}
