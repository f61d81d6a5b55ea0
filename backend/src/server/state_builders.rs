//! Builders wiring domain services to their outbound adapters.
//!
//! Repositories come from PostgreSQL when a pool is supplied and from the
//! in-memory stores otherwise. Network adapters are built from
//! [`CervelloSettings`] and fall back to disabled implementations when a
//! service is not configured.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::info;

use crate::domain::ports::{
    AnswerGenerator, DisabledAnswerGenerator, DisabledIdentityProvider, DisabledReindexNotifier,
    IdentityProvider, NotificationPublisher, PreferencesRepository, QueryRepository, ReindexNotifier,
    SourceRepository, UserRepository,
};
use crate::domain::{
    AccountService, DEFAULT_BCRYPT_COST, PreferencesService, QaService, QaServicePorts,
    WebhookSecurity, WebhookService, WebhookServicePorts,
};
use crate::inbound::http::state::HttpState;
use crate::inbound::ws::OriginPolicy;
use crate::inbound::ws::hub::NotificationHub;
use crate::inbound::ws::state::WsState;
use crate::outbound::memory::{
    InMemoryPreferencesRepository, InMemoryQueryRepository, InMemorySourceRepository,
    InMemoryUserRepository,
};
use crate::outbound::oauth::{
    DEFAULT_OAUTH_TIMEOUT, GoogleCredentials, GoogleEndpoints, GoogleIdentityProvider,
};
use crate::outbound::persistence::{
    DbPool, DieselPreferencesRepository, DieselQueryRepository, DieselSourceRepository,
    DieselUserRepository,
};
use crate::outbound::rag::{DEFAULT_RAG_TIMEOUT, HttpAnswerGenerator};
use crate::outbound::reindex::{DEFAULT_REINDEX_TIMEOUT, HttpReindexNotifier};
use crate::settings::{CervelloSettings, SettingsError};

/// Failures while turning settings into adapters.
#[derive(Debug, thiserror::Error)]
pub enum ServiceBuildError {
    /// A configured value is unusable.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// An HTTP client could not be constructed.
    #[error("failed to build {adapter} client: {message}")]
    Client {
        adapter: &'static str,
        message: String,
    },
}

impl ServiceBuildError {
    fn client(adapter: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Client {
            adapter,
            message: error.to_string(),
        }
    }
}

/// Adapters and policies shared by every service.
#[derive(Clone)]
pub struct ServiceSettings {
    /// Answer service client.
    pub answers: Arc<dyn AnswerGenerator>,
    /// External sign-in provider.
    pub identity: Arc<dyn IdentityProvider>,
    /// Indexing service notifier.
    pub reindex: Arc<dyn ReindexNotifier>,
    /// Webhook signature policy.
    pub webhook_security: WebhookSecurity,
    /// WebSocket handshake allow-list.
    pub origins: OriginPolicy,
    /// Time source for timestamps.
    pub clock: Arc<dyn Clock>,
    /// bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            answers: Arc::new(DisabledAnswerGenerator),
            identity: Arc::new(DisabledIdentityProvider),
            reindex: Arc::new(DisabledReindexNotifier),
            webhook_security: WebhookSecurity::default(),
            origins: OriginPolicy::default(),
            clock: Arc::new(DefaultClock),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl ServiceSettings {
    /// Build the HTTP adapters described by `settings`.
    ///
    /// Google sign-in stays disabled unless its client id, secret and
    /// redirect URL are all present.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBuildError`] when a URL is malformed or a client
    /// cannot be built.
    pub fn from_settings(settings: &CervelloSettings) -> Result<Self, ServiceBuildError> {
        let api_key = settings.api_key();

        let answers =
            HttpAnswerGenerator::new(settings.rag_url()?, api_key.clone(), DEFAULT_RAG_TIMEOUT)
                .map_err(|err| ServiceBuildError::client("answer service", err))?;
        let reindex =
            HttpReindexNotifier::new(&settings.api_base_url()?, api_key, DEFAULT_REINDEX_TIMEOUT)
                .map_err(|err| ServiceBuildError::client("reindex", err))?;

        let identity: Arc<dyn IdentityProvider> = match settings.google_oauth()? {
            Some((client_id, client_secret, redirect_url)) => {
                let endpoints = GoogleEndpoints::google()
                    .map_err(|err| ServiceBuildError::client("google oauth", err))?;
                let provider = GoogleIdentityProvider::new(
                    GoogleCredentials {
                        client_id,
                        client_secret,
                        redirect_url,
                    },
                    endpoints,
                    DEFAULT_OAUTH_TIMEOUT,
                )
                .map_err(|err| ServiceBuildError::client("google oauth", err))?;
                info!("google sign-in enabled");
                Arc::new(provider)
            }
            None => Arc::new(DisabledIdentityProvider),
        };

        Ok(Self {
            answers: Arc::new(answers),
            identity,
            reindex: Arc::new(reindex),
            webhook_security: WebhookSecurity::new(
                settings.webhook_secret(),
                settings.enforce_webhook_signature,
            ),
            origins: OriginPolicy::new(settings.ws_allowed_origins()),
            ..Self::default()
        })
    }
}

/// Repository set backing the services.
#[derive(Clone)]
pub struct Repositories {
    /// User accounts.
    pub users: Arc<dyn UserRepository>,
    /// Display preferences.
    pub preferences: Arc<dyn PreferencesRepository>,
    /// Question history.
    pub queries: Arc<dyn QueryRepository>,
    /// Indexed sources.
    pub sources: Arc<dyn SourceRepository>,
}

impl Repositories {
    /// Process-local stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepository::default()),
            preferences: Arc::new(InMemoryPreferencesRepository::default()),
            queries: Arc::new(InMemoryQueryRepository::default()),
            sources: Arc::new(InMemorySourceRepository::default()),
        }
    }

    /// PostgreSQL-backed stores sharing `pool`.
    #[must_use]
    pub fn postgres(pool: &DbPool) -> Self {
        Self {
            users: Arc::new(DieselUserRepository::new(pool.clone())),
            preferences: Arc::new(DieselPreferencesRepository::new(pool.clone())),
            queries: Arc::new(DieselQueryRepository::new(pool.clone())),
            sources: Arc::new(DieselSourceRepository::new(pool.clone())),
        }
    }
}

/// Fully wired services plus the push hub they publish to.
#[derive(Clone)]
pub struct Services {
    /// Accounts and sessions.
    pub accounts: Arc<AccountService>,
    /// Preferences and onboarding.
    pub preferences: Arc<PreferencesService>,
    /// Questions, history and feedback.
    pub qa: Arc<QaService>,
    /// Webhook intake.
    pub webhooks: Arc<WebhookService>,
    /// Fan-out to WebSocket sessions.
    pub hub: NotificationHub,
    /// WebSocket handshake allow-list.
    pub origins: OriginPolicy,
}

impl Services {
    /// Wire services over `repositories`.
    #[must_use]
    pub fn new(repositories: &Repositories, settings: &ServiceSettings) -> Self {
        let hub = NotificationHub::default();
        let notifications: Arc<dyn NotificationPublisher> = Arc::new(hub.clone());
        let clock = Arc::clone(&settings.clock);

        let accounts = AccountService::new(
            Arc::clone(&repositories.users),
            Arc::clone(&settings.identity),
            Arc::clone(&clock),
        )
        .with_bcrypt_cost(settings.bcrypt_cost);
        let preferences = PreferencesService::new(
            Arc::clone(&repositories.users),
            Arc::clone(&repositories.preferences),
            Arc::clone(&clock),
        );
        let qa = QaService::new(
            QaServicePorts {
                queries: Arc::clone(&repositories.queries),
                users: Arc::clone(&repositories.users),
                preferences: Arc::clone(&repositories.preferences),
                answers: Arc::clone(&settings.answers),
                notifications: Arc::clone(&notifications),
            },
            Arc::clone(&clock),
        );
        let webhooks = WebhookService::new(
            WebhookServicePorts {
                sources: Arc::clone(&repositories.sources),
                queries: Arc::clone(&repositories.queries),
                reindex: Arc::clone(&settings.reindex),
                notifications,
            },
            settings.webhook_security.clone(),
            clock,
        );

        Self {
            accounts: Arc::new(accounts),
            preferences: Arc::new(preferences),
            qa: Arc::new(qa),
            webhooks: Arc::new(webhooks),
            hub,
            origins: settings.origins.clone(),
        }
    }

    /// State for the `/ws` endpoint.
    #[must_use]
    pub fn ws_state(&self) -> WsState {
        WsState::new(self.qa.clone(), self.hub.clone(), self.origins.clone())
    }
}

/// Services over process-local stores.
#[must_use]
pub fn build_in_memory_services(settings: &ServiceSettings) -> Services {
    Services::new(&Repositories::in_memory(), settings)
}

/// Services over PostgreSQL when `pool` is set, in-memory stores otherwise.
#[must_use]
pub fn build_services(settings: &ServiceSettings, pool: Option<&DbPool>) -> Services {
    let repositories = match pool {
        Some(pool) => Repositories::postgres(pool),
        None => {
            info!("no database configured; using in-memory repositories");
            Repositories::in_memory()
        }
    };
    Services::new(&repositories, settings)
}

impl From<&Services> for HttpState {
    fn from(services: &Services) -> Self {
        Self {
            accounts: services.accounts.clone(),
            accounts_query: services.accounts.clone(),
            preferences: services.preferences.clone(),
            preferences_query: services.preferences.clone(),
            qa: services.qa.clone(),
            qa_query: services.qa.clone(),
            webhooks: services.webhooks.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn default_settings_leave_network_adapters_disabled() {
        let services = build_in_memory_services(&ServiceSettings::default());
        assert_eq!(services.hub.receiver_count(), 0);
        let ws = services.ws_state();
        let _receiver = ws.hub.subscribe();
        assert_eq!(services.hub.receiver_count(), 1);
    }

    #[rstest]
    fn settings_build_http_adapters() {
        let settings = CervelloSettings {
            webhook_secret: Some("s3cret".to_owned()),
            enforce_webhook_signature: true,
            ws_allowed_origins: Some("https://chat.example.org".to_owned()),
            ..CervelloSettings::default()
        };
        let built = ServiceSettings::from_settings(&settings).expect("adapters build");
        assert!(
            built
                .origins
                .allows(&url::Url::parse("https://chat.example.org").expect("url"))
        );
    }

    #[rstest]
    fn malformed_rag_url_is_reported() {
        let settings = CervelloSettings {
            rag_url: Some("not a url".to_owned()),
            ..CervelloSettings::default()
        };
        let err = ServiceBuildError::from(
            settings.rag_url().expect_err("url should not parse"),
        );
        assert!(matches!(
            ServiceSettings::from_settings(&settings),
            Err(ServiceBuildError::Settings(SettingsError::Url { .. }))
        ));
        assert!(err.to_string().contains("rag_url"));
    }
}
