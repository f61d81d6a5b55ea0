//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (repositories, answer service, identity provider, reindex
//! notifier, notification publisher) declare their own error enums through
//! [`define_port_error!`]. Driving ports are the use-cases inbound adapters
//! call and return the domain [`Error`](crate::domain::Error) directly.

mod macros;
pub(crate) use macros::define_port_error;

mod account_command;
mod account_query;
mod answer_generator;
mod identity_provider;
mod notification_publisher;
mod preferences_command;
mod preferences_query;
mod preferences_repository;
mod qa_command;
mod qa_query;
mod query_repository;
mod reindex_notifier;
mod source_repository;
mod user_repository;
mod webhook_command;

#[cfg(test)]
pub use account_command::MockAccountCommand;
pub use account_command::{AccountCommand, ProfileUpdate};
#[cfg(test)]
pub use account_query::MockAccountQuery;
pub use account_query::AccountQuery;
#[cfg(test)]
pub use answer_generator::MockAnswerGenerator;
pub use answer_generator::{
    AnswerGenerator, AnswerGeneratorError, AnswerRequest, DisabledAnswerGenerator, GeneratedAnswer,
};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{
    DisabledIdentityProvider, ExternalIdentity, IdentityProvider, IdentityProviderError,
};
#[cfg(test)]
pub use notification_publisher::MockNotificationPublisher;
pub use notification_publisher::{NotificationPublisher, NullNotificationPublisher};
#[cfg(test)]
pub use preferences_command::MockPreferencesCommand;
pub use preferences_command::PreferencesCommand;
#[cfg(test)]
pub use preferences_query::MockPreferencesQuery;
pub use preferences_query::PreferencesQuery;
#[cfg(test)]
pub use preferences_repository::MockPreferencesRepository;
pub use preferences_repository::{PreferencesRepository, PreferencesRepositoryError};
#[cfg(test)]
pub use qa_command::MockQaCommand;
pub use qa_command::{AnsweredQuery, AskQuestion, FeedbackInput, QaCommand};
#[cfg(test)]
pub use qa_query::MockQaQuery;
pub use qa_query::QaQuery;
#[cfg(test)]
pub use query_repository::MockQueryRepository;
pub use query_repository::{HistoryFilter, QueryRepository, QueryRepositoryError};
#[cfg(test)]
pub use reindex_notifier::MockReindexNotifier;
pub use reindex_notifier::{
    DisabledReindexNotifier, ReindexAction, ReindexNotifier, ReindexNotifierError,
};
#[cfg(test)]
pub use source_repository::MockSourceRepository;
pub use source_repository::{SourceRepository, SourceRepositoryError};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{UserRepository, UserRepositoryError};
#[cfg(test)]
pub use webhook_command::MockWebhookCommand;
pub use webhook_command::{WebhookCommand, WebhookDelivery};
