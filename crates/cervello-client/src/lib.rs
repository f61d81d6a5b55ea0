//! Client runtime for the cervello backend.
//!
//! - [`connection`]: one push-channel socket with bounded exponential
//!   reconnects.
//! - [`RealtimeClient`]: the dispatch loop that authenticates, routes frames
//!   to [`TopicSubscription`]s and reports connection status.
//! - [`Fetcher`]: deduplicated, cached JSON fetches with background
//!   revalidation.
//! - [`ApiClient`], [`AuthProvider`] and [`PreferencesProvider`]: typed REST
//!   access and the session and preference state built on it.

pub mod api;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod fetch;
pub mod notifier;
pub mod providers;
pub mod router;
pub mod transport;
pub mod tungstenite;

#[cfg(test)]
mod test_support;

pub use api::{ApiClient, Persona, Preferences, PreferencesPatch, SessionUser, Theme};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionEvent, ConnectionManager, ConnectionState};
pub use dispatcher::{ConnectionStatus, RealtimeClient};
pub use error::{ApiError, ConnectError, FetchError};
pub use fetch::{FetchConfig, FetchOptions, FetchState, Fetcher, Mutation};
pub use notifier::{NoticeLevel, Notifier, TracingNotifier};
pub use providers::{AuthProvider, AuthState, PreferencesProvider};
pub use router::{ServerMessage, TopicSubscription, filter_by_topics};
pub use transport::{HttpTransport, ReqwestTransport};
