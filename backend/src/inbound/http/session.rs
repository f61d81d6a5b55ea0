//! Session helpers to keep HTTP handlers free of framework-specific logic.
//!
//! Wraps the Actix cookie session so handlers only deal with the signed-in
//! [`SessionIdentity`] and the OAuth CSRF state.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Error, SessionIdentity, UserId};

pub(crate) const IDENTITY_KEY: &str = "identity";
pub(crate) const OAUTH_STATE_KEY: &str = "oauth_state";

/// Newtype wrapper that exposes higher-level session operations.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Construct a new wrapper from the underlying Actix session.
    pub const fn new(session: Session) -> Self {
        Self(session)
    }

    /// Persist the signed-in identity, rotating the session id.
    pub fn persist_identity(&self, identity: &SessionIdentity) -> Result<(), Error> {
        self.0.renew();
        self.0
            .insert(IDENTITY_KEY, identity)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// The signed-in identity, if any. Tampered payloads read as signed out.
    pub fn identity(&self) -> Result<Option<SessionIdentity>, Error> {
        match self.0.get::<SessionIdentity>(IDENTITY_KEY) {
            Ok(identity) => Ok(identity),
            Err(error) => {
                warn!(%error, "discarding unreadable session identity");
                self.0.remove(IDENTITY_KEY);
                Ok(None)
            }
        }
    }

    /// Require a signed-in identity or return `401 Unauthorized`.
    pub fn require_identity(&self) -> Result<SessionIdentity, Error> {
        self.identity()?
            .ok_or_else(|| Error::unauthorized("Not authenticated"))
    }

    /// Require a signed-in user id or return `401 Unauthorized`.
    pub fn require_user_id(&self) -> Result<UserId, Error> {
        self.require_identity().map(|identity| identity.user_id)
    }

    /// Remember the OAuth `state` issued with an authorisation URL.
    pub fn store_oauth_state(&self, state: &str) -> Result<(), Error> {
        self.0
            .insert(OAUTH_STATE_KEY, state)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// Consume the stored OAuth `state`; it is valid for one callback only.
    pub fn take_oauth_state(&self) -> Option<String> {
        self.0.remove_as::<String>(OAUTH_STATE_KEY).and_then(Result::ok)
    }

    /// Drop everything stored in the session.
    pub fn clear(&self) {
        self.0.purge();
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionContext::new) })
    }
}
