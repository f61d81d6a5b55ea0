//! WebSocket inbound adapter bridging hub notifications to browser clients.
//!
//! Responsibilities:
//! - validate upgrade requests against the origin allow-list
//! - bind the connection to the cookie-session user, if any
//! - hand the socket to the per-connection select loop

use actix_web::http::header::{HeaderValue, ORIGIN};
use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use tracing::{error, warn};
use url::Url;

use crate::inbound::http::session::SessionContext;

pub mod hub;
pub mod messages;
mod session;
pub mod state;

const LOCALHOST: &str = "localhost";

/// Origins allowed to open the push channel.
///
/// Configured entries are compared by scheme, host and port. Plain-HTTP
/// localhost with an explicit non-zero port is always accepted so local
/// frontends work without configuration.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<Url>,
}

impl OriginPolicy {
    /// Build a policy from configured origin strings, skipping unparsable
    /// entries with a warning.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = origins
            .into_iter()
            .filter_map(|raw| {
                let raw = raw.as_ref().trim();
                Url::parse(raw)
                    .inspect_err(|err| warn!(origin = raw, error = %err, "ignoring invalid origin"))
                    .ok()
            })
            .collect();
        Self { allowed }
    }

    /// Returns true when a parsed Origin is accepted.
    pub fn allows(&self, origin: &Url) -> bool {
        let Some(host) = origin.host_str() else {
            return false;
        };
        if origin.scheme() == "http" && host == LOCALHOST {
            return matches!(origin.port(), Some(port) if port != 0);
        }
        self.allowed.iter().any(|allowed| {
            allowed.scheme() == origin.scheme()
                && allowed.host_str() == Some(host)
                && allowed.port_or_known_default() == origin.port_or_known_default()
        })
    }

    fn validate(&self, origin_header: &HeaderValue) -> actix_web::Result<()> {
        let origin_value = origin_header.to_str().map_err(|err| {
            error!(error = %err, "Failed to parse Origin header as string");
            actix_web::error::ErrorBadRequest("Invalid Origin header")
        })?;

        let origin = Url::parse(origin_value).map_err(|err| {
            error!(error = %err, "Failed to parse Origin header as URL");
            actix_web::error::ErrorBadRequest("Invalid Origin header")
        })?;

        if self.allows(&origin) {
            Ok(())
        } else {
            warn!(origin = origin_value, "Rejected WS upgrade due to disallowed Origin");
            Err(actix_web::error::ErrorForbidden("Origin not allowed"))
        }
    }
}

/// Handle WebSocket upgrade for the `/ws` endpoint.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<state::WsState>,
    session: SessionContext,
    req: HttpRequest,
    stream: Payload,
) -> actix_web::Result<HttpResponse> {
    let mut origin_iter = req.headers().get_all(ORIGIN);
    let origin_header = origin_iter.next().ok_or_else(|| {
        error!("Missing Origin header on WebSocket upgrade");
        actix_web::error::ErrorForbidden("Origin not allowed")
    })?;
    if origin_iter.next().is_some() {
        error!("Multiple Origin headers on WebSocket upgrade");
        return Err(actix_web::error::ErrorBadRequest("Invalid Origin header"));
    }
    state.origins.validate(origin_header)?;

    let session_user = session.identity().ok().flatten().map(|identity| identity.user_id);

    let (response, ws_session, messages) = actix_ws::handle(&req, stream).map_err(|err| {
        error!(error = %err, "WebSocket upgrade failed");
        actix_web::error::ErrorInternalServerError("WebSocket upgrade failed")
    })?;

    actix_web::rt::spawn(session::handle_ws_session(
        state.get_ref().clone(),
        session_user,
        ws_session,
        messages,
    ));

    Ok(response)
}
