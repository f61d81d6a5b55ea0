//! HTTP inbound adapter exposing REST endpoints.

pub mod auth;
pub mod error;
pub mod health;
pub mod preferences;
pub mod qa;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod validation;
pub mod webhooks;

use actix_web::web;

pub use error::ApiResult;

/// Register every `/api` handler on `cfg`.
///
/// `/qa/history` is registered ahead of `/qa/{id}` so the literal segment
/// is matched first.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::register)
        .service(auth::login)
        .service(auth::google_authorization_url)
        .service(auth::google_callback)
        .service(auth::current_session)
        .service(auth::logout)
        .service(auth::get_profile)
        .service(auth::update_profile)
        .service(preferences::get_preferences)
        .service(preferences::update_preferences)
        .service(preferences::complete_onboarding)
        .service(qa::ask)
        .service(qa::list_queries)
        .service(qa::history)
        .service(qa::clear_history)
        .service(qa::get_query)
        .service(qa::submit_feedback)
        .service(qa::delete_query)
        .service(webhooks::receive_webhook);
}
