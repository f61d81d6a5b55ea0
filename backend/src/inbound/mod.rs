//! Edge adapters: the REST API under [`http`] and the push channel under
//! [`ws`]. Both only translate wire formats into domain service calls.

pub mod http;
pub mod ws;
