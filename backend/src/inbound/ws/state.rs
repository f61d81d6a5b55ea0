//! Shared WebSocket adapter state.
//!
//! The endpoint depends on the Q&A driving port and the notification hub
//! rather than on concrete services, so tests can swap in doubles.

use std::sync::Arc;

use super::OriginPolicy;
use super::hub::NotificationHub;
use crate::domain::ports::QaCommand;

/// Dependency bundle for the `/ws` endpoint and its sessions.
#[derive(Clone)]
pub struct WsState {
    /// Runs `query` frames.
    pub qa: Arc<dyn QaCommand>,
    /// Source of pushed notifications.
    pub hub: NotificationHub,
    /// Handshake origin allow-list.
    pub origins: Arc<OriginPolicy>,
}

impl WsState {
    /// Construct state from explicit collaborators.
    pub fn new(qa: Arc<dyn QaCommand>, hub: NotificationHub, origins: OriginPolicy) -> Self {
        Self {
            qa,
            hub,
            origins: Arc::new(origins),
        }
    }
}
