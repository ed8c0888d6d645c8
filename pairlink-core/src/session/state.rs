//! Session state snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pairing::PairingArtifact;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session; nothing to tear down
    #[default]
    Idle,
    /// Transport open, waiting for the user to scan (or for stored
    /// credentials to be accepted)
    AwaitingPairing,
    /// Authenticated
    Connected,
    /// Lost the connection; a counted reconnection is scheduled or running
    Reconnecting,
    /// Ended without user action. Only `connect` or `disconnect` leave here.
    Terminated,
}

/// Externally visible state of one user's session
///
/// `identity` is present iff `connected`, and a pairing artifact is never
/// held together with an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub owner_id: String,
    pub session_id: Option<String>,
    pub phase: SessionPhase,
    pub connected: bool,
    pub identity: Option<String>,
    pub pairing_artifact: Option<PairingArtifact>,
    /// Advisory expiry of `pairing_artifact`
    pub pairing_expires_at: Option<DateTime<Utc>>,
    /// Whether a transport handle is currently held
    pub transport_active: bool,
    pub reconnecting: bool,
    /// Counted reconnection attempts since the last successful authentication
    pub attempts: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn idle(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            session_id: None,
            phase: SessionPhase::Idle,
            connected: false,
            identity: None,
            pairing_artifact: None,
            pairing_expires_at: None,
            transport_active: false,
            reconnecting: false,
            attempts: 0,
            last_activity: None,
            last_error: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.identity.is_some()
    }

    pub(crate) fn clear_pairing(&mut self) {
        self.pairing_artifact = None;
        self.pairing_expires_at = None;
    }

    pub(crate) fn clear_identity(&mut self) {
        self.connected = false;
        self.identity = None;
    }
}
