//! Outbound notification channel
//!
//! The manager pushes state changes to whoever is watching a user's session
//! (a websocket, an SSE stream, a test) through the [`Notifier`] trait. It
//! never reads anything back.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pairing::PairingArtifact;

/// Payload of a `session-pairing` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingPayload {
    pub pairing_artifact: PairingArtifact,
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Payload of a `session-connected` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub identity: String,
}

/// Payload of a `session-status` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub connected: bool,
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusPayload {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            identity: None,
            last_activity: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::disconnected()
        }
    }
}

/// Events pushed to a session's subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum NotificationEvent {
    SessionPairing(PairingPayload),
    SessionConnected(ConnectedPayload),
    SessionStatus(StatusPayload),
}

impl NotificationEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionPairing(_) => "session-pairing",
            Self::SessionConnected(_) => "session-connected",
            Self::SessionStatus(_) => "session-status",
        }
    }

    /// JSON body of the event, without the kind tag
    pub fn payload(&self) -> serde_json::Value {
        let value = match self {
            Self::SessionPairing(p) => serde_json::to_value(p),
            Self::SessionConnected(p) => serde_json::to_value(p),
            Self::SessionStatus(p) => serde_json::to_value(p),
        };
        value.unwrap_or_default()
    }
}

/// Sink for session notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, owner_id: &str, event: NotificationEvent);
}

/// Discards every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _owner_id: &str, _event: NotificationEvent) {}
}

/// Fans notifications out to every subscriber in the process
pub struct BroadcastNotifier {
    tx: broadcast::Sender<(String, NotificationEvent)>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, NotificationEvent)> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, owner_id: &str, event: NotificationEvent) {
        // No receivers is fine
        let _ = self.tx.send((owner_id.to_string(), event));
    }
}

/// Keeps every notification in order, for assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<(String, NotificationEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, NotificationEvent)> {
        self.lock().clone()
    }

    pub fn events_for(&self, owner_id: &str) -> Vec<NotificationEvent> {
        self.lock()
            .iter()
            .filter(|(owner, _)| owner == owner_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.lock().iter().map(|(_, event)| event.kind()).collect()
    }

    pub fn last(&self) -> Option<NotificationEvent> {
        self.lock().last().map(|(_, event)| event.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, NotificationEvent)>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, owner_id: &str, event: NotificationEvent) {
        self.lock().push((owner_id.to_string(), event));
    }
}
