//! pairlink-core: connection manager for paired real-time messaging sessions
//!
//! This crate keeps one user's long-lived, authenticated socket to an
//! external messaging network alive:
//!
//! - **Session management** - [`SessionManager`] owns the transport handle and
//!   the visible [`SessionState`]; [`SessionRegistry`] holds one manager per owner
//! - **Pairing** - [`PairingCodeEncoder`] turns transport pairing payloads into
//!   scannable QR images
//! - **Disconnect handling** - [`DisconnectClassifier`] maps close codes to a
//!   [`Verdict`]; [`ReconnectionScheduler`] runs bounded, cancellable retries
//! - **Credentials** - [`CredentialStore`] provisions one transient directory
//!   per session
//! - **Notifications** - every state change is pushed through a [`Notifier`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pairlink_core::{BroadcastNotifier, ManagerContext, MockTransportFactory, SessionRegistry};
//!
//! # async fn example() {
//! let notifier = Arc::new(BroadcastNotifier::new(64));
//! let mut events = notifier.subscribe();
//! let context = ManagerContext::new(Arc::new(MockTransportFactory::new()), notifier);
//! let registry = SessionRegistry::new(context);
//!
//! let response = registry.connect("user-1").await;
//! println!("session {} started: {}", response.session_id(), response.success);
//!
//! while let Ok((owner, event)) = events.recv().await {
//!     println!("{owner}: {} {}", event.kind(), event.payload());
//! }
//! # }
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!  Idle ──connect──> AwaitingPairing ──authenticated──> Connected
//!                        ▲     │                           │
//!                resocket│     └──── terminal ─────┐       │ retry
//!                        │                         ▼       ▼
//!                        └──────────────── Terminated <── Reconnecting
//!                                            (ceiling)
//! ```

pub mod config;
pub mod credentials;
pub mod disconnect;
pub mod error;
pub mod notify;
pub mod pairing;
pub mod reconnect;
pub mod session;
pub mod transport;

// Re-export key types for convenience
pub use config::ManagerConfig;
pub use credentials::{CredentialDir, CredentialStore};
pub use disconnect::{DisconnectClassifier, Verdict};
pub use error::{ConfigError, CredentialError, PairingError, PairlinkError, TransportError};
pub use notify::{
    BroadcastNotifier, ConnectedPayload, NoopNotifier, NotificationEvent, Notifier,
    PairingPayload, RecordingNotifier, StatusPayload,
};
pub use pairing::{PairingArtifact, PairingCodeEncoder};
pub use reconnect::ReconnectionScheduler;
pub use session::{
    ConnectData, ConnectResponse, MAX_ATTEMPTS_ERROR, ManagerContext, SessionManager,
    SessionPhase, SessionRegistry, SessionState,
};
pub use transport::{
    EventSink, LogLevel, MockTransportFactory, MockTransportHandle, SilentLogger, TracingLogger,
    Transport, TransportEvent, TransportFactory, TransportLogger, TransportParams,
};
