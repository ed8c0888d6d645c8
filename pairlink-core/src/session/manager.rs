//! SessionManager: one user's connection to the messaging network
//!
//! The manager owns the transport handle, the credential directory and the
//! visible [`SessionState`]. Transports report through an [`EventSink`];
//! those events, together with fired reconnection timers, are funnelled
//! into a single event loop so that every state change happens under the
//! same lock as `connect` and `disconnect`.
//!
//! ```text
//!  transport ──EventSink──┐
//!                         ├──> event loop ──> state ──> Notifier
//!  scheduler timers ──────┘         ▲
//!                                   │
//!  connect / disconnect ────────────┘
//! ```

use std::path::Path;
use std::sync::{Arc, Weak};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{SessionPhase, SessionState};
use crate::config::ManagerConfig;
use crate::credentials::{CredentialDir, CredentialStore};
use crate::disconnect::{DisconnectClassifier, Verdict};
use crate::error::{PairlinkError, TransportError};
use crate::notify::{
    ConnectedPayload, NotificationEvent, Notifier, PairingPayload, StatusPayload,
};
use crate::pairing::{PairingArtifact, PairingCodeEncoder};
use crate::reconnect::ReconnectionScheduler;
use crate::transport::traits::TaggedEvent;
use crate::transport::{
    EventSink, SilentLogger, Transport, TransportEvent, TransportFactory, TransportLogger,
    TransportParams,
};

/// Error reported when counted reconnections run out
pub const MAX_ATTEMPTS_ERROR: &str = "max attempts reached";

/// Collaborators shared by every session manager in a process
#[derive(Clone)]
pub struct ManagerContext {
    pub config: ManagerConfig,
    pub transports: Arc<dyn TransportFactory>,
    pub notifier: Arc<dyn Notifier>,
    pub logger: Arc<dyn TransportLogger>,
    pub classifier: Arc<DisconnectClassifier>,
    pub encoder: PairingCodeEncoder,
}

impl ManagerContext {
    /// Build a context from a TOML config file
    ///
    /// A missing file yields the default config.
    pub fn from_config_file(
        path: &Path,
        transports: Arc<dyn TransportFactory>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, PairlinkError> {
        let config = ManagerConfig::load(path)?;
        Ok(Self::new(transports, notifier).with_config(config))
    }

    /// Default config, silent transport logging, default classifier table
    pub fn new(transports: Arc<dyn TransportFactory>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            config: ManagerConfig::default(),
            transports,
            notifier,
            logger: Arc::new(SilentLogger),
            classifier: Arc::new(DisconnectClassifier::default()),
            encoder: PairingCodeEncoder::default(),
        }
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn TransportLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_classifier(mut self, classifier: DisconnectClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }
}

/// Result of [`SessionManager::connect`]
///
/// `success` only says whether the connection attempt was started.
/// Authentication is reported later through the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub success: bool,
    pub data: ConnectData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectData {
    pub connected: bool,
    pub message: String,
    pub session_id: String,
    pub pairing_artifact: Option<PairingArtifact>,
}

impl ConnectResponse {
    fn initiated(session_id: String) -> Self {
        Self {
            success: true,
            data: ConnectData {
                connected: false,
                message: "Connection initiated, waiting for pairing".to_string(),
                session_id,
                pairing_artifact: None,
            },
        }
    }

    fn failed(session_id: String, error: String) -> Self {
        Self {
            success: false,
            data: ConnectData {
                connected: false,
                message: error,
                session_id,
                pairing_artifact: None,
            },
        }
    }

    pub fn accepted(&self) -> bool {
        self.success
    }

    pub fn session_id(&self) -> &str {
        &self.data.session_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReopenKind {
    Retry,
    Resocket,
}

/// Work items for a manager's event loop
#[derive(Debug)]
pub(crate) enum LoopMessage {
    Transport(TaggedEvent),
    Reopen {
        session_id: String,
        kind: ReopenKind,
    },
    Flush(oneshot::Sender<()>),
}

/// Manages the messaging session of a single user
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    owner_id: String,
    context: ManagerContext,
    store: CredentialStore,
    tx: mpsc::UnboundedSender<LoopMessage>,
    state: Mutex<ManagerState>,
}

struct ManagerState {
    session: SessionState,
    transport: Option<Box<dyn Transport>>,
    /// Generation of `transport`; events from any other handle are dropped
    live_generation: Option<u64>,
    next_generation: u64,
    credentials: Option<CredentialDir>,
    scheduler: ReconnectionScheduler,
}

impl SessionManager {
    /// Create a manager for `owner_id` and start its event loop
    ///
    /// Must be called from within a tokio runtime. Dropping the manager
    /// tears its session down in the background, the same way
    /// [`disconnect`](Self::disconnect) does.
    pub fn new(owner_id: impl Into<String>, context: ManagerContext) -> Self {
        let owner_id = owner_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let store = CredentialStore::new(context.config.storage_root());
        let scheduler = ReconnectionScheduler::from_config(&context.config);

        let inner = Arc::new(ManagerInner {
            state: Mutex::new(ManagerState {
                session: SessionState::idle(owner_id.clone()),
                transport: None,
                live_generation: None,
                next_generation: 0,
                credentials: None,
                scheduler,
            }),
            owner_id,
            context,
            store,
            tx,
        });

        tokio::spawn(run_event_loop(Arc::downgrade(&inner), rx));
        Self { inner }
    }

    pub fn owner_id(&self) -> &str {
        &self.inner.owner_id
    }

    /// Start a new session, replacing any previous one
    ///
    /// Returns once the transport has been opened. Pairing and
    /// authentication progress arrive through the notifier.
    pub async fn connect(&self) -> ConnectResponse {
        self.inner.connect().await
    }

    /// Tear the session down. Safe to call at any time, any number of times.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> SessionState {
        self.inner.state.lock().await.snapshot()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.state.lock().await.session.is_connected()
    }

    /// Wait until every transport event and fired timer queued so far has
    /// been applied
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.inner.tx.send(LoopMessage::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(owner_id = %self.inner.owner_id, "Session manager dropped outside a runtime, session left open");
            return;
        };
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move { inner.disconnect().await });
    }
}

async fn run_event_loop(inner: Weak<ManagerInner>, mut rx: mpsc::UnboundedReceiver<LoopMessage>) {
    while let Some(message) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match message {
            LoopMessage::Transport(tagged) => inner.handle_transport_event(tagged).await,
            LoopMessage::Reopen { session_id, kind } => inner.reopen(&session_id, kind).await,
            LoopMessage::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Session event loop stopped");
}

impl ManagerState {
    fn snapshot(&self) -> SessionState {
        let mut session = self.session.clone();
        session.transport_active = self.transport.is_some();
        session.attempts = self.scheduler.attempts();
        session
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.session.session_id.as_deref() == Some(session_id)
    }
}

impl ManagerInner {
    async fn connect(&self) -> ConnectResponse {
        let mut state = self.state.lock().await;
        self.teardown(&mut state).await;

        let session_id = Uuid::new_v4().to_string();
        state.scheduler.reset();
        state.session = SessionState::idle(self.owner_id.clone());
        state.session.session_id = Some(session_id.clone());
        state.session.phase = SessionPhase::AwaitingPairing;
        info!(owner_id = %self.owner_id, %session_id, "Connecting session");

        match self.store.provision(&session_id).await {
            Ok(dir) => state.credentials = Some(dir),
            Err(e) => {
                error!(owner_id = %self.owner_id, %session_id, "Failed to provision credentials: {}", e);
                return Self::fail_initiation(&mut state, session_id, e.to_string());
            }
        }

        if let Err(e) = self.open_transport(&mut state, &session_id) {
            error!(owner_id = %self.owner_id, %session_id, "Failed to open transport: {}", e);
            self.release_credentials(&mut state).await;
            return Self::fail_initiation(&mut state, session_id, e.to_string());
        }

        ConnectResponse::initiated(session_id)
    }

    fn fail_initiation(
        state: &mut ManagerState,
        session_id: String,
        error: String,
    ) -> ConnectResponse {
        state.session.phase = SessionPhase::Terminated;
        state.session.last_error = Some(error.clone());
        ConnectResponse::failed(session_id, error)
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        let was_active = state.session.phase != SessionPhase::Idle
            || state.transport.is_some()
            || state.credentials.is_some();

        self.teardown(&mut state).await;
        state.scheduler.reset();
        state.session = SessionState::idle(self.owner_id.clone());

        if was_active {
            info!(owner_id = %self.owner_id, "Session disconnected");
            self.notify(NotificationEvent::SessionStatus(StatusPayload::disconnected()));
        } else {
            debug!(owner_id = %self.owner_id, "Disconnect with no active session");
        }
    }

    async fn handle_transport_event(&self, tagged: TaggedEvent) {
        let mut state = self.state.lock().await;
        if !state.is_current(&tagged.session_id)
            || state.live_generation != Some(tagged.generation)
        {
            debug!(
                owner_id = %self.owner_id,
                session_id = %tagged.session_id,
                generation = tagged.generation,
                "Dropping event from stale transport"
            );
            return;
        }

        match tagged.event {
            TransportEvent::PairingAvailable { payload } => self.on_pairing(&mut state, &payload),
            TransportEvent::Authenticated { identity } => {
                self.on_authenticated(&mut state, identity.as_deref())
            }
            TransportEvent::Closed {
                status_code,
                detail,
            } => self.on_closed(&mut state, status_code, detail).await,
        }
    }

    fn on_pairing(&self, state: &mut ManagerState, payload: &[u8]) {
        let Some(session_id) = state.session.session_id.clone() else {
            return;
        };
        let artifact = match self.context.encoder.encode(payload) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(owner_id = %self.owner_id, %session_id, "Suppressing pairing code: {}", e);
                return;
            }
        };

        let expires_at = pairing_expiry(Utc::now(), self.context.config.pairing_ttl());

        state.session.clear_identity();
        state.session.pairing_artifact = Some(artifact.clone());
        state.session.pairing_expires_at = Some(expires_at);
        state.session.phase = SessionPhase::AwaitingPairing;
        state.session.reconnecting = false;
        info!(owner_id = %self.owner_id, %session_id, "Pairing code available");

        self.notify(NotificationEvent::SessionPairing(PairingPayload {
            pairing_artifact: artifact,
            session_id,
            expires_at,
        }));
    }

    fn on_authenticated(&self, state: &mut ManagerState, raw_identity: Option<&str>) {
        let min_len = self.context.config.min_identity_len;
        let identity = raw_identity
            .map(|raw| normalize_identity(raw).to_string())
            .filter(|identity| identity.chars().count() >= min_len);

        // Kept as a no-op rather than an error until product decides otherwise
        let Some(identity) = identity else {
            warn!(owner_id = %self.owner_id, raw_identity = ?raw_identity, "Ignoring authentication without a usable identity");
            return;
        };

        let now = Utc::now();
        state.session.connected = true;
        state.session.identity = Some(identity.clone());
        state.session.clear_pairing();
        state.session.last_activity = Some(now);
        state.session.last_error = None;
        state.session.reconnecting = false;
        state.session.phase = SessionPhase::Connected;
        state.scheduler.reset();
        info!(owner_id = %self.owner_id, %identity, "Session connected");

        self.notify(NotificationEvent::SessionConnected(ConnectedPayload {
            identity: identity.clone(),
        }));
        self.notify(NotificationEvent::SessionStatus(StatusPayload {
            connected: true,
            identity: Some(identity),
            last_activity: Some(now),
            error: None,
        }));
    }

    async fn on_closed(
        &self,
        state: &mut ManagerState,
        status_code: Option<u16>,
        detail: Option<String>,
    ) {
        let verdict = self
            .context
            .classifier
            .classify(status_code, detail.as_deref());
        self.release_transport(state).await;
        state.session.clear_identity();
        state.session.clear_pairing();

        let Some(session_id) = state.session.session_id.clone() else {
            return;
        };
        info!(owner_id = %self.owner_id, %session_id, ?status_code, ?verdict, "Transport closed");

        match verdict {
            Verdict::RecoverableResocket => {
                state.session.phase = SessionPhase::AwaitingPairing;
                state.session.reconnecting = false;
                let tx = self.tx.clone();
                state.scheduler.resocket(async move {
                    let _ = tx.send(LoopMessage::Reopen {
                        session_id,
                        kind: ReopenKind::Resocket,
                    });
                });
            }
            Verdict::Retry => {
                let tx = self.tx.clone();
                let scheduled = state.scheduler.attempt(async move {
                    let _ = tx.send(LoopMessage::Reopen {
                        session_id,
                        kind: ReopenKind::Retry,
                    });
                });

                if scheduled {
                    state.session.phase = SessionPhase::Reconnecting;
                    state.session.reconnecting = true;
                    warn!(
                        owner_id = %self.owner_id,
                        attempt = state.scheduler.attempts(),
                        max = state.scheduler.max_attempts(),
                        "Connection lost, reconnecting"
                    );
                    self.notify(NotificationEvent::SessionStatus(StatusPayload::disconnected()));
                } else if state.scheduler.max_attempts_reached() {
                    self.terminate(state, MAX_ATTEMPTS_ERROR.to_string()).await;
                } else {
                    debug!(owner_id = %self.owner_id, "Reconnection already pending");
                }
            }
            Verdict::Terminal => {
                let reason = termination_reason(status_code, detail.as_deref());
                self.terminate(state, reason).await;
            }
        }
    }

    async fn reopen(&self, session_id: &str, kind: ReopenKind) {
        let mut state = self.state.lock().await;
        if !state.is_current(session_id) {
            debug!(owner_id = %self.owner_id, %session_id, "Ignoring reconnection for a replaced session");
            return;
        }

        let expected = match kind {
            ReopenKind::Retry => SessionPhase::Reconnecting,
            ReopenKind::Resocket => SessionPhase::AwaitingPairing,
        };
        if state.session.phase != expected || state.transport.is_some() {
            debug!(owner_id = %self.owner_id, phase = ?state.session.phase, ?kind, "Skipping stale reconnection");
            return;
        }

        info!(owner_id = %self.owner_id, %session_id, ?kind, "Reopening transport");
        if let Err(e) = self.open_transport(&mut state, session_id) {
            error!(owner_id = %self.owner_id, %session_id, "Failed to reopen transport: {}", e);
            self.terminate(&mut state, e.to_string()).await;
        }
    }

    /// End the session without user action and purge its credentials
    async fn terminate(&self, state: &mut ManagerState, error: String) {
        state.scheduler.cancel();
        self.release_transport(state).await;
        self.release_credentials(state).await;

        state.session.clear_identity();
        state.session.clear_pairing();
        state.session.reconnecting = false;
        state.session.phase = SessionPhase::Terminated;
        state.session.last_error = Some(error.clone());
        warn!(owner_id = %self.owner_id, %error, "Session terminated");

        self.notify(NotificationEvent::SessionStatus(StatusPayload::failed(error)));
    }

    fn open_transport(
        &self,
        state: &mut ManagerState,
        session_id: &str,
    ) -> Result<(), TransportError> {
        let credentials = state
            .credentials
            .clone()
            .ok_or_else(|| TransportError::OpenFailed("no credential directory".to_string()))?;

        let generation = state.next_generation;
        state.next_generation += 1;

        let params = TransportParams {
            owner_id: self.owner_id.clone(),
            session_id: session_id.to_string(),
            generation,
            credentials,
            events: EventSink::new(session_id.to_string(), generation, self.tx.clone()),
            logger: Arc::clone(&self.context.logger),
        };
        let transport = self.context.transports.open(params)?;

        state.transport = Some(transport);
        state.live_generation = Some(generation);
        debug!(owner_id = %self.owner_id, %session_id, generation, "Transport opened");
        Ok(())
    }

    async fn release_transport(&self, state: &mut ManagerState) {
        state.live_generation = None;
        if let Some(mut transport) = state.transport.take() {
            debug!(owner_id = %self.owner_id, generation = transport.generation(), "Closing transport");
            transport.close().await;
        }
    }

    async fn release_credentials(&self, state: &mut ManagerState) {
        if let Some(dir) = state.credentials.take()
            && let Err(e) = self.store.dispose(&dir).await
        {
            warn!(owner_id = %self.owner_id, "Failed to remove credentials: {}", e);
        }
    }

    async fn teardown(&self, state: &mut ManagerState) {
        state.scheduler.cancel();
        self.release_transport(state).await;
        self.release_credentials(state).await;
    }

    fn notify(&self, event: NotificationEvent) {
        debug!(owner_id = %self.owner_id, kind = event.kind(), "Notifying subscriber");
        self.context.notifier.notify(&self.owner_id, event);
    }
}

/// Strip device and server suffixes from an endpoint address
/// (`5491112345678:12@s.whatsapp.net` -> `5491112345678`)
/// Advertised expiry of a pairing artifact, saturating at the latest
/// representable instant
fn pairing_expiry(now: DateTime<Utc>, ttl: std::time::Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn normalize_identity(raw: &str) -> &str {
    raw.split([':', '@']).next().unwrap_or_default().trim()
}

fn termination_reason(status_code: Option<u16>, detail: Option<&str>) -> String {
    match (status_code, detail) {
        (Some(code), Some(detail)) => format!("connection closed ({code}): {detail}"),
        (Some(code), None) => format!("connection closed ({code})"),
        (None, Some(detail)) => format!("connection closed: {detail}"),
        (None, None) => "connection closed".to_string(),
    }
}
