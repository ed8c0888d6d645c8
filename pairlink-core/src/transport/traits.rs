//! Transport trait and related types
//!
//! A transport is one live socket to the messaging network. It runs on its
//! own I/O tasks and reports what happens through the [`EventSink`] it was
//! opened with; the manager never polls it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::logger::TransportLogger;
use crate::credentials::CredentialDir;
use crate::error::TransportError;
use crate::session::manager::LoopMessage;

/// Something the transport observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A fresh pairing payload is ready to be shown to the user
    PairingAvailable { payload: Vec<u8> },
    /// The transport authenticated. `identity` is the endpoint address the
    /// network reported, if any.
    Authenticated { identity: Option<String> },
    /// The socket closed
    Closed {
        status_code: Option<u16>,
        detail: Option<String>,
    },
}

/// A transport event stamped with the handle that produced it
#[derive(Debug, Clone)]
pub(crate) struct TaggedEvent {
    pub session_id: String,
    pub generation: u64,
    pub event: TransportEvent,
}

/// Where a transport delivers its events
///
/// Every sink is bound to one session id and one handle generation. Events
/// from a handle the manager has already replaced are discarded on arrival.
#[derive(Debug, Clone)]
pub struct EventSink {
    session_id: String,
    generation: u64,
    tx: mpsc::UnboundedSender<LoopMessage>,
}

impl EventSink {
    pub(crate) fn new(
        session_id: String,
        generation: u64,
        tx: mpsc::UnboundedSender<LoopMessage>,
    ) -> Self {
        Self {
            session_id,
            generation,
            tx,
        }
    }

    /// Deliver an event. Returns `false` once the manager is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(LoopMessage::Transport(TaggedEvent {
                session_id: self.session_id.clone(),
                generation: self.generation,
                event,
            }))
            .is_ok()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Everything a transport needs to start
#[derive(Clone)]
pub struct TransportParams {
    pub owner_id: String,
    pub session_id: String,
    /// Increases with every handle the manager opens
    pub generation: u64,
    /// Where the transport reads and persists its credentials
    pub credentials: CredentialDir,
    pub events: EventSink,
    pub logger: Arc<dyn TransportLogger>,
}

/// A live connection handle
#[async_trait]
pub trait Transport: Send + Sync {
    /// Generation this handle was opened with
    fn generation(&self) -> u64;

    /// Release the socket. Must be safe to call on an already-closed handle.
    async fn close(&mut self);
}

/// Opens transports
///
/// Enables dependency injection of transport implementations.
pub trait TransportFactory: Send + Sync {
    /// Start connecting. Returns as soon as the handle exists; progress is
    /// reported through `params.events`.
    fn open(&self, params: TransportParams) -> Result<Box<dyn Transport>, TransportError>;
}
