//! Scripted transport for tests
//!
//! [`MockTransportFactory`] records every handle it opens. Tests grab a
//! [`MockTransportHandle`] and drive the manager by emitting the events a
//! real socket would produce.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{EventSink, Transport, TransportEvent, TransportFactory, TransportParams};
use crate::error::TransportError;

/// Test-side view of one opened transport
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    owner_id: String,
    credentials: PathBuf,
    events: EventSink,
    closed: Arc<AtomicBool>,
}

impl MockTransportHandle {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials
    }

    /// Whether the manager closed this handle
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.emit(event)
    }

    pub fn emit_pairing(&self, payload: &[u8]) -> bool {
        self.emit(TransportEvent::PairingAvailable {
            payload: payload.to_vec(),
        })
    }

    pub fn emit_authenticated(&self, identity: &str) -> bool {
        self.emit(TransportEvent::Authenticated {
            identity: Some(identity.to_string()),
        })
    }

    pub fn emit_closed(&self, status_code: u16) -> bool {
        self.emit(TransportEvent::Closed {
            status_code: Some(status_code),
            detail: None,
        })
    }
}

struct MockTransport {
    generation: u64,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for MockTransport {
    fn generation(&self) -> u64 {
        self.generation
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory that records every transport it opens
#[derive(Default)]
pub struct MockTransportFactory {
    opened: Mutex<Vec<MockTransportHandle>>,
    failures: Mutex<VecDeque<String>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` call fail with `message`
    pub fn fail_next_open(&self, message: &str) {
        lock(&self.failures).push_back(message.to_string());
    }

    /// Number of handles opened so far
    pub fn opened_count(&self) -> usize {
        lock(&self.opened).len()
    }

    /// Most recently opened handle
    pub fn latest(&self) -> Option<MockTransportHandle> {
        lock(&self.opened).last().cloned()
    }

    pub fn handle(&self, index: usize) -> Option<MockTransportHandle> {
        lock(&self.opened).get(index).cloned()
    }

    pub fn handles(&self) -> Vec<MockTransportHandle> {
        lock(&self.opened).clone()
    }
}

impl TransportFactory for MockTransportFactory {
    fn open(&self, params: TransportParams) -> Result<Box<dyn Transport>, TransportError> {
        if let Some(message) = lock(&self.failures).pop_front() {
            return Err(TransportError::OpenFailed(message));
        }

        let closed = Arc::new(AtomicBool::new(false));
        lock(&self.opened).push(MockTransportHandle {
            owner_id: params.owner_id,
            credentials: params.credentials.path().to_path_buf(),
            events: params.events,
            closed: Arc::clone(&closed),
        });

        Ok(Box::new(MockTransport {
            generation: params.generation,
            closed,
        }))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
