//! Reconnection scheduling for dropped transports

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ManagerConfig;

/// Bounded, delayed reconnection controller
///
/// Counted attempts go through [`attempt`](Self::attempt) and are refused
/// once the ceiling is reached or while another attempt is still waiting
/// on its delay. [`resocket`](Self::resocket) is never counted.
///
/// At most one delayed action is pending at a time. Arming a new one, or
/// calling [`cancel`](Self::cancel), stops the previous timer before its
/// action runs. Actions still need to check that the session they were
/// scheduled for is the current one, since a timer can fire in the window
/// between expiry and cancellation.
#[derive(Debug)]
pub struct ReconnectionScheduler {
    max_attempts: u32,
    retry_delay: Duration,
    resocket_delay: Duration,
    attempts: u32,
    in_flight: Arc<AtomicBool>,
    pending: Option<CancellationToken>,
}

impl ReconnectionScheduler {
    pub fn new(max_attempts: u32, retry_delay: Duration, resocket_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
            resocket_delay,
            attempts: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
            pending: None,
        }
    }

    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(
            config.max_reconnect_attempts,
            config.reconnect_delay(),
            config.resocket_delay(),
        )
    }

    /// Schedule a counted reconnection
    ///
    /// Returns `false` without scheduling anything if an attempt is already
    /// waiting or the ceiling has been reached.
    pub fn attempt<F>(&mut self, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_reconnecting() || self.max_attempts_reached() {
            return false;
        }

        self.cancel();
        self.attempts += 1;
        self.in_flight.store(true, Ordering::SeqCst);
        debug!(
            attempt = self.attempts,
            max = self.max_attempts,
            "Scheduling reconnection"
        );

        let in_flight = Arc::clone(&self.in_flight);
        self.spawn_delayed(self.retry_delay, async move {
            in_flight.store(false, Ordering::SeqCst);
            action.await;
        });
        true
    }

    /// Schedule an uncounted reopen after the resocket delay
    pub fn resocket<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Scheduling resocket");
        self.cancel();
        self.spawn_delayed(self.resocket_delay, action);
    }

    /// Zero the attempt counter
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Drop any pending action
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn max_attempts_reached(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// True while a counted attempt is waiting on its delay
    pub fn is_reconnecting(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn spawn_delayed<F>(&mut self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        self.pending = Some(token.clone());

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Delayed reconnection cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    action.await;
                }
            }
        });
    }
}

impl Drop for ReconnectionScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
