//! Disconnect classification
//!
//! Maps the status code the transport reports on close to what the manager
//! should do next. The mapping is a lookup table so new transport codes only
//! need a new row.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// What to do after the transport closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Expected right after a pairing scan. Reopen with the persisted
    /// credentials without spending a retry.
    RecoverableResocket,
    /// Transient loss, eligible for bounded reconnection
    Retry,
    /// Session is over; purge credentials
    Terminal,
}

/// Status codes reported by the messaging transport on close
pub mod codes {
    pub const LOGGED_OUT: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const CONNECTION_LOST: u16 = 408;
    pub const MULTIDEVICE_MISMATCH: u16 = 411;
    pub const CONNECTION_CLOSED: u16 = 428;
    pub const CONNECTION_REPLACED: u16 = 440;
    pub const BAD_SESSION: u16 = 500;
    pub const RESTART_REQUIRED: u16 = 515;
}

const DEFAULT_RULES: [(u16, Verdict); 8] = [
    (codes::RESTART_REQUIRED, Verdict::RecoverableResocket),
    (codes::CONNECTION_CLOSED, Verdict::Retry),
    (codes::CONNECTION_LOST, Verdict::Retry),
    (codes::LOGGED_OUT, Verdict::Terminal),
    (codes::FORBIDDEN, Verdict::Terminal),
    (codes::MULTIDEVICE_MISMATCH, Verdict::Terminal),
    (codes::CONNECTION_REPLACED, Verdict::Terminal),
    (codes::BAD_SESSION, Verdict::Terminal),
];

/// Table-driven status code to [`Verdict`] mapping
///
/// Codes not in the table, and closes without a code, are terminal.
#[derive(Debug, Clone)]
pub struct DisconnectClassifier {
    rules: HashMap<u16, Verdict>,
}

impl Default for DisconnectClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.into_iter().collect(),
        }
    }
}

impl DisconnectClassifier {
    /// A classifier with no rules; everything is terminal
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Add or replace the verdict for a status code
    pub fn with_rule(mut self, status_code: u16, verdict: Verdict) -> Self {
        self.rules.insert(status_code, verdict);
        self
    }

    pub fn classify(&self, status_code: Option<u16>, detail: Option<&str>) -> Verdict {
        let verdict = status_code
            .and_then(|code| self.rules.get(&code).copied())
            .unwrap_or(Verdict::Terminal);
        trace!(?status_code, ?detail, ?verdict, "Classified disconnect");
        verdict
    }
}
