//! Logging hook handed to transport implementations
//!
//! Messaging transport libraries tend to be noisy. The manager gives each
//! transport a [`TransportLogger`]; the default swallows everything.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Log levels for transport messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

pub trait TransportLogger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Drops every transport message
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentLogger;

impl TransportLogger for SilentLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Forwards transport messages to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TransportLogger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => debug!(target: "pairlink::transport", "{}", message),
            LogLevel::Info => info!(target: "pairlink::transport", "{}", message),
            LogLevel::Warn => warn!(target: "pairlink::transport", "{}", message),
            LogLevel::Error => error!(target: "pairlink::transport", "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
    }

    #[test]
    fn loggers_accept_every_level() {
        let loggers: [&dyn TransportLogger; 2] = [&SilentLogger, &TracingLogger];
        for logger in loggers {
            for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
                logger.log(level, "noise");
            }
        }
    }
}
