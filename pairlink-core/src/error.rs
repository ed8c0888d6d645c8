//! Error types for pairlink-core

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for pairlink-core
#[derive(Error, Debug)]
pub enum PairlinkError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the per-session credential directory
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Invalid session id for credential directory: {0:?}")]
    InvalidSessionId(String),

    #[error("Failed to create credential directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove credential directory {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from turning a pairing payload into a scannable image
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Pairing payload is empty")]
    EmptyPayload,

    #[error("Failed to encode pairing code: {0}")]
    Encode(String),

    #[error("Failed to render pairing image: {0}")]
    Render(String),
}

/// Errors from opening or driving a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open transport: {0}")]
    OpenFailed(String),
}

/// Errors from loading manager configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
