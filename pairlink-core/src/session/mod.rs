//! Session management

pub mod manager;
pub mod registry;
pub mod state;

// Re-export key types for convenience
pub use manager::{ConnectData, ConnectResponse, MAX_ATTEMPTS_ERROR, ManagerContext, SessionManager};
pub use registry::SessionRegistry;
pub use state::{SessionPhase, SessionState};
