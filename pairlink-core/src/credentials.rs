//! Per-session credential directories
//!
//! The transport persists its authentication material inside the directory
//! it is handed. The directory must survive a resocket (the transport
//! reopens with the persisted credentials) and is deleted when the session
//! terminates or is disconnected.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CredentialError;

/// Handle to a provisioned credential directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDir {
    session_id: String,
    path: PathBuf,
}

impl CredentialDir {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Owns the transient storage root under which session directories live
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a session id maps to, whether or not it exists
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Create a fresh, empty directory for `session_id`
    ///
    /// Anything left behind under the same id is removed first.
    pub async fn provision(&self, session_id: &str) -> Result<CredentialDir, CredentialError> {
        validate_session_id(session_id)?;
        let path = self.path_for(session_id);

        remove_if_present(&path).await?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| CredentialError::Create {
                path: path.clone(),
                source,
            })?;

        debug!(session_id, path = %path.display(), "Provisioned credential directory");
        Ok(CredentialDir {
            session_id: session_id.to_string(),
            path,
        })
    }

    /// Recursively remove a credential directory. Missing paths are fine.
    pub async fn dispose(&self, dir: &CredentialDir) -> Result<(), CredentialError> {
        remove_if_present(&dir.path).await?;
        debug!(session_id = %dir.session_id, "Disposed credential directory");
        Ok(())
    }
}

async fn remove_if_present(path: &Path) -> Result<(), CredentialError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CredentialError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Session ids become a single path component
fn validate_session_id(session_id: &str) -> Result<(), CredentialError> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CredentialError::InvalidSessionId(session_id.to_string()))
    }
}
