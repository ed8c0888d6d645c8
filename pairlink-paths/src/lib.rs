//! Transient storage paths for pairlink.
//!
//! Session credentials are short-lived and must not outlive the machine's
//! login session, so they live under the XDG runtime directory rather than
//! the data directory. Hosts without a runtime directory fall back to the
//! system temp directory.

use std::path::PathBuf;

/// Get the pairlink runtime directory.
///
/// Returns `$XDG_RUNTIME_DIR/pairlink` if set, otherwise the platform
/// runtime directory, otherwise `<temp>/pairlink`.
///
/// # Examples
///
/// ```
/// use pairlink_paths::runtime_dir;
///
/// let runtime = runtime_dir();
/// let sockets = runtime.join("sockets");
/// ```
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR")
        && !xdg_runtime.is_empty()
    {
        PathBuf::from(xdg_runtime).join("pairlink")
    } else if let Some(runtime) = dirs::runtime_dir() {
        runtime.join("pairlink")
    } else {
        std::env::temp_dir().join("pairlink")
    }
}

/// Get the root directory for per-session credential directories.
///
/// Each session gets `<session_root>/<session_id>`.
pub fn session_root() -> PathBuf {
    runtime_dir().join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_dir_ends_with_pairlink() {
        let path = runtime_dir();
        assert!(
            path.ends_with("pairlink"),
            "runtime_dir should end with 'pairlink'"
        );
    }

    #[test]
    fn test_session_root_is_under_runtime_dir() {
        let root = session_root();
        assert!(root.ends_with("pairlink/sessions"));
    }

    #[test]
    fn test_runtime_dir_respects_xdg_env() {
        let previous = std::env::var("XDG_RUNTIME_DIR").ok();
        unsafe {
            std::env::set_var("XDG_RUNTIME_DIR", "/tmp/test-runtime");
        }
        let path = runtime_dir();
        assert_eq!(path, PathBuf::from("/tmp/test-runtime/pairlink"));
        unsafe {
            match previous {
                Some(value) => std::env::set_var("XDG_RUNTIME_DIR", value),
                None => std::env::remove_var("XDG_RUNTIME_DIR"),
            }
        }
    }
}
