//! Unified error types for the reading engine and its collaborators.

use std::fmt;
use std::io;

/// Engine-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Folder or panel path is not indexed (usually removed by a rescan)
    NotFound(String),
    /// Storage or filesystem access failed
    Io(String),
    /// Write denied by the storage backend or the filesystem
    Permission(String),
    /// Cached record disagrees with the store. Reserved: nothing raises it yet.
    StaleDataConflict(String),
    /// Path without a usable file name
    InvalidPath(String),
    /// Operation issued in the wrong session state
    Session(String),
}

impl EngineError {
    /// Returns true for [`EngineError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(msg) => write!(f, "not found: {}", msg),
            EngineError::Io(msg) => write!(f, "i/o error: {}", msg),
            EngineError::Permission(msg) => write!(f, "permission denied: {}", msg),
            EngineError::StaleDataConflict(msg) => write!(f, "stale data conflict: {}", msg),
            EngineError::InvalidPath(msg) => write!(f, "path is invalid: {}", msg),
            EngineError::Session(msg) => write!(f, "session error: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => EngineError::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => EngineError::Permission(err.to_string()),
            _ => EngineError::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Io(format!("catalog encoding: {}", err))
    }
}

impl From<notify_debouncer_mini::notify::Error> for EngineError {
    fn from(err: notify_debouncer_mini::notify::Error) -> Self {
        EngineError::Io(format!("file watcher: {}", err))
    }
}

/// Type alias for Results in this crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_kinds_map_to_taxonomy() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let other = io::Error::other("disk on fire");

        assert!(EngineError::from(missing).is_not_found());
        assert!(matches!(EngineError::from(denied), EngineError::Permission(_)));
        assert!(matches!(EngineError::from(other), EngineError::Io(_)));
    }

    #[test]
    fn test_display_keeps_message() {
        let err = EngineError::NotFound("/library/vol1".to_string());
        assert_eq!(err.to_string(), "not found: /library/vol1");
    }
}
