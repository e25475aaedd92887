//! Error types for bridge-state

use std::path::PathBuf;

/// Result type for bridge-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while reading or writing the state snapshot
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Reading, writing or renaming a state file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be encoded or decoded
    #[error("Malformed state document {path}: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serde(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StateError::Serde {
            path: path.into(),
            source,
        }
    }
}
