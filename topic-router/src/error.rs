//! Error types for topic routing.

use std::path::PathBuf;

/// Errors raised while validating topics and subscription filters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    /// Topics and filters must contain at least one character
    #[error("Topic cannot be empty")]
    Empty,

    /// `#` may only appear as the final segment of a filter
    #[error("Multi-level wildcard must be the last segment in filter: {0}")]
    MisplacedMultiLevelWildcard(String),

    /// Wildcard characters must occupy a whole segment
    #[error("Wildcard must occupy an entire segment in filter: {0}")]
    PartialWildcard(String),
}

/// Errors raised while loading the device directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The directory file could not be read
    #[error("Failed to read device directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory file is not valid TOML or has the wrong shape
    #[error("Failed to parse device directory {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Convenience alias for topic validation results.
pub type Result<T> = std::result::Result<T, TopicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_error_display() {
        assert_eq!(TopicError::Empty.to_string(), "Topic cannot be empty");

        let error = TopicError::MisplacedMultiLevelWildcard("a/#/b".to_string());
        assert_eq!(
            error.to_string(),
            "Multi-level wildcard must be the last segment in filter: a/#/b"
        );

        let error = TopicError::PartialWildcard("a/b+".to_string());
        assert!(error.to_string().contains("a/b+"));
    }

    #[test]
    fn test_directory_error_display() {
        let error = DirectoryError::Read {
            path: PathBuf::from("/tmp/devices.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(error.to_string().contains("/tmp/devices.toml"));
        assert!(error.to_string().contains("missing"));
    }
}
