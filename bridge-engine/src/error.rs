use thiserror::Error;

/// Errors reported by a broker port
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Publishing a message failed
    #[error("Failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },

    /// Subscribing to topics failed
    #[error("Failed to subscribe: {0}")]
    Subscribe(String),

    /// Unsubscribing from topics failed
    #[error("Failed to unsubscribe: {0}")]
    Unsubscribe(String),

    /// The broker connection is gone
    #[error("Broker connection closed")]
    Disconnected,
}

/// Errors delivering a notification to the hub
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Building the HTTP client failed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The hub answered with a non-success status
    #[error("Hub at {url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Errors surfaced by engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A broker operation the caller waits on failed
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The engine worker is no longer running
    #[error("Engine worker has stopped")]
    WorkerStopped,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_display() {
        let err = BrokerError::Publish {
            topic: "/smartthings/Lamp/switch".to_string(),
            reason: "not connected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to publish to /smartthings/Lamp/switch: not connected"
        );
    }

    #[test]
    fn test_engine_error_is_transparent_over_broker() {
        let err: EngineError = BrokerError::Subscribe("timeout".to_string()).into();
        assert_eq!(err.to_string(), "Failed to subscribe: timeout");
    }
}
