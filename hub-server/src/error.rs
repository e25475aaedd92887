use std::net::SocketAddr;

use thiserror::Error;

/// Errors starting or running the HTTP server
#[derive(Error, Debug)]
pub enum ServerError {
    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: warp::Error,
    },

    /// The server task ended abnormally
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;
