//! Transport error types.

use thiserror::Error;

/// Network reactor errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or poll failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Address string could not be turned into a socket address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Ban pattern is not a valid regular expression
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// `start` called while the network is running
    #[error("network is already running")]
    AlreadyRunning,

    /// Operation needs a running network
    #[error("network is not running")]
    NotRunning,

    /// Reactor thread has gone away
    #[error("network reactor has shut down")]
    Closed,
}
