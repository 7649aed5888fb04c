use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the skewrun library.
#[derive(Error, Debug)]
pub enum SkewrunError {
    /// DNS resolution failure.
    #[error("dns: {0}")]
    Dns(String),
    /// No reply from the authority within the timeout.
    #[error("network: no reply from authority within {0:?}")]
    Timeout(Duration),
    /// Reply violated the wire format.
    #[error("protocol: {0}")]
    Protocol(String),
    /// Socket-level error.
    #[error("network: {0}")]
    Network(String),
    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Other error cases.
    #[error("other: {0}")]
    Other(String),
}
