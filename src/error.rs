use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(
        "poll interval {interval:?} must be non-zero and shorter than \
         the minimum pulse width {limit:?}"
    )]
    PollInterval { interval: Duration, limit: Duration },
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("failed to start association: {0}")]
    Association(#[from] std::io::Error),

    #[error("could not resolve {target}: {reason}")]
    Resolve { target: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("session is not connected")]
    NotConnected,

    #[error("session closed by the collector")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
