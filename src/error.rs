//! Error types for the fetch path and the physical display surface.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while acquiring or decoding the realtime feed.
///
/// None of these are fatal to the monitor: the scheduler treats every variant
/// as a failed fetch and retries on the short cadence.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Request failed before a response arrived (DNS, TLS, timeout, ...).
    #[error("feed request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("feed endpoint returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("invalid feed URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Local feed file could not be read.
    #[error("could not read feed file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Payload is not a GTFS-Realtime `FeedMessage`.
    #[error("feed payload is not valid GTFS-Realtime: {0}")]
    Decode(#[from] prost::DecodeError),
}

impl MonitorError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::Network(_) | MonitorError::HttpStatus { .. } => "network",
            MonitorError::InvalidUrl { .. } => "config",
            MonitorError::Io { .. } => "io",
            MonitorError::Decode(_) => "decode",
        }
    }
}

/// Errors raised by a physical display write.
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("display write timed out after {0:?}")]
    Timeout(Duration),

    #[error("display write task aborted: {0}")]
    Join(String),

    /// An earlier write to the same device is still running.
    #[error("display busy with an earlier write")]
    Busy,
}
