use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the command channel, rotation loop and service management.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("core error: {0}")]
    Core(#[from] rotator_core::CoreError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Nobody is reading the command channel.
    #[error("command channel unavailable ({endpoint}); is the daemon running?")]
    ChannelUnavailable { endpoint: String },

    /// The transport kept rejecting the write.
    #[error("command channel rejected write after {attempts} attempts: {source}")]
    ChannelTransient {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// The command queue was at capacity; the message was dropped.
    #[error("command queue full ({capacity} pending); message dropped")]
    QueueFull { capacity: usize },

    #[error("connection backend error: {0}")]
    Backend(String),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("service unit error: {0}")]
    Service(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
