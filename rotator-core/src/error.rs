//! Error types for rotator-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from snapshot and server-list operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, tagged with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (save path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot on disk could not be parsed.
    #[error("corrupt snapshot at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot parsed but violates an invariant (e.g. interval out of range).
    #[error("invalid snapshot at {path}: {reason}")]
    InvalidSnapshot { path: PathBuf, reason: String },

    /// A list name other than `A` or `B`.
    #[error("unknown server list '{0}'; expected A or B")]
    UnknownList(String),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
