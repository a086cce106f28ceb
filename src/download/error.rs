//! Error taxonomy for download sessions.
//!
//! Synchronous precondition failures (`AlreadyInProgress`,
//! `TransportUnavailable`) are returned from `start()` without creating a
//! session. Everything else is asynchronous, terminal for the session,
//! and surfaced exactly once via the delegate's failure callback. There
//! is no retry at this layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::manifest::ParseError;
use crate::transport::TransportError;

/// Errors that can occur during a download session.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A session for the same destination path is already active.
    #[error("a download to {path} is already in progress")]
    AlreadyInProgress {
        /// The contested destination path.
        path: PathBuf,
    },

    /// The streaming transport could not be acquired for a new session.
    #[error("streaming transport unavailable")]
    TransportUnavailable,

    /// Network or stream failure, host-reported.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Local file system write failure.
    #[error("storage error writing to {path}: {source}")]
    Storage {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest was malformed or unparsable.
    #[error("manifest parse error: {0}")]
    Parse(#[from] ParseError),

    /// The caller cancelled the session.
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// Creates a storage error with the path it happened on.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Creates an already-in-progress error.
    pub fn already_in_progress(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyInProgress { path: path.into() }
    }

    /// Stable machine-readable code for this error, used by the JSON
    /// progress output and exit-code mapping.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInProgress { .. } => "already_in_progress",
            Self::TransportUnavailable => "transport_unavailable",
            Self::Transport(_) => "transport_error",
            Self::Storage { .. } => "storage_error",
            Self::Parse(_) => "parse_error",
            Self::Cancelled => "cancelled",
        }
    }
}
