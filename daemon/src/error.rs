//! Daemon error types

use thiserror::Error;

/// Failures that stop the daemon itself
///
/// Probe failures never show up here; they are reported to the caller as
/// HTTP responses.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    CoreError(#[from] sonde_core::CoreError),
}

impl DaemonError {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            DaemonError::ServerError(_) => "DAEMON001",
            DaemonError::IoError(_) => "DAEMON002",
            DaemonError::CoreError(inner) => inner.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DaemonError>;
