//! Crate-level errors
//!
//! Probe failures are normally folded into a `ProbeResult` and never reach
//! this type. `CoreError` covers what happens around probing: unusable
//! settings, rejected caller input, and process setup.

use schema::ErrorKind;
use thiserror::Error;

use crate::probe::ProbeError;

#[derive(Error, Debug)]
pub enum CoreError {
    /// An environment setting could not be used
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A caller-supplied value was rejected before any probe ran
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Process-wide setup such as the tracing subscriber failed
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Probe error: {0}")]
    ProbeError(#[from] ProbeError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CoreError {
    /// Stable code for logs and operator tooling
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ConfigurationError(_) => "CORE001",
            CoreError::ValidationError(_) => "CORE002",
            CoreError::InitializationError(_) => "CORE003",
            CoreError::ProbeError(_) => "CORE004",
            CoreError::SerializationError(_) => "CORE005",
        }
    }

    /// Probe classification, `Unknown` for errors raised outside a probe
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ProbeError(inner) => inner.kind(),
            _ => ErrorKind::Unknown,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
