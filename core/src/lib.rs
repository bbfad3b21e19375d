//! Core functionality for the Sonde project
//!
//! This crate holds the probing logic: target resolution, the probe
//! variants, multi-target runs and report rendering. The HTTP boundary in
//! the daemon crate only parses requests and maps outcomes to statuses.

pub mod config;
pub mod error;
pub mod probe;
pub mod redact;
pub mod report;
pub mod resolver;
pub mod runner;


// Re-export schema types for convenience
pub use schema::*;

pub use config::{EnvLookup, Settings};
pub use error::{CoreError, Result};
pub use probe::{DatabaseProbe, DirectoryProbe, Engine, Probe, ProbeError, SocketProbe, WebProbe};
pub use resolver::{Lookup, Resolver, SystemLookup};
pub use runner::Runner;

/// Core utilities and helper functions
pub mod utils {
    use tracing::info;

    /// Initialize tracing for the application
    ///
    /// `RUST_LOG` takes precedence over `level` when set.
    pub fn init_tracing(level: &str) -> crate::Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .map_err(|e| crate::CoreError::ConfigurationError(format!("log level '{level}': {e}")))?;

        fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| crate::CoreError::InitializationError(e.to_string()))?;

        info!("Tracing initialized with level: {}", level);
        Ok(())
    }
}
