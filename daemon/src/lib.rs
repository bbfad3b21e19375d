//! Daemon library for the Sonde project
//!
//! Exposes the core probes over HTTP. See [`routes`] for the probe endpoints
//! and how probe outcomes map to status codes, and [`diagnostics`] for the
//! endpoints that describe the daemon itself.

pub mod diagnostics;
pub mod error;
pub mod routes;
pub mod server;

#[cfg(test)]
mod error_tests;

pub use error::{DaemonError, Result};
pub use server::{app, AppState, Daemon, DaemonConfig};
