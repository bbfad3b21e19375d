//! Connectivity probing
//!
//! Every probe attempts to reach one remote endpoint within a bounded time
//! and reports a structured [`ProbeResult`]. Failures never escape a probe:
//! they are classified by [`ProbeError::kind`] and folded into the result.
//!
//! ## Types
//!
//! - [`Probe`]: the uniform contract shared by all variants
//! - [`SocketProbe`]: dial one `address:port` over TCP or UDP
//! - [`DatabaseProbe`]: open, ping and query a SQL database
//! - [`DirectoryProbe`]: TLS connect and bind against an LDAP directory
//! - [`WebProbe`]: HTTP GET a URL and capture the status
//! - [`ProbeError`]: the failure taxonomy

pub mod database;
pub mod directory;
pub mod error;
pub mod socket;
pub mod web;

pub use database::{DatabaseProbe, Engine};
pub use directory::DirectoryProbe;
pub use error::{error_chain, ProbeError};
pub use socket::{SocketProbe, Transport};
pub use web::WebProbe;

use crate::redact;
use async_trait::async_trait;
use schema::{ErrorKind, ProbeResult, ProbeSubject};
use tracing::{debug, warn};

/// Trait for connectivity probe implementations
///
/// Implementors provide [`Probe::check`]; callers use [`Probe::probe`],
/// which never fails and always yields exactly one result.
#[async_trait]
pub trait Probe: Send + Sync {
    /// What this probe is pointed at
    fn subject(&self) -> ProbeSubject;

    /// Credential values that must never appear in diagnostics
    fn secrets(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Perform the attempt, returning the success message
    ///
    /// Implementations must bound every blocking step by their timeout and
    /// release any connection they opened before returning.
    async fn check(&self) -> Result<String, ProbeError>;

    /// Failure text for the report
    fn failure_message(&self, err: &ProbeError) -> String {
        format!("{} failed: {}", self.subject(), err)
    }

    /// Run the attempt and fold the outcome into a [`ProbeResult`]
    async fn probe(&self) -> ProbeResult {
        let outcome = self.check().await;
        finish(self, outcome)
    }
}

/// Convert a check outcome into a result, scrubbing secrets from the text
pub(crate) fn finish<P: Probe + ?Sized>(
    probe: &P,
    outcome: Result<String, ProbeError>,
) -> ProbeResult {
    let subject = probe.subject();
    let secrets = probe.secrets();
    match outcome {
        Ok(message) => {
            debug!("probe of {} succeeded", subject);
            ProbeResult::ok(subject, redact::scrub(&message, &secrets))
        }
        Err(err) => {
            let kind = err.kind();
            let message = redact::scrub(&probe.failure_message(&err), &secrets);
            warn!("probe of {} failed ({}): {}", subject, kind, message);
            let result = ProbeResult::failed(subject, kind, message);
            if kind == ErrorKind::Auth {
                result.with_challenge()
            } else {
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::ProbeTarget;

    struct Fixed {
        outcome: fn() -> Result<String, ProbeError>,
    }

    #[async_trait]
    impl Probe for Fixed {
        fn subject(&self) -> ProbeSubject {
            ProbeTarget::new("192.0.2.7", "389", "tcp").into()
        }

        fn secrets(&self) -> Vec<&str> {
            vec!["letmein-please"]
        }

        async fn check(&self) -> Result<String, ProbeError> {
            (self.outcome)()
        }
    }

    #[tokio::test]
    async fn test_success_result() {
        let probe = Fixed {
            outcome: || Ok("all good".to_string()),
        };
        let result = probe.probe().await;
        assert!(result.success());
        assert_eq!(result.message(), "all good");
        assert_eq!(result.error_kind(), ErrorKind::None);
    }

    #[tokio::test]
    async fn test_failure_keeps_kind_and_target() {
        let probe = Fixed {
            outcome: || Err(ProbeError::Dial("connection refused".to_string())),
        };
        let result = probe.probe().await;
        assert!(!result.success());
        assert_eq!(result.error_kind(), ErrorKind::Dial);
        assert!(result.message().contains("192.0.2.7"));
        assert!(result.message().contains("connection refused"));
        assert!(!result.challenge());
    }

    #[tokio::test]
    async fn test_auth_failure_requests_challenge() {
        let probe = Fixed {
            outcome: || Err(ProbeError::Auth("invalid credentials".to_string())),
        };
        let result = probe.probe().await;
        assert_eq!(result.error_kind(), ErrorKind::Auth);
        assert!(result.challenge());
    }

    #[tokio::test]
    async fn test_secrets_are_scrubbed() {
        let probe = Fixed {
            outcome: || Err(ProbeError::Query("bad password letmein-please".to_string())),
        };
        let result = probe.probe().await;
        assert!(!result.message().contains("letmein-please"));
    }
}
