//! Error types for probe attempts

use schema::ErrorKind;
use std::time::Duration;
use thiserror::Error;

/// Why a probe attempt did not succeed
///
/// The text carried by each variant is the underlying cause, preserved for
/// diagnostics. It must never contain credential material.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Name or address resolution failed
    #[error("{0}")]
    Resolve(String),

    /// Transport-level connect failure
    #[error("{0}")]
    Dial(String),

    /// Socket error raised while dialing
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// A bounded step exceeded its deadline
    #[error("i/o timeout after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    /// Credentials were rejected
    #[error("{0}")]
    Auth(String),

    /// A protocol operation failed after connecting
    #[error("{0}")]
    Query(String),

    /// The requested engine or protocol is not supported
    #[error("unsupported {0}")]
    Unsupported(String),
}

impl ProbeError {
    /// Classification used in reports and by the HTTP boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Resolve(_) => ErrorKind::Resolve,
            ProbeError::Dial(_) | ProbeError::Io(_) => ErrorKind::Dial,
            ProbeError::Timeout(_) => ErrorKind::Timeout,
            ProbeError::Auth(_) => ErrorKind::Auth,
            ProbeError::Query(_) => ErrorKind::Query,
            ProbeError::Unsupported(_) => ErrorKind::Unknown,
        }
    }
}

/// Render an error and its whole `source()` chain on one line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let next = cause.to_string();
        if !text.contains(&next) {
            text.push_str(": ");
            text.push_str(&next);
        }
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_kinds() {
        assert_eq!(ProbeError::Resolve("x".into()).kind(), ErrorKind::Resolve);
        assert_eq!(ProbeError::Dial("x".into()).kind(), ErrorKind::Dial);
        assert_eq!(
            ProbeError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")).kind(),
            ErrorKind::Dial
        );
        assert_eq!(ProbeError::Timeout(Duration::from_secs(1)).kind(), ErrorKind::Timeout);
        assert_eq!(ProbeError::Auth("x".into()).kind(), ErrorKind::Auth);
        assert_eq!(ProbeError::Query("x".into()).kind(), ErrorKind::Query);
        assert_eq!(ProbeError::Unsupported("x".into()).kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_timeout_display() {
        let err = ProbeError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "i/o timeout after 1s 500ms");
    }

    #[test]
    fn test_error_chain_appends_sources() {
        #[derive(Debug, Error)]
        #[error("outer")]
        struct Outer(#[source] io::Error);

        let err = Outer(io::Error::new(io::ErrorKind::Other, "inner cause"));
        assert_eq!(error_chain(&err), "outer: inner cause");
    }
}
