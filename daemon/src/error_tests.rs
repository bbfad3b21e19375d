#[cfg(test)]
mod tests {
    use crate::{DaemonError, Result};
    use sonde_core::CoreError;
    use std::io;

    #[test]
    fn test_daemon_error_display() {
        let err = DaemonError::ServerError("Failed to bind to 0.0.0.0:3000".to_string());
        assert_eq!(err.to_string(), "Server error: Failed to bind to 0.0.0.0:3000");

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = DaemonError::IoError(io_err);
        assert!(err.to_string().contains("access denied"));

        let err: DaemonError = CoreError::ConfigurationError("bad level".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad level");
    }

    #[test]
    fn test_daemon_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        let daemon_err: DaemonError = io_err.into();

        if let DaemonError::IoError(_) = daemon_err {
            // Expected variant
        } else {
            panic!("Expected DaemonError::IoError variant");
        }
        assert_eq!(daemon_err.code(), "DAEMON002");
    }

    #[test]
    fn test_core_error_keeps_its_code() {
        let daemon_err: DaemonError = CoreError::InitializationError("twice".to_string()).into();
        assert_eq!(daemon_err.code(), "CORE003");
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<u32> {
            Ok(42)
        }

        fn returns_err() -> Result<u32> {
            Err(DaemonError::ServerError("test failure".to_string()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
