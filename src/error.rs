//! Error types for trelay.

use std::time::Duration;
use thiserror::Error;

/// Exit codes for the trelay process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal exit
    Success = 0,
    /// Bind/listen failed at startup
    ListenFailed = 10,
    /// Invalid configuration
    Config = 11,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for trelay.
#[derive(Debug, Error)]
pub enum Error {
    #[error("listen failed: {0}")]
    ListenFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::ListenFailed(_) => ExitCode::ListenFailed,
            Error::Config(_) => ExitCode::Config,
            Error::Io(_) => ExitCode::ListenFailed,
        }
    }
}

/// Result type alias for trelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal failure of one relay direction or of the whole session.
///
/// Any of these invalidates the stream: the owning session force-closes both
/// connections instead of waiting for a graceful EOF on the healthy side.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("relay I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session idle for {0:?}")]
    IdleTimeout(Duration),

    #[error("relay task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_failed_maps_to_listen_exit_code() {
        let err = Error::ListenFailed("address in use".to_string());
        assert_eq!(err.exit_code(), ExitCode::ListenFailed);
        assert_eq!(i32::from(err.exit_code()), 10);
    }

    #[test]
    fn config_error_maps_to_config_exit_code() {
        let err = Error::Config("bad address".to_string());
        assert_eq!(err.exit_code(), ExitCode::Config);
    }

    #[test]
    fn pump_error_display_includes_cause() {
        let err = PumpError::IdleTimeout(Duration::from_secs(60));
        assert!(err.to_string().contains("idle"));

        let io = PumpError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(io.to_string().contains("reset by peer"));
    }
}
