// Error handling module
// Defines the failure taxonomy shared by the servers, the runner and the suite

use std::path::PathBuf;

use thiserror::Error;

use crate::bench::scenario::Phase;

/// Errors that can occur while setting up, driving or tearing down a scenario
#[derive(Error, Debug)]
pub enum BenchError {
    /// Listening socket could not be bound (usually: port already in use)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-success HTTP status while driving traffic
    #[error("Request {iteration} of {phase} phase failed with status {status}")]
    RequestFailure {
        phase: Phase,
        iteration: usize,
        status: u16,
    },

    /// Request never produced a response (connect error, timeout, broken body)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Statistics could not be computed from the collected samples
    #[error("Aggregation error: {0}")]
    Aggregation(String),

    /// No scenario was declared as baseline
    #[error("No baseline scenario declared")]
    BaselineMissing,

    /// More than one scenario was declared as baseline
    #[error("Multiple baseline scenarios declared: {}", .0.join(", "))]
    BaselineDuplicate(Vec<String>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Log sink or routing file could not be written
    #[error("Sink error at {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A server failed to shut down cleanly
    #[error("Teardown error: {0}")]
    Teardown(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BenchError {
    /// Whether this error was raised before any listener could have been bound
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BenchError::Config(_) | BenchError::BaselineMissing | BenchError::BaselineDuplicate(_)
        )
    }
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::RequestFailure {
            phase: Phase::Measured,
            iteration: 3,
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "Request 3 of measured phase failed with status 500"
        );

        let err = BenchError::Aggregation("no samples".to_string());
        assert_eq!(err.to_string(), "Aggregation error: no samples");

        let err = BenchError::BaselineMissing;
        assert_eq!(err.to_string(), "No baseline scenario declared");
    }

    #[test]
    fn test_baseline_duplicate_message() {
        let err = BenchError::BaselineDuplicate(vec!["Critical".to_string(), "Error".to_string()]);
        assert_eq!(
            err.to_string(),
            "Multiple baseline scenarios declared: Critical, Error"
        );
    }

    #[test]
    fn test_bind_error_message() {
        let err = BenchError::Bind {
            addr: "127.0.0.1:5000".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(err.to_string(), "Failed to bind 127.0.0.1:5000: address in use");
    }

    #[test]
    fn test_sink_error_message() {
        let err = BenchError::Sink {
            path: PathBuf::from("/tmp/logs/x.log"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "Sink error at /tmp/logs/x.log: denied");
    }

    #[test]
    fn test_internal_error_message() {
        let err = BenchError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }

    #[test]
    fn test_configuration_classification() {
        assert!(BenchError::BaselineMissing.is_configuration());
        assert!(BenchError::BaselineDuplicate(vec![]).is_configuration());
        assert!(BenchError::Config("x".to_string()).is_configuration());
        assert!(!BenchError::Teardown("x".to_string()).is_configuration());
    }
}
