//! Error types for the agent.

use crate::engine::SyncOutcome;
use thiserror::Error;

/// Result type for agent operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync attempt.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The authority could not be reached or answered with something unusable
    /// (timeout, refused connection, non-success status, malformed body).
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// No device identity has been provisioned.
    #[error("device identity not provisioned")]
    IdentityMissing,

    /// Local storage failure.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Another agent holds the data directory.
    #[error("data directory {} is in use by another agent", path.display())]
    DataDirLocked {
        /// The contested directory.
        path: std::path::PathBuf,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A sync attempt aborted unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Returns true if a later attempt may succeed without outside help.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SyncError::IdentityMissing)
    }

    /// Maps the error to the outcome reported to the scheduler.
    pub fn outcome(&self) -> SyncOutcome {
        if self.is_retryable() {
            SyncOutcome::RetryableFailure
        } else {
            SyncOutcome::TerminalFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::network("connection refused").is_retryable());
        assert!(SyncError::Internal("worker panicked".into()).is_retryable());
        assert!(SyncError::Io(std::io::Error::other("disk")).is_retryable());
        assert!(!SyncError::IdentityMissing.is_retryable());
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(
            SyncError::network("timed out").outcome(),
            SyncOutcome::RetryableFailure
        );
        assert_eq!(
            SyncError::IdentityMissing.outcome(),
            SyncOutcome::TerminalFailure
        );
    }

    #[test]
    fn error_display() {
        let err = SyncError::network("authority returned status 404");
        assert_eq!(
            err.to_string(),
            "network error: authority returned status 404"
        );
        assert_eq!(
            SyncError::IdentityMissing.to_string(),
            "device identity not provisioned"
        );
    }
}
