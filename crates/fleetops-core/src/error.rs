//! Error types for fleetops-core

use thiserror::Error;
use uuid::Uuid;

use crate::model::HostStatus;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Task not found
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// Host not found
    #[error("host not found: {0}")]
    HostNotFound(Uuid),

    /// Host execution not found
    #[error("host execution not found: {0}")]
    ExecutionNotFound(Uuid),

    /// Request rejected before any work was started
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Host execution status would move backwards or skip `running`
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: HostStatus,
        /// Requested status
        to: HostStatus,
    },

    /// SSH transport error
    #[error("ssh error: {0}")]
    Ssh(#[from] fleetops_ssh::Error),

    /// Internal error (corrupt rows, IO, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error means a referenced record does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::TaskNotFound(_) | Error::HostNotFound(_) | Error::ExecutionNotFound(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::TaskNotFound(Uuid::new_v4()).is_not_found());
        assert!(Error::HostNotFound(Uuid::new_v4()).is_not_found());
        assert!(!Error::InvalidRequest("empty command".to_string()).is_not_found());
    }

    #[test]
    fn test_transition_message() {
        let err = Error::InvalidTransition {
            from: HostStatus::Success,
            to: HostStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            "invalid status transition: success -> running"
        );
    }
}
