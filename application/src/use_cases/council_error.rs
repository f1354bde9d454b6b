//! Errors surfaced by the council use cases.

use crate::ports::session_repository::RepositoryError;
use council_domain::{DomainError, SessionId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CouncilError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    #[error("Storage error: {0}")]
    Storage(RepositoryError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl CouncilError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CouncilError::Cancelled)
    }

    /// Whether the caller sent something unusable (maps to HTTP 4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CouncilError::InvalidInput(_) | CouncilError::SessionNotFound(_)
        )
    }
}

impl From<DomainError> for CouncilError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidInput(message) => CouncilError::InvalidInput(message),
            other => CouncilError::InvalidInput(other.to_string()),
        }
    }
}

impl From<RepositoryError> for CouncilError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => CouncilError::SessionNotFound(id),
            other => CouncilError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_message() {
        let error = CouncilError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
        assert!(error.is_cancelled());
        assert!(!error.is_client_error());
    }

    #[test]
    fn test_domain_error_becomes_invalid_input() {
        let error: CouncilError = DomainError::InvalidInput("query is empty".into()).into();
        assert!(matches!(error, CouncilError::InvalidInput(_)));
        assert!(error.is_client_error());
    }

    #[test]
    fn test_repository_not_found_maps_to_session_not_found() {
        let error: CouncilError = RepositoryError::NotFound(SessionId::new(4)).into();
        assert!(matches!(error, CouncilError::SessionNotFound(id) if id == SessionId::new(4)));

        let error: CouncilError = RepositoryError::Backend("disk full".into()).into();
        assert!(matches!(error, CouncilError::Storage(_)));
    }
}
