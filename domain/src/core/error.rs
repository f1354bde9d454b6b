//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Worker roster is empty")]
    EmptyRoster,

    #[error("Duplicate worker id: {0}")]
    DuplicateWorker(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unknown session status: {0}")]
    UnknownStatus(String),
}

impl DomainError {
    /// Check if this error was caused by caller-supplied input
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, DomainError::InvalidInput(_))
    }
}
