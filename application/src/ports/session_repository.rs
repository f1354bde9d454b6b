//! Session repository port
//!
//! Persistence contract for sessions, drafts and evaluations. Adapters live in
//! the infrastructure layer (in-memory and SQLite).
//!
//! Implementations must guarantee:
//!
//! - at most one draft per `(session, turn, round, worker)`
//! - at most one evaluation per `(session, turn, round)`
//! - `status == consensus` iff a final synthesis is stored
//! - deleting a session removes its drafts and evaluations

use async_trait::async_trait;
use council_domain::{Draft, Evaluation, RoundKey, Session, SessionId, SessionStatus};
use thiserror::Error;

/// Errors raised by repository adapters
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Session {0} not found")]
    NotFound(SessionId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a session in `thinking`, round 1 of turn 1
    async fn create_session(&self, query: &str, max_rounds: u32)
    -> Result<Session, RepositoryError>;

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError>;

    /// Set a non-consensus status, optionally moving the current round.
    /// Clears any stored final synthesis.
    async fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        round: Option<u32>,
    ) -> Result<(), RepositoryError>;

    /// Enter consensus with the accepted synthesis
    async fn record_consensus(&self, id: SessionId, synthesis: &str)
    -> Result<(), RepositoryError>;

    /// Open a follow-up turn on a concluded session and return the updated
    /// session. The prior synthesis moves into the session's background.
    async fn begin_follow_up(&self, id: SessionId, query: &str)
    -> Result<Session, RepositoryError>;

    /// Store one round's drafts atomically
    async fn create_drafts(&self, drafts: &[Draft]) -> Result<(), RepositoryError>;

    async fn create_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError>;

    /// Drafts of one round, ordered by worker id
    async fn get_drafts_for(&self, key: RoundKey) -> Result<Vec<Draft>, RepositoryError>;

    async fn get_evaluation_for(&self, key: RoundKey)
    -> Result<Option<Evaluation>, RepositoryError>;

    /// Every draft of a session, ordered by turn, round, then worker id
    async fn list_drafts(&self, id: SessionId) -> Result<Vec<Draft>, RepositoryError>;

    /// Every evaluation of a session, ordered by turn then round
    async fn list_evaluations(&self, id: SessionId) -> Result<Vec<Evaluation>, RepositoryError>;

    /// All sessions, most recently created first
    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError>;

    /// Remove a session and everything it owns. Returns whether it existed.
    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError>;
}
