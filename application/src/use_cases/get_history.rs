//! Get History use case
//!
//! Read side of the council: concluded sessions for the history list, and a
//! single session with every draft and evaluation it owns.

use crate::ports::session_repository::SessionRepository;
use crate::use_cases::council_error::CouncilError;
use council_domain::{HistoryEntry, RoundKey, Session, SessionDetail, SessionId};
use futures::future::try_join_all;
use std::sync::Arc;

pub struct GetHistoryUseCase<R: SessionRepository + 'static> {
    repository: Arc<R>,
}

impl<R: SessionRepository + 'static> GetHistoryUseCase<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Concluded sessions, most recent first.
    ///
    /// The score is the one from the evaluation that produced the consensus;
    /// the timestamp is when the session concluded.
    pub async fn execute(&self) -> Result<Vec<HistoryEntry>, CouncilError> {
        let concluded: Vec<Session> = self
            .repository
            .list_sessions()
            .await?
            .into_iter()
            .filter(Session::is_concluded)
            .collect();

        let finals = try_join_all(concluded.iter().map(|session| {
            self.repository.get_evaluation_for(RoundKey::new(
                session.id,
                session.turn,
                session.current_round,
            ))
        }))
        .await?;

        Ok(concluded
            .into_iter()
            .zip(finals)
            .filter_map(|(session, evaluation)| {
                Some(HistoryEntry {
                    id: session.id,
                    final_synthesis: session.final_consensus?,
                    query: session.query,
                    timestamp: session.updated_at,
                    score: evaluation.map_or(0, |e| e.score),
                })
            })
            .collect())
    }

    /// Every session, concluded or not, most recently created first
    pub async fn list_sessions(&self) -> Result<Vec<Session>, CouncilError> {
        Ok(self.repository.list_sessions().await?)
    }

    pub async fn session_detail(&self, id: SessionId) -> Result<SessionDetail, CouncilError> {
        let session = self
            .repository
            .get_session(id)
            .await?
            .ok_or(CouncilError::SessionNotFound(id))?;
        let drafts = self.repository.list_drafts(id).await?;
        let evaluations = self.repository.list_evaluations(id).await?;

        Ok(SessionDetail {
            session,
            drafts,
            evaluations,
        })
    }
}
