//! In-memory session repository

use async_trait::async_trait;
use council_application::{RepositoryError, SessionRepository};
use council_domain::{Draft, Evaluation, RoundKey, Session, SessionId, SessionStatus, WorkerId};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

type DraftKey = (SessionId, u32, u32, WorkerId);
type EvaluationKey = (SessionId, u32, u32);

#[derive(Default)]
struct Store {
    next_id: i64,
    sessions: BTreeMap<SessionId, Session>,
    drafts: BTreeMap<DraftKey, Draft>,
    evaluations: BTreeMap<EvaluationKey, Evaluation>,
}

impl Store {
    fn session_mut(&mut self, id: SessionId) -> Result<&mut Session, RepositoryError> {
        self.sessions
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))
    }
}

fn draft_key(draft: &Draft) -> DraftKey {
    (draft.session_id, draft.turn, draft.round, draft.worker_id.clone())
}

fn evaluation_key(key: RoundKey) -> EvaluationKey {
    (key.session_id, key.turn, key.round)
}

/// Process-local repository; contents are lost on exit
#[derive(Default)]
pub struct InMemorySessionRepository {
    store: RwLock<Store>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create_session(
        &self,
        query: &str,
        max_rounds: u32,
    ) -> Result<Session, RepositoryError> {
        let mut store = self.store.write().await;
        store.next_id += 1;
        let session = Session::new(SessionId::new(store.next_id), query, max_rounds);
        store.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.store.read().await.sessions.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        round: Option<u32>,
    ) -> Result<(), RepositoryError> {
        if status.is_consensus() {
            return Err(RepositoryError::InvalidState(
                "consensus is recorded with its synthesis".to_string(),
            ));
        }
        let mut store = self.store.write().await;
        store.session_mut(id)?.set_status(status, round);
        Ok(())
    }

    async fn record_consensus(
        &self,
        id: SessionId,
        synthesis: &str,
    ) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        store.session_mut(id)?.conclude(synthesis);
        Ok(())
    }

    async fn begin_follow_up(
        &self,
        id: SessionId,
        query: &str,
    ) -> Result<Session, RepositoryError> {
        let mut store = self.store.write().await;
        let session = store.session_mut(id)?;
        session
            .begin_follow_up(query)
            .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
        Ok(session.clone())
    }

    async fn create_drafts(&self, drafts: &[Draft]) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;

        // Validate the whole batch before inserting any of it
        for draft in drafts {
            if !store.sessions.contains_key(&draft.session_id) {
                return Err(RepositoryError::NotFound(draft.session_id));
            }
            if store.drafts.contains_key(&draft_key(draft)) {
                return Err(RepositoryError::Conflict(format!(
                    "draft for {} by {} already exists",
                    draft.key(),
                    draft.worker_id
                )));
            }
        }

        for draft in drafts {
            store.drafts.insert(draft_key(draft), draft.clone());
        }
        Ok(())
    }

    async fn create_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        if !store.sessions.contains_key(&evaluation.session_id) {
            return Err(RepositoryError::NotFound(evaluation.session_id));
        }
        let key = evaluation_key(evaluation.key());
        if store.evaluations.contains_key(&key) {
            return Err(RepositoryError::Conflict(format!(
                "evaluation for {} already exists",
                evaluation.key()
            )));
        }
        store.evaluations.insert(key, evaluation.clone());
        Ok(())
    }

    async fn get_drafts_for(&self, key: RoundKey) -> Result<Vec<Draft>, RepositoryError> {
        let store = self.store.read().await;
        // BTreeMap order puts worker ids in ascending order within a round
        Ok(store
            .drafts
            .values()
            .filter(|d| d.key() == key)
            .cloned()
            .collect())
    }

    async fn get_evaluation_for(
        &self,
        key: RoundKey,
    ) -> Result<Option<Evaluation>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store.evaluations.get(&evaluation_key(key)).cloned())
    }

    async fn list_drafts(&self, id: SessionId) -> Result<Vec<Draft>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .drafts
            .values()
            .filter(|d| d.session_id == id)
            .cloned()
            .collect())
    }

    async fn list_evaluations(&self, id: SessionId) -> Result<Vec<Evaluation>, RepositoryError> {
        let store = self.store.read().await;
        Ok(store
            .evaluations
            .values()
            .filter(|e| e.session_id == id)
            .cloned()
            .collect())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        let store = self.store.read().await;
        let mut sessions: Vec<Session> = store.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let mut store = self.store.write().await;
        let existed = store.sessions.remove(&id).is_some();
        store.drafts.retain(|_, d| d.session_id != id);
        store.evaluations.retain(|_, e| e.session_id != id);
        Ok(existed)
    }
}
