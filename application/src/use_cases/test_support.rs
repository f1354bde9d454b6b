//! Scripted doubles shared by the use case tests.

use crate::ports::council_event::{CouncilEvent, CouncilEventSink};
use crate::ports::llm_gateway::{CompletionRequest, GatewayError, LlmGateway, StreamHandle};
use crate::ports::session_repository::{RepositoryError, SessionRepository};
use async_trait::async_trait;
use council_domain::{
    Draft, Evaluation, Persona, Roster, RoundKey, Session, SessionId, SessionStatus, StreamEvent,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// Three workers whose system prompts are simply their instruction markers
pub fn test_roster() -> Roster {
    Roster::new(vec![
        Persona::new("worker-a", "The Skeptic", "Analyst", "persona-a"),
        Persona::new("worker-b", "The Visionary", "Strategist", "persona-b"),
        Persona::new("worker-c", "The Realist", "Operator", "persona-c"),
    ])
    .unwrap()
}

pub fn verdict_json(score: u8, critique: &str, synthesis: &str, stop: bool) -> String {
    serde_json::json!({
        "synthesis": synthesis,
        "critique": critique,
        "score": score,
        "stop": stop,
    })
    .to_string()
}

/// How a scripted worker behaves
#[derive(Debug, Clone)]
pub enum WorkerScript {
    Reply(String),
    Fail(String),
    /// Never answers; only a timeout or cancellation ends the call
    Hang,
    /// Answers after a delay
    Slow(Duration, String),
}

#[derive(Debug, Clone)]
pub enum JudgeScript {
    Reply(String),
    Fail(String),
    Hang,
}

/// Gateway whose workers are told apart by their system prompt prefix and
/// whose judge is any request expecting JSON.
#[derive(Default)]
pub struct ScriptedGateway {
    workers: HashMap<String, WorkerScript>,
    judge: Mutex<VecDeque<JudgeScript>>,
    requests: Mutex<Vec<CompletionRequest>>,
    streaming: bool,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn with_worker(mut self, marker: &str, script: WorkerScript) -> Self {
        self.workers.insert(marker.to_string(), script);
        self
    }

    pub fn with_judge(self, script: JudgeScript) -> Self {
        self.judge.lock().unwrap().push_back(script);
        self
    }

    pub fn push_judge(&self, script: JudgeScript) {
        self.judge.lock().unwrap().push_back(script);
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn worker_calls(&self) -> usize {
        self.requests().iter().filter(|r| !r.json_response).count()
    }

    pub fn judge_calls(&self) -> usize {
        self.requests().iter().filter(|r| r.json_response).count()
    }

    pub fn judge_prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.json_response)
            .filter_map(|r| r.last_user_content().map(str::to_string))
            .collect()
    }

    fn worker_script(&self, request: &CompletionRequest) -> WorkerScript {
        self.workers
            .iter()
            .find(|(marker, _)| request.system.starts_with(marker.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| {
                let marker = request.system.split_whitespace().next().unwrap_or("worker");
                WorkerScript::Reply(format!("draft from {}", marker))
            })
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());

        if request.json_response {
            let script = self
                .judge
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| JudgeScript::Reply(verdict_json(50, "dig deeper", "S", false)));
            return match script {
                JudgeScript::Reply(text) => Ok(text),
                JudgeScript::Fail(e) => Err(GatewayError::RequestFailed(e)),
                JudgeScript::Hang => futures::future::pending().await,
            };
        }

        match self.worker_script(request) {
            WorkerScript::Reply(text) => Ok(text),
            WorkerScript::Fail(e) => Err(GatewayError::RequestFailed(e)),
            WorkerScript::Hang => futures::future::pending().await,
            WorkerScript::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }

    async fn stream_complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamHandle, GatewayError> {
        let text = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(8);
        if self.streaming {
            let mid = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
            let (head, tail) = text.split_at(mid);
            let _ = tx.send(StreamEvent::Delta(head.to_string())).await;
            let _ = tx.send(StreamEvent::Delta(tail.to_string())).await;
        }
        let _ = tx.send(StreamEvent::Completed(text)).await;
        Ok(StreamHandle::new(rx))
    }
}

/// Sink that keeps every event for later assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CouncilEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<CouncilEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(CouncilEvent::name).collect()
    }
}

impl CouncilEventSink for RecordingSink {
    fn emit(&self, event: CouncilEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
struct Store {
    next_id: i64,
    sessions: Vec<Session>,
    drafts: Vec<Draft>,
    evaluations: Vec<Evaluation>,
}

/// Minimal repository used by application tests
#[derive(Default)]
pub struct TestRepository {
    store: Mutex<Store>,
    fail_evaluation_writes: AtomicBool,
    fail_draft_writes: AtomicBool,
}

impl TestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_evaluation_writes(&self, fail: bool) {
        self.fail_evaluation_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_draft_writes(&self, fail: bool) {
        self.fail_draft_writes.store(fail, Ordering::SeqCst);
    }

    pub fn evaluation_count(&self) -> usize {
        self.store.lock().unwrap().evaluations.len()
    }

    pub fn draft_count(&self) -> usize {
        self.store.lock().unwrap().drafts.len()
    }

    fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut Session) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let session = store
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepositoryError::NotFound(id))?;
        f(session)
    }
}

#[async_trait]
impl SessionRepository for TestRepository {
    async fn create_session(
        &self,
        query: &str,
        max_rounds: u32,
    ) -> Result<Session, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        store.next_id += 1;
        let session = Session::new(SessionId::new(store.next_id), query, max_rounds);
        store.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: SessionId,
        status: SessionStatus,
        round: Option<u32>,
    ) -> Result<(), RepositoryError> {
        self.with_session(id, |s| {
            s.set_status(status, round);
            Ok(())
        })
    }

    async fn record_consensus(
        &self,
        id: SessionId,
        synthesis: &str,
    ) -> Result<(), RepositoryError> {
        self.with_session(id, |s| {
            s.conclude(synthesis);
            Ok(())
        })
    }

    async fn begin_follow_up(
        &self,
        id: SessionId,
        query: &str,
    ) -> Result<Session, RepositoryError> {
        self.with_session(id, |s| {
            s.begin_follow_up(query)
                .map_err(|e| RepositoryError::InvalidState(e.to_string()))?;
            Ok(s.clone())
        })
    }

    async fn create_drafts(&self, drafts: &[Draft]) -> Result<(), RepositoryError> {
        if self.fail_draft_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("draft write failed".into()));
        }
        let mut store = self.store.lock().unwrap();
        for draft in drafts {
            let duplicate = store
                .drafts
                .iter()
                .any(|d| d.key() == draft.key() && d.worker_id == draft.worker_id);
            if duplicate {
                return Err(RepositoryError::Conflict(format!(
                    "draft for {} by {} exists",
                    draft.key(),
                    draft.worker_id
                )));
            }
        }
        store.drafts.extend(drafts.iter().cloned());
        Ok(())
    }

    async fn create_evaluation(&self, evaluation: &Evaluation) -> Result<(), RepositoryError> {
        if self.fail_evaluation_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend("evaluation write failed".into()));
        }
        let mut store = self.store.lock().unwrap();
        if store.evaluations.iter().any(|e| e.key() == evaluation.key()) {
            return Err(RepositoryError::Conflict(format!(
                "evaluation for {} exists",
                evaluation.key()
            )));
        }
        store.evaluations.push(evaluation.clone());
        Ok(())
    }

    async fn get_drafts_for(&self, key: RoundKey) -> Result<Vec<Draft>, RepositoryError> {
        let store = self.store.lock().unwrap();
        let mut drafts: Vec<Draft> = store
            .drafts
            .iter()
            .filter(|d| d.key() == key)
            .cloned()
            .collect();
        drafts.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        Ok(drafts)
    }

    async fn get_evaluation_for(
        &self,
        key: RoundKey,
    ) -> Result<Option<Evaluation>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.evaluations.iter().find(|e| e.key() == key).cloned())
    }

    async fn list_drafts(&self, id: SessionId) -> Result<Vec<Draft>, RepositoryError> {
        let store = self.store.lock().unwrap();
        let mut drafts: Vec<Draft> = store
            .drafts
            .iter()
            .filter(|d| d.session_id == id)
            .cloned()
            .collect();
        drafts.sort_by(|a, b| {
            (a.turn, a.round, &a.worker_id).cmp(&(b.turn, b.round, &b.worker_id))
        });
        Ok(drafts)
    }

    async fn list_evaluations(&self, id: SessionId) -> Result<Vec<Evaluation>, RepositoryError> {
        let store = self.store.lock().unwrap();
        let mut evaluations: Vec<Evaluation> = store
            .evaluations
            .iter()
            .filter(|e| e.session_id == id)
            .cloned()
            .collect();
        evaluations.sort_by_key(|e| (e.turn, e.round));
        Ok(evaluations)
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.sessions.iter().rev().cloned().collect())
    }

    async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let before = store.sessions.len();
        store.sessions.retain(|s| s.id != id);
        store.drafts.retain(|d| d.session_id != id);
        store.evaluations.retain(|e| e.session_id != id);
        Ok(store.sessions.len() != before)
    }
}
