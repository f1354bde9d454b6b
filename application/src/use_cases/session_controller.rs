//! Session controller
//!
//! Drives sessions through their lifecycle on top of [`RunRoundUseCase`]:
//!
//! - [`SessionController::run_round`] runs one round for a new, in-flight or
//!   concluded (follow-up) session and applies the termination decision
//! - [`SessionController::run_session`] loops rounds until the session
//!   reaches consensus
//!
//! The controller is the only writer of session status. Per round it moves
//! the session `thinking -> judging` and then either to `consensus` or back
//! to `thinking` with the next round number.

use crate::config::CouncilConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::council_event::{CouncilEvent, CouncilEventSink};
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::session_repository::{RepositoryError, SessionRepository};
use crate::use_cases::council_error::CouncilError;
use crate::use_cases::run_round::{RoundInput, RoundOutput, RunRoundUseCase};
use council_domain::{
    CouncilState, Draft, Evaluation, Query, RoundDecision, RoundKey, Session, SessionId,
    SessionStatus, TerminationPolicy,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Request for a single round
#[derive(Debug, Clone, Default)]
pub struct RunRoundRequest {
    pub query: String,
    /// Critique to feed the workers; falls back to the stored critique of
    /// the previous round
    pub previous_critique: Option<String>,
    /// Existing session to continue, or to extend with a follow-up when it
    /// has already concluded
    pub session_id: Option<SessionId>,
    /// Round to run; defaults to the session's current round
    pub round: Option<u32>,
}

impl RunRoundRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: Option<SessionId>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_round(mut self, round: Option<u32>) -> Self {
        self.round = round;
        self
    }

    pub fn with_critique(mut self, critique: Option<String>) -> Self {
        self.previous_critique = critique;
        self
    }
}

/// What one round produced and what was decided
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub session_id: SessionId,
    pub turn: u32,
    pub round: u32,
    pub drafts: Vec<Draft>,
    pub evaluation: Evaluation,
    pub decision: RoundDecision,
}

/// Result of running a session to consensus
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session: Session,
    pub rounds: Vec<RoundReport>,
}

impl SessionOutcome {
    pub fn final_synthesis(&self) -> Option<&str> {
        self.session.final_consensus.as_deref()
    }

    pub fn final_score(&self) -> Option<u8> {
        self.rounds.last().map(|r| r.evaluation.score)
    }
}

/// How much of the requested round is already stored
enum Resume {
    Fresh,
    /// Drafts stored, judge step still missing
    Judge(Vec<Draft>),
    /// Round fully stored; only the decision needs applying
    Decide(RoundOutput),
}

struct RoundPlan {
    session: Session,
    input: RoundInput,
    resume: Resume,
}

/// Marks a session as having a round in flight until dropped
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<SessionId>>,
    id: SessionId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub struct SessionController<G: LlmGateway + 'static, R: SessionRepository + 'static> {
    rounds: RunRoundUseCase<G, R>,
    repository: Arc<R>,
    in_flight: Mutex<HashSet<SessionId>>,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl<G: LlmGateway + 'static, R: SessionRepository + 'static> SessionController<G, R> {
    pub fn new(gateway: Arc<G>, repository: Arc<R>, config: CouncilConfig) -> Self {
        Self {
            rounds: RunRoundUseCase::new(gateway, Arc::clone(&repository), config),
            repository,
            in_flight: Mutex::new(HashSet::new()),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.rounds = self.rounds.with_conversation_logger(Arc::clone(&logger));
        self.conversation_logger = logger;
        self
    }

    pub fn config(&self) -> &CouncilConfig {
        self.rounds.config()
    }

    /// Run one round and apply the termination decision.
    ///
    /// The last event emitted is `judge_result` on success or `error` on
    /// failure. On failure the session keeps its last persisted status so a
    /// retry resumes the round.
    pub async fn run_round(
        &self,
        request: RunRoundRequest,
        sink: Arc<dyn CouncilEventSink>,
        cancel: &CancellationToken,
    ) -> Result<RoundReport, CouncilError> {
        let result = self.try_run_round(request, Arc::clone(&sink), cancel).await;
        if let Err(e) = &result {
            warn!("Round failed: {}", e);
            sink.emit(CouncilEvent::Error {
                message: e.to_string(),
            });
        }
        result
    }

    /// Run rounds until the session reaches consensus.
    ///
    /// With `session_id` of a concluded session this runs a follow-up turn;
    /// with an in-flight session it resumes that session. After the final
    /// round a `consensus` event is emitted.
    pub async fn run_session(
        &self,
        query: &str,
        session_id: Option<SessionId>,
        sink: Arc<dyn CouncilEventSink>,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, CouncilError> {
        let mut request = RunRoundRequest::new(query).with_session(session_id);
        let mut rounds = Vec::new();

        let final_id = loop {
            let report = self
                .run_round(request.clone(), Arc::clone(&sink), cancel)
                .await?;
            let id = report.session_id;

            match &report.decision {
                RoundDecision::Finalize { synthesis, .. } => {
                    sink.emit(CouncilEvent::Consensus {
                        session_id: id,
                        synthesis: synthesis.clone(),
                        score: report.evaluation.score,
                        rounds: report.round,
                    });
                    rounds.push(report);
                    break id;
                }
                RoundDecision::Continue {
                    next_round,
                    critique,
                } => {
                    request = RunRoundRequest::new(query)
                        .with_session(Some(id))
                        .with_round(Some(*next_round))
                        .with_critique(Some(critique.clone()));
                    rounds.push(report);
                }
            }
        };

        let session = self
            .repository
            .get_session(final_id)
            .await?
            .ok_or(CouncilError::SessionNotFound(final_id))?;

        Ok(SessionOutcome { session, rounds })
    }

    async fn try_run_round(
        &self,
        request: RunRoundRequest,
        sink: Arc<dyn CouncilEventSink>,
        cancel: &CancellationToken,
    ) -> Result<RoundReport, CouncilError> {
        let query = Query::new(request.query.clone())?;

        let (plan, _guard) = match request.session_id {
            Some(id) => {
                let guard = self.claim(id)?;
                (self.plan_existing(id, query, &request).await?, guard)
            }
            None => {
                let plan = self.plan_new(query, &request, sink.as_ref()).await?;
                let guard = self.claim(plan.session.id)?;
                (plan, guard)
            }
        };

        let RoundPlan {
            session,
            input,
            resume,
        } = plan;
        let key = input.key;

        sink.emit(CouncilEvent::RoundStarted {
            session_id: key.session_id,
            turn: key.turn,
            round: key.round,
        });

        let mut state = CouncilState::Idle;
        let output = match resume {
            Resume::Decide(output) => {
                info!("Round {} already judged, re-applying its decision", key);
                state = state
                    .transition(CouncilState::Thinking)?
                    .transition(CouncilState::Judging)?;
                output
            }
            Resume::Judge(drafts) => {
                info!("Round {} has stored drafts, resuming at the judge", key);
                state = state.transition(CouncilState::Thinking)?;
                self.enter(&mut state, CouncilState::Judging, key.session_id, Some(key.round))
                    .await?;
                self.rounds
                    .judge_and_record(&input, drafts, false, sink.as_ref(), cancel)
                    .await?
            }
            Resume::Fresh => {
                self.enter(&mut state, CouncilState::Thinking, key.session_id, Some(key.round))
                    .await?;
                let drafts = self
                    .rounds
                    .gather_drafts(&input, Arc::clone(&sink), cancel)
                    .await?;
                self.enter(&mut state, CouncilState::Judging, key.session_id, None)
                    .await?;
                self.rounds
                    .judge_and_record(&input, drafts, true, sink.as_ref(), cancel)
                    .await?
            }
        };

        let policy = TerminationPolicy::new(
            session.max_rounds,
            self.config().params().policy.score_threshold,
        );
        let decision = policy.decide(&output.evaluation, key.round);
        state.transition(match decision {
            RoundDecision::Finalize { .. } => CouncilState::Consensus,
            RoundDecision::Continue { .. } => CouncilState::Thinking,
        })?;
        self.apply_decision(key, &decision).await?;

        sink.emit(CouncilEvent::JudgeResult {
            session_id: key.session_id,
            evaluation: output.evaluation.clone(),
            decision: decision.clone(),
        });

        Ok(RoundReport {
            session_id: key.session_id,
            turn: key.turn,
            round: key.round,
            drafts: output.drafts,
            evaluation: output.evaluation,
            decision,
        })
    }

    /// A brand new session, round 1 of turn 1
    async fn plan_new(
        &self,
        query: Query,
        request: &RunRoundRequest,
        sink: &dyn CouncilEventSink,
    ) -> Result<RoundPlan, CouncilError> {
        if let Some(round) = request.round.filter(|r| *r != 1) {
            return Err(CouncilError::InvalidInput(format!(
                "round {} requires an existing session",
                round
            )));
        }

        let max_rounds = self.config().params().max_rounds();
        let session = self
            .repository
            .create_session(query.content(), max_rounds)
            .await?;
        info!("Created session {}", session.id);

        sink.emit(CouncilEvent::SessionCreated {
            session_id: session.id,
            query: session.query.clone(),
        });
        self.conversation_logger.log(ConversationEvent::new(
            "session_created",
            serde_json::json!({
                "session_id": session.id,
                "query": session.query,
                "max_rounds": max_rounds,
            }),
        ));

        let input = RoundInput::new(RoundKey::new(session.id, session.turn, 1), query)
            .with_critique(request.previous_critique.clone());

        Ok(RoundPlan {
            session,
            input,
            resume: Resume::Fresh,
        })
    }

    /// A follow-up on a concluded session, or the next round of one in flight
    async fn plan_existing(
        &self,
        id: SessionId,
        query: Query,
        request: &RunRoundRequest,
    ) -> Result<RoundPlan, CouncilError> {
        let session = self
            .repository
            .get_session(id)
            .await?
            .ok_or(CouncilError::SessionNotFound(id))?;

        if session.is_concluded() {
            if let Some(round) = request.round.filter(|r| *r != 1) {
                return Err(CouncilError::InvalidInput(format!(
                    "session {} has concluded; a follow-up starts at round 1, not {}",
                    id, round
                )));
            }

            let session = self.repository.begin_follow_up(id, query.content()).await?;
            info!("Session {} opened follow-up turn {}", id, session.turn);
            self.conversation_logger.log(ConversationEvent::new(
                "follow_up",
                serde_json::json!({
                    "session_id": id,
                    "turn": session.turn,
                    "query": session.query,
                }),
            ));

            let input = RoundInput::new(RoundKey::new(id, session.turn, 1), query)
                .with_background(session.background.clone());
            return Ok(RoundPlan {
                session,
                input,
                resume: Resume::Fresh,
            });
        }

        let round = request.round.unwrap_or(session.current_round);
        if round == 0 || round > session.max_rounds {
            return Err(CouncilError::InvalidInput(format!(
                "round {} is outside 1..={}",
                round, session.max_rounds
            )));
        }
        if round != session.current_round {
            return Err(CouncilError::InvalidInput(format!(
                "session {} is on round {}, not {}",
                id, session.current_round, round
            )));
        }

        // The stored query is authoritative for an in-flight turn
        if query.content() != session.query {
            debug!("Session {} continues with its stored query", id);
        }
        let query = Query::new(session.query.clone())?;

        let key = RoundKey::new(id, session.turn, round);
        let critique = match request
            .previous_critique
            .clone()
            .filter(|c| !c.trim().is_empty())
        {
            Some(critique) => Some(critique),
            None => match key.previous() {
                Some(previous) => self
                    .repository
                    .get_evaluation_for(previous)
                    .await?
                    .map(|e| e.critique),
                None => None,
            },
        };

        let input = RoundInput::new(key, query)
            .with_critique(critique)
            .with_background(session.background.clone());
        let resume = self.stored_progress(key).await?;

        Ok(RoundPlan {
            session,
            input,
            resume,
        })
    }

    async fn stored_progress(&self, key: RoundKey) -> Result<Resume, CouncilError> {
        let stored = self.repository.get_drafts_for(key).await?;
        let roster = self.config().roster();

        if let Some(evaluation) = self.repository.get_evaluation_for(key).await? {
            return Ok(Resume::Decide(RoundOutput {
                drafts: stored,
                evaluation,
            }));
        }
        if stored.is_empty() {
            return Ok(Resume::Fresh);
        }

        let drafts: Vec<Draft> = roster
            .iter()
            .filter_map(|persona| stored.iter().find(|d| d.worker_id == persona.id).cloned())
            .collect();
        if drafts.len() != roster.len() {
            return Err(RepositoryError::InvalidState(format!(
                "round {} has {} of {} drafts stored",
                key,
                stored.len(),
                roster.len()
            ))
            .into());
        }
        Ok(Resume::Judge(drafts))
    }

    /// Move the controller to `next` and persist the matching status
    async fn enter(
        &self,
        state: &mut CouncilState,
        next: CouncilState,
        id: SessionId,
        round: Option<u32>,
    ) -> Result<(), CouncilError> {
        *state = state.transition(next)?;
        if let Some(status) = next.status() {
            self.repository.update_status(id, status, round).await?;
        }
        debug!("Session {} is {}", id, state);
        Ok(())
    }

    async fn apply_decision(
        &self,
        key: RoundKey,
        decision: &RoundDecision,
    ) -> Result<(), CouncilError> {
        match decision {
            RoundDecision::Finalize { synthesis, reason } => {
                self.repository
                    .record_consensus(key.session_id, synthesis)
                    .await?;
                info!(
                    "Session {} reached consensus in round {} ({})",
                    key.session_id, key.round, reason
                );
            }
            RoundDecision::Continue { next_round, .. } => {
                self.repository
                    .update_status(key.session_id, SessionStatus::Thinking, Some(*next_round))
                    .await?;
                info!(
                    "Session {} continues to round {}",
                    key.session_id, next_round
                );
            }
        }

        self.conversation_logger.log(ConversationEvent::new(
            "round_decision",
            serde_json::json!({
                "session_id": key.session_id,
                "turn": key.turn,
                "round": key.round,
                "decision": decision,
            }),
        ));
        Ok(())
    }

    fn claim(&self, id: SessionId) -> Result<InFlightGuard<'_>, CouncilError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(id) {
            return Err(CouncilError::InvalidInput(format!(
                "session {} already has a round in progress",
                id
            )));
        }
        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            id,
        })
    }
}
