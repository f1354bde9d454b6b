//! Run Round use case
//!
//! Executes one debate round for a session: every worker drafts concurrently,
//! then the judge scores, critiques and synthesizes the drafts, and the
//! round's drafts and evaluation are persisted.
//!
//! The round is split into two steps, [`RunRoundUseCase::gather_drafts`] and
//! [`RunRoundUseCase::judge_and_record`], so the caller can record the
//! session's move to `judging` between them. Session status itself is never
//! written here.

use crate::config::CouncilConfig;
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::council_event::{CouncilEvent, CouncilEventSink};
use crate::ports::llm_gateway::{CompletionRequest, GatewayError, LlmGateway};
use crate::ports::session_repository::SessionRepository;
use crate::use_cases::council_error::CouncilError;
use council_domain::util::truncate_str;
use council_domain::{
    Draft, Evaluation, JudgeVerdict, Message, Persona, PromptTemplate, Query, RoundKey, WorkerId,
    parse_judge_verdict,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Input for a single round
#[derive(Debug, Clone)]
pub struct RoundInput {
    pub key: RoundKey,
    pub query: Query,
    /// Judge critique carried over from the previous round
    pub previous_critique: Option<String>,
    /// Prior synthesis when this round belongs to a follow-up turn
    pub background: Option<String>,
}

impl RoundInput {
    pub fn new(key: RoundKey, query: Query) -> Self {
        Self {
            key,
            query,
            previous_critique: None,
            background: None,
        }
    }

    pub fn with_critique(mut self, critique: Option<String>) -> Self {
        self.previous_critique = critique.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_background(mut self, background: Option<String>) -> Self {
        self.background = background;
        self
    }
}

/// Result of a round: the stored drafts (roster order) and evaluation
#[derive(Debug, Clone)]
pub struct RoundOutput {
    pub drafts: Vec<Draft>,
    pub evaluation: Evaluation,
}

/// Use case for running one round of the council
pub struct RunRoundUseCase<G: LlmGateway + 'static, R: SessionRepository + 'static> {
    gateway: Arc<G>,
    repository: Arc<R>,
    config: CouncilConfig,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl<G: LlmGateway + 'static, R: SessionRepository + 'static> RunRoundUseCase<G, R> {
    pub fn new(gateway: Arc<G>, repository: Arc<R>, config: CouncilConfig) -> Self {
        Self {
            gateway,
            repository,
            config,
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }

    /// Run both steps of the round back to back
    pub async fn execute(
        &self,
        input: &RoundInput,
        sink: Arc<dyn CouncilEventSink>,
        cancel: &CancellationToken,
    ) -> Result<RoundOutput, CouncilError> {
        let drafts = self.gather_drafts(input, Arc::clone(&sink), cancel).await?;
        self.judge_and_record(input, drafts, true, sink.as_ref(), cancel)
            .await
    }

    /// Step 1: every worker drafts concurrently.
    ///
    /// Always returns exactly one draft per roster member, in roster order.
    /// A worker that fails, times out or panics gets the failure sentinel as
    /// its draft. Only cancellation aborts the step.
    pub async fn gather_drafts(
        &self,
        input: &RoundInput,
        sink: Arc<dyn CouncilEventSink>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Draft>, CouncilError> {
        let roster = self.config.roster();
        let params = self.config.params();
        info!(
            "Round {}: gathering drafts from {} workers",
            input.key,
            roster.len()
        );

        let mut join_set = JoinSet::new();

        for persona in roster.iter() {
            let gateway = Arc::clone(&self.gateway);
            let sink = Arc::clone(&sink);
            let worker_id = persona.id.clone();
            let request = self.worker_request(persona, input);
            let streaming = params.streaming;
            let timeout = params.worker_timeout;

            join_set.spawn(async move {
                let draft_future =
                    request_draft(gateway.as_ref(), &request, &worker_id, streaming, sink.as_ref());

                let result = if let Some(timeout) = timeout {
                    match tokio::time::timeout(timeout, draft_future).await {
                        Ok(r) => r,
                        Err(_) => Err(GatewayError::Timeout),
                    }
                } else {
                    draft_future.await
                };

                (worker_id, result)
            });
        }

        // Collect drafts with cancellation support
        let mut contents: HashMap<WorkerId, String> = HashMap::new();

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(CouncilError::Cancelled);
                }
                result = join_set.join_next() => result,
            };

            let Some(result) = result else {
                break;
            };

            match result {
                Ok((worker_id, Ok(content))) => {
                    debug!("Worker {} drafted {} bytes", worker_id, content.len());
                    sink.emit(CouncilEvent::WorkerComplete {
                        worker_id: worker_id.clone(),
                        content: content.clone(),
                        failed: false,
                    });
                    contents.insert(worker_id, content);
                }
                Ok((worker_id, Err(e))) => {
                    warn!("Worker {} failed: {}", worker_id, e);
                    let draft = Draft::failure(input.key, worker_id.clone());
                    sink.emit(CouncilEvent::WorkerComplete {
                        worker_id: worker_id.clone(),
                        content: draft.content.clone(),
                        failed: true,
                    });
                    contents.insert(worker_id, draft.content);
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        let drafts: Vec<Draft> = roster
            .iter()
            .map(|persona| match contents.remove(&persona.id) {
                Some(content) => Draft::new(input.key, persona.id.clone(), content),
                None => {
                    // The task never reported back (panicked)
                    let draft = Draft::failure(input.key, persona.id.clone());
                    sink.emit(CouncilEvent::WorkerComplete {
                        worker_id: persona.id.clone(),
                        content: draft.content.clone(),
                        failed: true,
                    });
                    draft
                }
            })
            .collect();

        for draft in &drafts {
            self.conversation_logger.log(ConversationEvent::new(
                "worker_draft",
                serde_json::json!({
                    "session_id": input.key.session_id,
                    "turn": input.key.turn,
                    "round": input.key.round,
                    "worker_id": draft.worker_id,
                    "failed": draft.is_failure(),
                    "content": draft.content,
                }),
            ));
        }

        sink.emit(CouncilEvent::WorkersComplete {
            session_id: input.key.session_id,
            round: input.key.round,
        });

        Ok(drafts)
    }

    /// Step 2: the judge evaluates the drafts, then the round is persisted.
    ///
    /// A judge failure, timeout or unparseable reply yields a fail-soft
    /// verdict rather than an error. Drafts are written before the
    /// evaluation, so a failed draft write leaves no evaluation behind.
    /// `store_drafts` is false when the drafts came from storage.
    pub async fn judge_and_record(
        &self,
        input: &RoundInput,
        drafts: Vec<Draft>,
        store_drafts: bool,
        sink: &dyn CouncilEventSink,
        cancel: &CancellationToken,
    ) -> Result<RoundOutput, CouncilError> {
        info!("Round {}: judging {} drafts", input.key, drafts.len());
        sink.emit(CouncilEvent::JudgeThinking {
            session_id: input.key.session_id,
            round: input.key.round,
        });

        let request = self.judge_request(input, &drafts);
        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CouncilError::Cancelled),
            reply = with_timeout(self.config.params().judge_timeout, self.gateway.complete(&request)) => reply,
        };

        let verdict = match reply {
            Ok(text) => match parse_judge_verdict(&text) {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(
                        "Judge reply for round {} unusable ({}): {}",
                        input.key,
                        e,
                        truncate_str(&text, 200)
                    );
                    JudgeVerdict::fail_soft(e)
                }
            },
            Err(e) => {
                warn!("Judge failed for round {}: {}", input.key, e);
                JudgeVerdict::fail_soft(e)
            }
        };

        let evaluation = Evaluation::from_verdict(input.key, verdict);
        info!(
            "Round {}: score {} (stop: {})",
            input.key, evaluation.score, evaluation.stop
        );

        if store_drafts {
            self.repository.create_drafts(&drafts).await?;
        }
        self.repository.create_evaluation(&evaluation).await?;

        self.conversation_logger.log(ConversationEvent::new(
            "judge_verdict",
            serde_json::json!({
                "session_id": input.key.session_id,
                "turn": input.key.turn,
                "round": input.key.round,
                "score": evaluation.score,
                "stop": evaluation.stop,
                "critique": evaluation.critique,
                "synthesis": evaluation.synthesis,
            }),
        ));

        Ok(RoundOutput { drafts, evaluation })
    }

    fn worker_request(&self, persona: &Persona, input: &RoundInput) -> CompletionRequest {
        CompletionRequest::new(
            self.config.models().worker.clone(),
            PromptTemplate::worker_system(persona, input.background.as_deref()),
        )
        .with_messages(PromptTemplate::worker_messages(
            input.query.content(),
            input.previous_critique.as_deref(),
        ))
    }

    fn judge_request(&self, input: &RoundInput, drafts: &[Draft]) -> CompletionRequest {
        let labeled: Vec<(String, String)> = drafts
            .iter()
            .map(|draft| {
                let label = self
                    .config
                    .roster()
                    .get(&draft.worker_id)
                    .map(Persona::label)
                    .unwrap_or_else(|| draft.worker_id.to_string());
                (label, draft.content.clone())
            })
            .collect();

        CompletionRequest::new(
            self.config.models().judge.clone(),
            PromptTemplate::judge_system(self.config.judge()),
        )
        .with_message(Message::user(PromptTemplate::judge_prompt(
            input.query.content(),
            &labeled,
            input.background.as_deref(),
        )))
        .expecting_json()
    }
}

/// Ask one worker for its draft, forwarding chunks when streaming
async fn request_draft<G: LlmGateway + ?Sized>(
    gateway: &G,
    request: &CompletionRequest,
    worker_id: &WorkerId,
    streaming: bool,
    sink: &dyn CouncilEventSink,
) -> Result<String, GatewayError> {
    if !streaming {
        return gateway.complete(request).await;
    }

    let handle = gateway.stream_complete(request).await?;
    handle
        .drain_with(|chunk| {
            sink.emit(CouncilEvent::WorkerChunk {
                worker_id: worker_id.clone(),
                chunk: chunk.to_string(),
            })
        })
        .await
}

async fn with_timeout<F>(timeout: Option<Duration>, call: F) -> Result<String, GatewayError>
where
    F: std::future::Future<Output = Result<String, GatewayError>>,
{
    match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, call).await {
            Ok(r) => r,
            Err(_) => Err(GatewayError::Timeout),
        },
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CouncilParams;
    use crate::ports::council_event::NoEvents;
    use crate::use_cases::test_support::*;
    use council_domain::{SessionId, WORKER_FAILURE_TEXT};

    fn config(params: CouncilParams) -> CouncilConfig {
        CouncilConfig::default()
            .with_roster(test_roster())
            .with_params(params)
    }

    fn use_case(
        gateway: ScriptedGateway,
        params: CouncilParams,
    ) -> (
        RunRoundUseCase<ScriptedGateway, TestRepository>,
        Arc<ScriptedGateway>,
        Arc<TestRepository>,
    ) {
        let gateway = Arc::new(gateway);
        let repository = Arc::new(TestRepository::new());
        let use_case = RunRoundUseCase::new(
            Arc::clone(&gateway),
            Arc::clone(&repository),
            config(params),
        );
        (use_case, gateway, repository)
    }

    async fn input(repository: &TestRepository) -> RoundInput {
        let session = repository.create_session("Is remote work better?", 3).await.unwrap();
        RoundInput::new(
            RoundKey::new(session.id, 1, 1),
            Query::new("Is remote work better?").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_round_produces_one_draft_per_worker_in_roster_order() {
        let gateway = ScriptedGateway::new()
            .with_judge(JudgeScript::Reply(verdict_json(72, "Needs data", "S1", false)));
        let (use_case, gateway, repository) = use_case(gateway, CouncilParams::default());
        let input = input(&repository).await;

        let output = use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = output.drafts.iter().map(|d| d.worker_id.as_str()).collect();
        assert_eq!(ids, vec!["worker-a", "worker-b", "worker-c"]);
        assert_eq!(output.drafts[0].content, "draft from persona-a");
        assert_eq!(output.evaluation.score, 72);
        assert_eq!(output.evaluation.critique, "Needs data");
        assert_eq!(gateway.worker_calls(), 3);
        assert_eq!(gateway.judge_calls(), 1);
        assert_eq!(repository.draft_count(), 3);
        assert_eq!(repository.evaluation_count(), 1);
    }

    #[tokio::test]
    async fn test_judge_prompt_labels_every_draft() {
        let (use_case, gateway, repository) =
            use_case(ScriptedGateway::new(), CouncilParams::default());
        let input = input(&repository).await;

        use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        let prompt = &gateway.judge_prompts()[0];
        assert!(prompt.contains("You have received 3 drafts"));
        assert!(prompt.contains("The Skeptic (Analyst)"));
        assert!(prompt.contains("draft from persona-c"));
    }

    #[tokio::test]
    async fn test_critique_is_sent_to_workers_as_feedback() {
        let (use_case, gateway, repository) =
            use_case(ScriptedGateway::new(), CouncilParams::default());
        let input = input(&repository)
            .await
            .with_critique(Some("Add evidence".to_string()));

        use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        let worker_request = gateway
            .requests()
            .into_iter()
            .find(|r| !r.json_response)
            .unwrap();
        assert_eq!(worker_request.messages.len(), 2);
        assert!(
            worker_request.messages[1]
                .content
                .starts_with("CRITICAL FEEDBACK FROM JUDGE:\nAdd evidence\n")
        );
    }

    #[tokio::test]
    async fn test_failed_worker_gets_sentinel_draft() {
        let gateway = ScriptedGateway::new()
            .with_worker("persona-b", WorkerScript::Fail("upstream 500".to_string()));
        let (use_case, _gateway, repository) = use_case(gateway, CouncilParams::default());
        let input = input(&repository).await;
        let sink = Arc::new(RecordingSink::default());

        let output = use_case
            .execute(&input, sink.clone(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.drafts.len(), 3);
        assert_eq!(output.drafts[1].content, WORKER_FAILURE_TEXT);
        assert!(output.drafts[1].is_failure());
        assert!(!output.drafts[0].is_failure());

        let failed: Vec<_> = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, CouncilEvent::WorkerComplete { failed: true, .. }))
            .collect();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_hung_worker_times_out_to_sentinel() {
        let gateway = ScriptedGateway::new().with_worker("persona-c", WorkerScript::Hang);
        let params = CouncilParams::default().with_worker_timeout(Some(Duration::from_millis(50)));
        let (use_case, _gateway, repository) = use_case(gateway, params);
        let input = input(&repository).await;

        let output = use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.drafts[2].content, WORKER_FAILURE_TEXT);
        assert_eq!(output.drafts[0].content, "draft from persona-a");
    }

    #[tokio::test]
    async fn test_unparseable_judge_reply_fails_soft() {
        let gateway =
            ScriptedGateway::new().with_judge(JudgeScript::Reply("I refuse to use JSON".into()));
        let (use_case, _gateway, repository) = use_case(gateway, CouncilParams::default());
        let input = input(&repository).await;

        let output = use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.evaluation.score, 0);
        assert!(output.evaluation.stop);
        assert!(output.evaluation.synthesis.starts_with("Error in judging"));
        assert_eq!(repository.evaluation_count(), 1);
    }

    #[tokio::test]
    async fn test_judge_gateway_error_fails_soft() {
        let gateway = ScriptedGateway::new().with_judge(JudgeScript::Fail("quota".into()));
        let (use_case, _gateway, repository) = use_case(gateway, CouncilParams::default());
        let input = input(&repository).await;

        let output = use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.evaluation.score, 0);
        assert!(output.evaluation.stop);
    }

    #[tokio::test]
    async fn test_judge_timeout_fails_soft() {
        let gateway = ScriptedGateway::new().with_judge(JudgeScript::Hang);
        let params = CouncilParams::default().with_judge_timeout(Some(Duration::from_millis(50)));
        let (use_case, _gateway, repository) = use_case(gateway, params);
        let input = input(&repository).await;

        let output = use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap();

        assert!(output.evaluation.stop);
        assert!(output.evaluation.synthesis.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_streaming_emits_chunks_before_completion() {
        let gateway = ScriptedGateway::new().streaming();
        let (use_case, _gateway, repository) = use_case(gateway, CouncilParams::default());
        let input = input(&repository).await;
        let sink = Arc::new(RecordingSink::default());

        use_case
            .execute(&input, sink.clone(), &CancellationToken::new())
            .await
            .unwrap();

        let events = sink.events();
        let chunks_a: String = events
            .iter()
            .filter_map(|e| match e {
                CouncilEvent::WorkerChunk { worker_id, chunk } if worker_id.as_str() == "worker-a" => {
                    Some(chunk.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(chunks_a, "draft from persona-a");

        let names = sink.names();
        let workers_done = names.iter().position(|n| *n == "workers_complete").unwrap();
        let judge = names.iter().position(|n| *n == "judge_thinking").unwrap();
        assert!(names[..workers_done].iter().all(|n| n.starts_with("worker_")));
        assert_eq!(judge, workers_done + 1);
        assert_eq!(names.iter().filter(|n| **n == "worker_complete").count(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_during_fan_out_writes_nothing() {
        let gateway = ScriptedGateway::new().with_worker("persona-a", WorkerScript::Hang);
        let params = CouncilParams::default().with_worker_timeout(None);
        let (use_case, gateway, repository) = use_case(gateway, params);
        let input = input(&repository).await;
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let err = use_case
            .execute(&input, Arc::new(NoEvents), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(gateway.judge_calls(), 0);
        assert_eq!(repository.draft_count(), 0);
        assert_eq!(repository.evaluation_count(), 0);
    }

    #[tokio::test]
    async fn test_draft_write_failure_leaves_no_evaluation() {
        let (use_case, _gateway, repository) =
            use_case(ScriptedGateway::new(), CouncilParams::default());
        let input = input(&repository).await;
        repository.fail_draft_writes(true);

        let err = use_case
            .execute(&input, Arc::new(NoEvents), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CouncilError::Storage(_)));
        assert_eq!(repository.evaluation_count(), 0);
    }

    #[tokio::test]
    async fn test_judge_and_record_skips_stored_drafts() {
        let (use_case, gateway, repository) =
            use_case(ScriptedGateway::new(), CouncilParams::default());
        let input = input(&repository).await;
        let drafts = vec![Draft::new(input.key, WorkerId::new("worker-a"), "kept")];
        repository.create_drafts(&drafts).await.unwrap();

        let output = use_case
            .judge_and_record(&input, drafts, false, &NoEvents, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(gateway.worker_calls(), 0);
        assert_eq!(repository.draft_count(), 1);
        assert_eq!(output.evaluation.session_id, SessionId::new(1));
    }
}
