//! Council events emitted while a round or session runs.
//!
//! These events form the output port from the application layer to whatever
//! transport is watching: the CLI live renderer, or the HTTP SSE stream.
//! Each event is self-describing; serialized with a `type` tag.
//!
//! Per round the order is: `round_started`, any number of `worker_chunk` and
//! `worker_complete` (interleaved across workers), `workers_complete`,
//! `judge_thinking`, then exactly one terminal `judge_result` or `error`.

use council_domain::{Evaluation, RoundDecision, SessionId, WorkerId};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouncilEvent {
    /// A new session was created for the query
    SessionCreated { session_id: SessionId, query: String },
    RoundStarted {
        session_id: SessionId,
        turn: u32,
        round: u32,
    },
    /// A chunk of a worker's draft as it is generated
    WorkerChunk { worker_id: WorkerId, chunk: String },
    /// A worker finished. `content` is the stored draft, which replaces any
    /// streamed text when the worker failed.
    WorkerComplete {
        worker_id: WorkerId,
        content: String,
        failed: bool,
    },
    /// Every worker of the round has finished
    WorkersComplete { session_id: SessionId, round: u32 },
    JudgeThinking { session_id: SessionId, round: u32 },
    JudgeResult {
        session_id: SessionId,
        evaluation: Evaluation,
        decision: RoundDecision,
    },
    /// The session reached its final answer
    Consensus {
        session_id: SessionId,
        synthesis: String,
        score: u8,
        rounds: u32,
    },
    Error { message: String },
}

impl CouncilEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CouncilEvent::SessionCreated { .. } => "session_created",
            CouncilEvent::RoundStarted { .. } => "round_started",
            CouncilEvent::WorkerChunk { .. } => "worker_chunk",
            CouncilEvent::WorkerComplete { .. } => "worker_complete",
            CouncilEvent::WorkersComplete { .. } => "workers_complete",
            CouncilEvent::JudgeThinking { .. } => "judge_thinking",
            CouncilEvent::JudgeResult { .. } => "judge_result",
            CouncilEvent::Consensus { .. } => "consensus",
            CouncilEvent::Error { .. } => "error",
        }
    }
}

/// Receiver of council events.
///
/// `emit` is synchronous and infallible: a sink whose consumer went away
/// drops the event and the run carries on.
pub trait CouncilEventSink: Send + Sync {
    fn emit(&self, event: CouncilEvent);
}

/// No-op sink for callers that only want the final result
pub struct NoEvents;

impl CouncilEventSink for NoEvents {
    fn emit(&self, _event: CouncilEvent) {}
}

/// Sink that forwards events to an unbounded channel
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<CouncilEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::UnboundedSender<CouncilEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CouncilEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl CouncilEventSink for ChannelEventSink {
    fn emit(&self, event: CouncilEvent) {
        let _ = self.tx.send(event);
    }
}
