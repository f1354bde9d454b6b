//! Council value objects - immutable records produced by each round.
//!
//! - [`Draft`] - one worker's text for one round
//! - [`JudgeVerdict`] - the judge's structured reply, before it is keyed to a round
//! - [`Evaluation`] - a verdict recorded against a session round
//! - [`HistoryEntry`] - a concluded session as listed in history

use crate::persona::WorkerId;
use crate::session::entities::{Session, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Draft text substituted when a worker's gateway call fails or times out
pub const WORKER_FAILURE_TEXT: &str = "I am currently unable to think due to an error.";

/// Addresses one round of one turn of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundKey {
    pub session_id: SessionId,
    pub turn: u32,
    pub round: u32,
}

impl RoundKey {
    pub fn new(session_id: SessionId, turn: u32, round: u32) -> Self {
        Self {
            session_id,
            turn,
            round,
        }
    }

    /// The key of the preceding round in the same turn, if any
    pub fn previous(&self) -> Option<RoundKey> {
        (self.round > 1).then(|| RoundKey::new(self.session_id, self.turn, self.round - 1))
    }
}

impl std::fmt::Display for RoundKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "session {} turn {} round {}",
            self.session_id, self.turn, self.round
        )
    }
}

/// One worker's output for one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub session_id: SessionId,
    pub worker_id: WorkerId,
    pub turn: u32,
    pub round: u32,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(key: RoundKey, worker_id: WorkerId, content: impl Into<String>) -> Self {
        Self {
            session_id: key.session_id,
            worker_id,
            turn: key.turn,
            round: key.round,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// A draft carrying [`WORKER_FAILURE_TEXT`]
    pub fn failure(key: RoundKey, worker_id: WorkerId) -> Self {
        Self::new(key, worker_id, WORKER_FAILURE_TEXT)
    }

    pub fn key(&self) -> RoundKey {
        RoundKey::new(self.session_id, self.turn, self.round)
    }

    pub fn is_failure(&self) -> bool {
        self.content == WORKER_FAILURE_TEXT
    }
}

/// The judge's structured reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    /// Quality score, 0-100
    pub score: u8,
    /// Feedback for the next round's workers
    pub critique: String,
    /// Candidate final answer
    pub synthesis: String,
    /// Judge believes this synthesis is final
    pub stop: bool,
}

impl JudgeVerdict {
    pub fn new(
        score: u8,
        critique: impl Into<String>,
        synthesis: impl Into<String>,
        stop: bool,
    ) -> Self {
        Self {
            score: score.min(100),
            critique: critique.into(),
            synthesis: synthesis.into(),
            stop,
        }
    }

    /// Verdict used when the judge call fails or its reply cannot be parsed.
    ///
    /// Zero score and `stop = true`, so a broken judge ends the session.
    pub fn fail_soft(reason: impl std::fmt::Display) -> Self {
        Self {
            score: 0,
            critique: String::new(),
            synthesis: format!("Error in judging: {}", reason),
            stop: true,
        }
    }
}

/// The judge's verdict for one round of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub session_id: SessionId,
    pub turn: u32,
    pub round: u32,
    pub score: u8,
    pub critique: String,
    pub synthesis: String,
    pub stop: bool,
    pub created_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn from_verdict(key: RoundKey, verdict: JudgeVerdict) -> Self {
        Self {
            session_id: key.session_id,
            turn: key.turn,
            round: key.round,
            score: verdict.score,
            critique: verdict.critique,
            synthesis: verdict.synthesis,
            stop: verdict.stop,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> RoundKey {
        RoundKey::new(self.session_id, self.turn, self.round)
    }
}

/// A concluded session as listed in history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: SessionId,
    pub query: String,
    pub final_synthesis: String,
    pub timestamp: DateTime<Utc>,
    /// Score of the evaluation that produced the consensus
    pub score: u8,
}

/// A stored session with everything it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: Session,
    pub drafts: Vec<Draft>,
    pub evaluations: Vec<Evaluation>,
}
