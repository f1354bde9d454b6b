//! Termination policy for the multi-round loop.
//!
//! After each round the policy finalizes when the first of three conditions
//! holds, checked in this order:
//!
//! 1. the judge set `stop`
//! 2. the score reached the threshold
//! 3. the round cap was reached
//!
//! The cap bounds external calls per turn at `roster_size * max_rounds`
//! worker calls plus `max_rounds` judge calls.

use super::value_objects::Evaluation;
use serde::{Deserialize, Serialize};

/// Why a round finalized the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    JudgeStopped,
    ScoreThreshold,
    RoundCap,
}

impl std::fmt::Display for FinalizeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinalizeReason::JudgeStopped => write!(f, "judge signalled stop"),
            FinalizeReason::ScoreThreshold => write!(f, "score threshold reached"),
            FinalizeReason::RoundCap => write!(f, "round cap reached"),
        }
    }
}

/// Outcome of the decision taken after a round's evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoundDecision {
    /// Enter consensus with this synthesis
    Finalize {
        synthesis: String,
        reason: FinalizeReason,
    },
    /// Run another round, feeding the critique forward
    Continue { next_round: u32, critique: String },
}

impl RoundDecision {
    pub fn is_finalize(&self) -> bool {
        matches!(self, RoundDecision::Finalize { .. })
    }
}

/// Finalize-or-continue policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationPolicy {
    /// Round cap per turn
    pub max_rounds: u32,
    /// Score at or above which the session finalizes
    pub score_threshold: u8,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            score_threshold: 90,
        }
    }
}

impl TerminationPolicy {
    pub fn new(max_rounds: u32, score_threshold: u8) -> Self {
        Self {
            max_rounds,
            score_threshold,
        }
    }

    /// Decide what follows the evaluation of `current_round`
    pub fn decide(&self, evaluation: &Evaluation, current_round: u32) -> RoundDecision {
        let reason = if evaluation.stop {
            Some(FinalizeReason::JudgeStopped)
        } else if evaluation.score >= self.score_threshold {
            Some(FinalizeReason::ScoreThreshold)
        } else if current_round >= self.max_rounds {
            Some(FinalizeReason::RoundCap)
        } else {
            None
        };

        match reason {
            Some(reason) => RoundDecision::Finalize {
                synthesis: evaluation.synthesis.clone(),
                reason,
            },
            None => RoundDecision::Continue {
                next_round: current_round + 1,
                critique: evaluation.critique.clone(),
            },
        }
    }

    /// Upper bound on (worker calls, judge calls) for one turn
    pub fn call_budget(&self, roster_size: usize) -> (usize, usize) {
        let rounds = self.max_rounds as usize;
        (roster_size * rounds, rounds)
    }
}
