//! Controller state machine.

use crate::core::error::DomainError;
use crate::session::entities::SessionStatus;
use serde::{Deserialize, Serialize};

/// State of the session controller
///
/// `Idle` has no persisted counterpart; the other states mirror
/// [`SessionStatus`]. `Consensus` is both the end of a loop and a valid
/// starting point for a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouncilState {
    #[default]
    Idle,
    Thinking,
    Judging,
    Consensus,
}

impl CouncilState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouncilState::Idle => "idle",
            CouncilState::Thinking => "thinking",
            CouncilState::Judging => "judging",
            CouncilState::Consensus => "consensus",
        }
    }

    /// Whether `next` is reachable from this state.
    ///
    /// Any state may fall back to `Idle` when a round is aborted.
    pub fn can_transition_to(&self, next: CouncilState) -> bool {
        use CouncilState::*;
        matches!(
            (self, next),
            (Idle, Thinking)
                | (Thinking, Judging)
                | (Judging, Thinking)
                | (Judging, Consensus)
                | (Consensus, Thinking)
                | (_, Idle)
        )
    }

    pub fn transition(self, next: CouncilState) -> Result<CouncilState, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Persisted status for this state, if any
    pub fn status(&self) -> Option<SessionStatus> {
        match self {
            CouncilState::Idle => None,
            CouncilState::Thinking => Some(SessionStatus::Thinking),
            CouncilState::Judging => Some(SessionStatus::Judging),
            CouncilState::Consensus => Some(SessionStatus::Consensus),
        }
    }
}

impl From<SessionStatus> for CouncilState {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Thinking => CouncilState::Thinking,
            SessionStatus::Judging => CouncilState::Judging,
            SessionStatus::Consensus => CouncilState::Consensus,
        }
    }
}

impl std::fmt::Display for CouncilState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
