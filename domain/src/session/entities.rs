//! Session domain entities

use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a conversation (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Opaque session identity, assigned by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SessionId)
    }
}

/// Persisted status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Worker fan-out in flight
    Thinking,
    /// All drafts collected, judge call in flight
    Judging,
    /// Final synthesis accepted
    Consensus,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Thinking => "thinking",
            SessionStatus::Judging => "judging",
            SessionStatus::Consensus => "consensus",
        }
    }

    pub fn is_consensus(&self) -> bool {
        matches!(self, SessionStatus::Consensus)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thinking" => Ok(SessionStatus::Thinking),
            "judging" => Ok(SessionStatus::Judging),
            "consensus" => Ok(SessionStatus::Consensus),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// One ongoing or concluded debate (Entity)
///
/// `status == Consensus` if and only if `final_consensus` is present. The
/// mutators below are the only way the fields change and keep that true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// The query that opened the current turn
    pub query: String,
    pub status: SessionStatus,
    /// Follow-up turn, starting at 1
    pub turn: u32,
    /// Round within the current turn, starting at 1
    pub current_round: u32,
    pub max_rounds: u32,
    pub final_consensus: Option<String>,
    /// Prior synthesis carried into the current turn as background
    pub background: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session in round 1 of turn 1
    pub fn new(id: SessionId, query: impl Into<String>, max_rounds: u32) -> Self {
        let now = Utc::now();
        Self {
            id,
            query: query.into(),
            status: SessionStatus::Thinking,
            turn: 1,
            current_round: 1,
            max_rounds,
            final_consensus: None,
            background: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.status.is_consensus()
    }

    /// Move to a non-consensus status, optionally updating the round.
    ///
    /// Leaving consensus this way clears the final synthesis.
    pub fn set_status(&mut self, status: SessionStatus, round: Option<u32>) {
        if status.is_consensus() {
            // consensus is only entered through `conclude`
            return;
        }
        self.status = status;
        if let Some(round) = round {
            self.current_round = round;
        }
        self.final_consensus = None;
        self.touch();
    }

    /// Enter consensus with the accepted synthesis
    pub fn conclude(&mut self, synthesis: impl Into<String>) {
        self.status = SessionStatus::Consensus;
        self.final_consensus = Some(synthesis.into());
        self.touch();
    }

    /// Start a follow-up turn on a concluded session.
    ///
    /// Returns the prior synthesis, which becomes the turn's background.
    pub fn begin_follow_up(&mut self, query: impl Into<String>) -> Result<String, DomainError> {
        if !self.is_concluded() {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: "follow-up".to_string(),
            });
        }
        let prior = self.final_consensus.take().unwrap_or_default();
        self.query = query.into();
        self.turn += 1;
        self.current_round = 1;
        self.status = SessionStatus::Thinking;
        self.background = Some(prior.clone());
        self.touch();
        Ok(prior)
    }

    /// Whether `status == Consensus` iff a final synthesis is present
    pub fn invariant_holds(&self) -> bool {
        self.status.is_consensus() == self.final_consensus.is_some()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionId::new(7), "How should I price my product?", 3)
    }

    #[test]
    fn test_new_session_starts_thinking_round_one() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Thinking);
        assert_eq!(s.current_round, 1);
        assert_eq!(s.turn, 1);
        assert!(s.invariant_holds());
    }

    #[test]
    fn test_conclude_sets_final_consensus() {
        let mut s = session();
        s.set_status(SessionStatus::Judging, None);
        s.conclude("Charge by value.");
        assert!(s.is_concluded());
        assert_eq!(s.final_consensus.as_deref(), Some("Charge by value."));
        assert!(s.invariant_holds());
    }

    #[test]
    fn test_set_status_cannot_enter_consensus() {
        let mut s = session();
        s.set_status(SessionStatus::Consensus, Some(2));
        assert_eq!(s.status, SessionStatus::Thinking);
        assert_eq!(s.current_round, 1);
    }

    #[test]
    fn test_follow_up_moves_synthesis_to_background() {
        let mut s = session();
        s.set_status(SessionStatus::Thinking, Some(3));
        s.conclude("Charge by value.");

        let prior = s.begin_follow_up("What about discounts?").unwrap();
        assert_eq!(prior, "Charge by value.");
        assert_eq!(s.turn, 2);
        assert_eq!(s.current_round, 1);
        assert_eq!(s.status, SessionStatus::Thinking);
        assert_eq!(s.background.as_deref(), Some("Charge by value."));
        assert_eq!(s.query, "What about discounts?");
        assert!(s.invariant_holds());
    }

    #[test]
    fn test_follow_up_requires_consensus() {
        let mut s = session();
        assert!(s.begin_follow_up("more").is_err());
        assert_eq!(s.turn, 1);
    }

    #[test]
    fn test_status_roundtrip_str() {
        for status in [
            SessionStatus::Thinking,
            SessionStatus::Judging,
            SessionStatus::Consensus,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("done".parse::<SessionStatus>().is_err());
    }
}
