//! Domain layer for debate-council
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Council
//!
//! A council is a fixed roster of worker personas plus a judge:
//!
//! - **Workers** each draft an answer to the query, independently and concurrently
//! - **Judge** scores the drafts, critiques them, and synthesizes a candidate answer
//! - **Rounds** repeat drafting and judging, threading the critique forward,
//!   until the [`TerminationPolicy`] finalizes the session
//!
//! ## Follow-ups
//!
//! A concluded session can be extended with a follow-up query. The previous
//! synthesis becomes background context for a new turn with its own round budget.

pub mod config;
pub mod core;
pub mod council;
pub mod persona;
pub mod prompt;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use config::OutputFormat;
pub use core::{error::DomainError, model::Model, model_config::ModelConfig, query::Query};
pub use council::{
    parsing::{VerdictParseError, parse_judge_verdict},
    policy::{FinalizeReason, RoundDecision, TerminationPolicy},
    state::CouncilState,
    value_objects::{
        Draft, Evaluation, HistoryEntry, JudgeVerdict, RoundKey, SessionDetail,
        WORKER_FAILURE_TEXT,
    },
};
pub use persona::{JudgePersona, Persona, Roster, WorkerId};
pub use prompt::PromptTemplate;
pub use session::{
    entities::{Message, Role, Session, SessionId, SessionStatus},
    stream::StreamEvent,
};
