//! Persona registry
//!
//! Workers are pure configuration: an identity, a display name and role label,
//! and the behavioral instruction that steers the completion gateway. The
//! council iterates a [`Roster`] for fan-out, so adding a worker is a
//! configuration change rather than a code change.

mod roster;

pub use roster::{JudgePersona, Persona, Roster, WorkerId};
