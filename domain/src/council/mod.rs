//! Council debate domain
//!
//! Pure logic for the debate-and-synthesis loop:
//!
//! - [`value_objects`]: drafts, evaluations, judge verdicts, history entries
//! - [`policy`]: the finalize/continue decision taken after each round
//! - [`state`]: the controller state machine (`idle → thinking → judging → …`)
//! - [`parsing`]: extraction of a structured verdict from the judge's reply
//!
//! ```text
//!            ┌──────────────────────── continue ────────────────────────┐
//!            ▼                                                          │
//!  idle ─▶ thinking ──(all drafts)──▶ judging ──(evaluation)──▶ decide ─┤
//!            ▲                                                          │
//!            └──── follow-up ──── consensus ◀──────── finalize ─────────┘
//! ```

pub mod parsing;
pub mod policy;
pub mod state;
pub mod value_objects;
