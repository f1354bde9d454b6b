//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod council_error;
pub mod get_history;
pub mod run_round;
pub mod session_controller;

#[cfg(test)]
pub(crate) mod test_support;
