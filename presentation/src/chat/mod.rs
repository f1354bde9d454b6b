//! Interactive chat module
//!
//! Provides a line-editor based chat where each question follows up on the
//! previous answer.

mod repl;

pub use repl::{ChatCommand, ChatRepl};
