//! Presentation layer for debate-council
//!
//! This crate contains CLI definitions, output formatters, live progress
//! rendering, the interactive chat interface and the HTTP/SSE transport.

pub mod chat;
pub mod cli;
pub mod output;
pub mod progress;
pub mod server;

// Re-export commonly used types
pub use chat::{ChatCommand, ChatRepl};
pub use cli::commands::{Cli, Command, OutputFormat, StorageChoice};
pub use output::console::ConsoleFormatter;
pub use output::formatter::OutputFormatter;
pub use progress::reporter::{ProgressReporter, SimpleProgress};
pub use server::{AppState, router, serve};
