//! Infrastructure layer for debate-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer:
//!
//! - [`openai`]: completion gateway over an OpenAI-compatible HTTP API
//! - [`storage`]: in-memory and SQLite session repositories
//! - [`logging`]: JSONL transcript logger
//! - [`config`]: TOML/env configuration loading

pub mod config;
pub mod logging;
pub mod openai;
pub mod storage;

// Re-export commonly used types
pub use config::{
    ConfigError, ConfigLoader, FileConfig, FileCouncilConfig, FileModelsConfig, FileOutputConfig,
    FileOutputFormat, StorageBackend,
};
pub use logging::JsonlConversationLogger;
pub use openai::{OpenAiError, OpenAiGateway};
pub use storage::{AnyRepository, InMemorySessionRepository, SqliteSessionRepository};
