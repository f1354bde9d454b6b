//! Application layer for debate-council
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{CouncilConfig, CouncilParams};
pub use ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    council_event::{ChannelEventSink, CouncilEvent, CouncilEventSink, NoEvents},
    llm_gateway::{CompletionRequest, GatewayError, LlmGateway, StreamHandle},
    session_repository::{RepositoryError, SessionRepository},
};
pub use use_cases::council_error::CouncilError;
pub use use_cases::get_history::GetHistoryUseCase;
pub use use_cases::run_round::{RoundInput, RoundOutput, RunRoundUseCase};
pub use use_cases::session_controller::{
    RoundReport, RunRoundRequest, SessionController, SessionOutcome,
};
