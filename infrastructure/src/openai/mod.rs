//! OpenAI-compatible chat completions adapter
//!
//! Implements [`LlmGateway`](council_application::LlmGateway) over the
//! `/chat/completions` endpoint, single-shot and SSE streaming.

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod sse;

pub use error::OpenAiError;
pub use gateway::{DEFAULT_BASE_URL, OpenAiGateway};
