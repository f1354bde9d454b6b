//! LLM Gateway port
//!
//! Defines the interface for requesting completions from a language model
//! provider. Workers and the judge both go through this port.

use async_trait::async_trait;
use council_domain::{Message, Model, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Other error: {0}")]
    Other(String),
}

/// A single completion request: system instruction plus conversation turns.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: Model,
    pub system: String,
    pub messages: Vec<Message>,
    /// Ask the provider for a JSON object reply
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(model: Model, system: impl Into<String>) -> Self {
        Self {
            model,
            system: system.into(),
            messages: Vec::new(),
            json_response: false,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn expecting_json(mut self) -> Self {
        self.json_response = true;
        self
    }

    /// Content of the last user message, if any
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == council_domain::Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Gateway for LLM communication
///
/// This port defines how the application layer communicates with LLM providers.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Request a full completion and return its text
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError>;

    /// Request a completion delivered incrementally.
    ///
    /// Default implementation calls `complete()` and wraps the result in a single
    /// `Completed` event, so adapters without streaming support work unchanged.
    async fn stream_complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<StreamHandle, GatewayError> {
        let result = self.complete(request).await?;
        let (tx, rx) = mpsc::channel(1);
        // Send Completed event; if the receiver is dropped, that's fine
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(rx))
    }
}

/// Handle for receiving streaming events from a completion.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream, calling `on_delta` for each chunk, and return the
    /// full text.
    ///
    /// A `Completed` event without preceding deltas is reported to `on_delta`
    /// as a single chunk so callers always observe the text.
    pub async fn drain_with<F>(mut self, mut on_delta: F) -> Result<String, GatewayError>
    where
        F: FnMut(&str),
    {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => {
                    on_delta(&chunk);
                    full_text.push_str(&chunk);
                }
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        if !text.is_empty() {
                            on_delta(&text);
                        }
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(GatewayError::RequestFailed(e));
                }
            }
        }
        // Channel closed without Completed; return what we have
        Ok(full_text)
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(self) -> Result<String, GatewayError> {
        self.drain_with(|_| {}).await
    }
}
