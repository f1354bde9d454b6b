//! Error types for the OpenAI adapter

use council_application::GatewayError;
use thiserror::Error;

/// Result type alias for OpenAI operations
pub type Result<T> = std::result::Result<T, OpenAiError>;

#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("Authentication rejected: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response contained no choices")]
    NoChoices,
}

impl OpenAiError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => OpenAiError::Unauthorized(message),
            429 => OpenAiError::RateLimited(message),
            _ => OpenAiError::Api { status, message },
        }
    }
}

impl From<OpenAiError> for GatewayError {
    fn from(e: OpenAiError) -> Self {
        match e {
            OpenAiError::Http(err) if err.is_timeout() => GatewayError::Timeout,
            OpenAiError::Http(err) if err.is_connect() => {
                GatewayError::ConnectionError(err.to_string())
            }
            OpenAiError::Http(err) => GatewayError::RequestFailed(err.to_string()),
            OpenAiError::Serialization(err) => GatewayError::MalformedResponse(err.to_string()),
            OpenAiError::NoChoices => GatewayError::MalformedResponse(e.to_string()),
            OpenAiError::MissingApiKey(_) | OpenAiError::Unauthorized(_) => {
                GatewayError::AuthenticationFailed(e.to_string())
            }
            OpenAiError::RateLimited(message) => GatewayError::RateLimited(message),
            OpenAiError::Api { status: 404, message } => GatewayError::ModelNotAvailable(message),
            OpenAiError::Api { .. } => GatewayError::RequestFailed(e.to_string()),
        }
    }
}
