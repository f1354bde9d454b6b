//! LLM Gateway implementation over an OpenAI-compatible HTTP API

use super::error::{OpenAiError, Result};
use super::protocol::{ChatChunk, ChatRequest, ChatResponse};
use super::sse::{SseData, SseDecoder};
use async_trait::async_trait;
use council_application::{CompletionRequest, GatewayError, LlmGateway, StreamHandle};
use council_domain::StreamEvent;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Stream buffer between the HTTP reader task and the consumer
const STREAM_BUFFER: usize = 64;

/// Gateway to an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiGateway {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Read the API key from the named environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let key = std::env::var(var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OpenAiError::MissingApiKey(var.to_string()))?;
        Ok(Self::new(key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, body: &ChatRequest) -> Result<reqwest::Response> {
        debug!(
            "POST {}/chat/completions model={} messages={} stream={}",
            self.base_url,
            body.model,
            body.messages.len(),
            body.stream
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OpenAiError::from_status(status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn chat(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest::from_completion(request, false);
        let response = self.post(&body).await?;
        let completion: ChatResponse = response.json().await?;
        completion.first_text().ok_or(OpenAiError::NoChoices)
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, GatewayError> {
        Ok(self.chat(request).await?)
    }

    async fn stream_complete(
        &self,
        request: &CompletionRequest,
    ) -> std::result::Result<StreamHandle, GatewayError> {
        let body = ChatRequest::from_completion(request, true);
        // Status errors surface here, before any event is produced
        let response = self.post(&body).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            let mut full_text = String::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Completion stream broke: {}", e);
                        let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                        return;
                    }
                };

                for data in decoder.push(&chunk) {
                    match forward(data, &mut full_text, &tx).await {
                        Forward::Continue => {}
                        Forward::Finished | Forward::ReceiverGone => return,
                    }
                }
            }

            for data in decoder.finish() {
                if !matches!(forward(data, &mut full_text, &tx).await, Forward::Continue) {
                    return;
                }
            }
            // Closed without [DONE]
            let _ = tx.send(StreamEvent::Completed(full_text)).await;
        });

        Ok(StreamHandle::new(rx))
    }
}

enum Forward {
    Continue,
    Finished,
    ReceiverGone,
}

async fn forward(data: SseData, full_text: &mut String, tx: &mpsc::Sender<StreamEvent>) -> Forward {
    match data {
        SseData::Done => {
            let _ = tx
                .send(StreamEvent::Completed(std::mem::take(full_text)))
                .await;
            Forward::Finished
        }
        SseData::Data(payload) => match serde_json::from_str::<ChatChunk>(&payload) {
            Ok(chunk) => match chunk.delta_text() {
                Some(text) => {
                    full_text.push_str(text);
                    if tx.send(StreamEvent::Delta(text.to_string())).await.is_err() {
                        debug!("Stream receiver dropped");
                        return Forward::ReceiverGone;
                    }
                    Forward::Continue
                }
                None => Forward::Continue,
            },
            Err(e) => {
                debug!("Skipping unparseable stream payload: {}", e);
                Forward::Continue
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let gateway = OpenAiGateway::new("key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(gateway.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_from_env_missing_key() {
        let err = OpenAiGateway::from_env("COUNCIL_TEST_KEY_THAT_IS_NEVER_SET").err();
        assert!(matches!(err, Some(OpenAiError::MissingApiKey(_))));
    }

    #[tokio::test]
    async fn test_forward_accumulates_and_completes() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut text = String::new();

        let chunk = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#.to_string();
        assert!(matches!(
            forward(SseData::Data(chunk), &mut text, &tx).await,
            Forward::Continue
        ));
        assert!(matches!(
            forward(SseData::Done, &mut text, &tx).await,
            Forward::Finished
        ));

        assert_eq!(rx.recv().await, Some(StreamEvent::Delta("Hi".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Completed("Hi".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_gateway_error() {
        let gateway = OpenAiGateway::new("key").with_base_url("http://127.0.0.1:9");
        let request = CompletionRequest::new(council_domain::Model::Gpt4oMini, "sys");
        let err = gateway.complete(&request).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ConnectionError(_) | GatewayError::RequestFailed(_)
        ));
    }
}
