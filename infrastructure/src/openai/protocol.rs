//! Wire types for the chat completions endpoint

use council_application::CompletionRequest;
use council_domain::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    /// System instruction first, then the request's turns in order
    pub fn from_completion(request: &CompletionRequest, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| ChatMessage {
            role: role_name(&m.role).to_string(),
            content: m.content.clone(),
        }));

        Self {
            model: request.model.as_str().to_string(),
            messages,
            stream,
            response_format: request.json_response.then(ResponseFormat::json_object),
        }
    }
}

fn role_name(role: &Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Text of the first choice; a null content counts as empty
    pub fn first_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatChunk {
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{Message, Model};

    #[test]
    fn test_judge_request_asks_for_json_object() {
        let request = CompletionRequest::new(Model::Gpt5, "You are the judge")
            .with_message(Message::user("Evaluate"))
            .expecting_json();

        let body = serde_json::to_value(ChatRequest::from_completion(&request, false)).unwrap();
        assert_eq!(body["model"], "gpt-5");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Evaluate");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_worker_stream_request() {
        let request = CompletionRequest::new(Model::Gpt4oMini, "persona")
            .with_messages(vec![Message::user("q"), Message::user("feedback")]);

        let body = serde_json::to_value(ChatRequest::from_completion(&request, true)).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_null_content_is_empty_text() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert_eq!(response.first_text(), Some(String::new()));
    }

    #[test]
    fn test_chunk_delta_text() {
        let chunk: ChatChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#)
                .unwrap();
        assert_eq!(chunk.delta_text(), Some("Hel"));

        let role_only: ChatChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(role_only.delta_text(), None);
    }
}
