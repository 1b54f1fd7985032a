use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod anthropic;
pub mod openai;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Ask providers that support it to constrain output to a JSON object.
    pub json_response: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChatRole {
    System,
    User,
}

impl ChatRole {
    pub(crate) fn as_api_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
        }
    }
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatCompletionResponse {
    pub content: String,
    pub raw: Value,
    pub usage: Option<UsageMetrics>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UsageMetrics {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0} is not set")]
    MissingApiKey(&'static str),
    #[error("chat completion requires at least one message")]
    EmptyMessages,
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("api error {status}: {}", .error.message)]
    Api {
        status: StatusCode,
        error: ApiErrorBody,
    },
    #[cfg(test)]
    #[error("mock client response queue is empty")]
    MockQueueEmpty,
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LlmError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(err)
        }
    }
}

/// Error body shared by both providers: `{"error": {"type": .., "message": ..}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl Default for ApiErrorBody {
    fn default() -> Self {
        Self {
            message: "unknown error".to_string(),
            r#type: None,
            code: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub(crate) error: ApiErrorBody,
}

pub(crate) fn api_error(status: StatusCode, body: &[u8]) -> LlmError {
    let error = serde_json::from_slice::<ApiErrorEnvelope>(body)
        .ok()
        .map(|env| env.error)
        .unwrap_or_default();
    LlmError::Api { status, error }
}

#[cfg(test)]
pub use mock::MockClient;


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_enqueued_response() {
        let mock = MockClient::new();
        mock.push_text("hi");

        let req = ChatCompletionRequest {
            model: None,
            messages: vec![ChatMessage::new(ChatRole::User, "Hello")],
            max_tokens: None,
            temperature: None,
            top_p: None,
            json_response: false,
        };
        let out = mock.chat_completion(req.clone()).await.unwrap();

        assert_eq!(out.content, "hi");
        assert_eq!(mock.calls(), vec![req.clone()]);
        assert!(matches!(mock.chat_completion(req).await, Err(LlmError::MockQueueEmpty)));
    }

    #[test]
    fn api_error_display_includes_status() {
        let body = br#"{"error": {"type": "invalid_request_error", "message": "bad request"}}"#;
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(format!("{err}"), "api error 400 Bad Request: bad request");
    }

    #[test]
    fn unparseable_error_body_uses_default_message() {
        let err = api_error(StatusCode::BAD_GATEWAY, b"<html>gateway</html>");
        assert_eq!(format!("{err}"), "api error 502 Bad Gateway: unknown error");
    }
}
