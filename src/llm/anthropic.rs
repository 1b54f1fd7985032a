use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    api_error, ChatCompletionRequest, ChatCompletionResponse, ChatRole, LlmClient, LlmError,
    UsageMetrics,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug)]
pub struct AnthropicClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub timeout: Duration,
}

impl Default for AnthropicClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            default_temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Messages API client. System turns are lifted into the top-level
/// `system` field; the API rejects them inside `messages`.
#[derive(Clone)]
pub struct AnthropicClient {
    http: HttpClient,
    cfg: AnthropicClientConfig,
}

impl AnthropicClient {
    pub fn new(cfg: AnthropicClientConfig) -> Result<Self, LlmError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(LlmError::from_reqwest)?;
        Ok(Self { http, cfg })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.cfg.base_url.trim_end_matches('/'))
    }

    fn build_api_request(&self, req: &ChatCompletionRequest) -> ApiMessagesRequest {
        let system: Vec<&str> = req
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();
        ApiMessagesRequest {
            model: req
                .model
                .clone()
                .unwrap_or_else(|| self.cfg.default_model.clone()),
            max_tokens: req.max_tokens.unwrap_or(self.cfg.default_max_tokens),
            temperature: req.temperature.unwrap_or(self.cfg.default_temperature),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: req
                .messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(|m| ApiMessage {
                    role: m.role.as_api_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let api_request = self.build_api_request(&request);
        if api_request.messages.is_empty() {
            return Err(LlmError::EmptyMessages);
        }
        let api_key = self
            .cfg
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey("ANTHROPIC_API_KEY"))?;

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&api_request)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(LlmError::from_reqwest)?;
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        let raw: Value = serde_json::from_slice(&bytes)?;
        let parsed: ApiMessagesResponse = serde_json::from_value(raw.clone())?;
        let content = parsed
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatCompletionResponse {
            content,
            raw,
            usage: parsed.usage.map(|u| UsageMetrics {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: match (u.input_tokens, u.output_tokens) {
                    (Some(i), Some(o)) => Some(i + o),
                    _ => None,
                },
            }),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Clone, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiMessagesResponse {
    content: Vec<ApiContentBlock>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new(AnthropicClientConfig {
            api_key: Some("sk-test".into()),
            base_url: base_url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: None,
            messages: vec![
                ChatMessage::new(ChatRole::System, "Reply with JSON only."),
                ChatMessage::new(ChatRole::User, "Group these podcasts"),
            ],
            max_tokens: Some(8000),
            temperature: None,
            top_p: None,
            json_response: true,
        }
    }

    #[test]
    fn system_messages_are_lifted() {
        let api = client(DEFAULT_BASE_URL).build_api_request(&request());
        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(value["system"], "Reply with JSON only.");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 8000);
        assert_eq!(value["model"], DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn messages_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{"type": "text", "text": "{\"tags\": "}, {"type": "text", "text": "{}}"}],
                "usage": {"input_tokens": 20, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let out = client(&server.uri()).chat_completion(request()).await.unwrap();
        assert_eq!(out.content, "{\"tags\": {}}");
        assert_eq!(out.usage.unwrap().total_tokens, Some(25));
    }

    #[tokio::test]
    async fn overloaded_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).chat_completion(request()).await.unwrap_err();
        match err {
            LlmError::Api { status, error } => {
                assert_eq!(status.as_u16(), 529);
                assert_eq!(error.message, "Overloaded");
                assert_eq!(error.r#type.as_deref(), Some("overloaded_error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn only_system_messages_is_rejected() {
        let mut req = request();
        req.messages.retain(|m| m.role == ChatRole::System);
        let err = client(DEFAULT_BASE_URL).chat_completion(req).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyMessages));
    }
}
