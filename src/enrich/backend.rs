use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;

use super::prompt;
use super::types::{CategoryMap, RecordSummary, TagBatchResponse};
use crate::config::{AiConfig, Provider};
use crate::llm::anthropic::{self, AnthropicClient, AnthropicClientConfig};
use crate::llm::openai::{self, OpenAiClient, OpenAiClientConfig};
use crate::llm::{ChatCompletionRequest, ChatMessage, ChatRole, LlmClient, LlmError};

const CATEGORIZE_MAX_TOKENS: u32 = 8000;
const TAG_MAX_TOKENS: u32 = 4000;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no answer within {:.0}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("encode prompt: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The reasoning service behind both enrichment passes.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn categorize(&self, records: &[RecordSummary]) -> Result<CategoryMap, BackendError>;

    async fn tag_batch(
        &self,
        category: &str,
        records: &[RecordSummary],
    ) -> Result<TagBatchResponse, BackendError>;
}

pub struct LlmBackend<C> {
    name: &'static str,
    client: C,
}

impl<C: LlmClient> LlmBackend<C> {
    pub fn new(name: &'static str, client: C) -> Self {
        Self { name, client }
    }

    async fn ask(&self, user: String, max_tokens: u32) -> Result<String, BackendError> {
        let request = ChatCompletionRequest {
            model: None,
            messages: vec![
                ChatMessage::new(ChatRole::System, prompt::SYSTEM),
                ChatMessage::new(ChatRole::User, user),
            ],
            max_tokens: Some(max_tokens),
            temperature: None,
            top_p: None,
            json_response: true,
        };
        let response = self.client.chat_completion(request).await?;
        if let Some(usage) = &response.usage {
            tracing::debug!(
                backend = self.name,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "🔢 backend usage"
            );
        }
        Ok(response.content)
    }
}

#[async_trait]
impl<C: LlmClient> ReasoningBackend for LlmBackend<C> {
    fn name(&self) -> &'static str { self.name }

    async fn categorize(&self, records: &[RecordSummary]) -> Result<CategoryMap, BackendError> {
        let content = self.ask(prompt::categorize_prompt(records)?, CATEGORIZE_MAX_TOKENS).await?;
        prompt::parse_category_map(&content)
    }

    async fn tag_batch(
        &self,
        category: &str,
        records: &[RecordSummary],
    ) -> Result<TagBatchResponse, BackendError> {
        let content = self.ask(prompt::tag_prompt(category, records)?, TAG_MAX_TOKENS).await?;
        prompt::parse_tag_response(&content)
    }
}

/// No reasoning service: every call fails, so the enricher takes its
/// local fallback path for everything.
pub struct OfflineBackend;

#[async_trait]
impl ReasoningBackend for OfflineBackend {
    fn name(&self) -> &'static str { "offline" }

    async fn categorize(&self, _records: &[RecordSummary]) -> Result<CategoryMap, BackendError> {
        Err(BackendError::Unavailable("offline mode".into()))
    }

    async fn tag_batch(
        &self,
        _category: &str,
        _records: &[RecordSummary],
    ) -> Result<TagBatchResponse, BackendError> {
        Err(BackendError::Unavailable("offline mode".into()))
    }
}

pub fn build_backend(ai: &AiConfig) -> anyhow::Result<Box<dyn ReasoningBackend>> {
    let timeout = Duration::from_secs(ai.timeout_secs);
    match ai.provider {
        Provider::Anthropic => {
            let api_key = ai
                .anthropic_api_key
                .clone()
                .context("ANTHROPIC_API_KEY is required for the anthropic provider")?;
            let client = AnthropicClient::new(AnthropicClientConfig {
                api_key: Some(api_key),
                base_url: ai.anthropic_base_url.clone().unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string()),
                default_model: ai.model.clone().unwrap_or_else(|| anthropic::DEFAULT_MODEL.to_string()),
                timeout,
                ..Default::default()
            })?;
            Ok(Box::new(LlmBackend::new("anthropic", client)))
        }
        Provider::Openai => {
            let api_key = ai
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is required for the openai provider")?;
            let client = OpenAiClient::new(OpenAiClientConfig {
                api_key: Some(api_key),
                base_url: ai.openai_base_url.clone().unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
                default_model: ai.model.clone().unwrap_or_else(|| openai::DEFAULT_MODEL.to_string()),
                timeout,
                ..Default::default()
            })?;
            Ok(Box::new(LlmBackend::new("openai", client)))
        }
        Provider::Offline => Ok(Box::new(OfflineBackend)),
    }
}
