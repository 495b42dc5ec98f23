// Claude API provider implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::{with_retry, ApiStatusError};
use super::types::{CompletionRequest, CompletionResponse, Usage};
use super::LlmProvider;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock<'a>>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ResponseBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Claude API provider
///
/// Implements the LlmProvider trait for Anthropic's Messages API.
#[derive(Clone)]
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    default_model: String,
    api_url: String,
    max_retries: u32,
}

impl ClaudeProvider {
    /// Create a new Claude provider
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            default_model: "claude-sonnet-4-20250514".to_string(),
            api_url: CLAUDE_API_URL.to_string(),
            max_retries: 2,
        })
    }

    /// Create with custom default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at a different base URL (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        self.api_url = format!("{}/v1/messages", base.trim_end_matches('/'));
        self
    }

    /// Set the retry budget for 429/5xx responses
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn to_messages_request<'a>(&'a self, request: &'a CompletionRequest) -> MessagesRequest<'a> {
        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let system = request
            .system
            .as_deref()
            .map(|text| {
                vec![SystemBlock {
                    block_type: "text",
                    text,
                    cache_control: request.cache_system.then_some(CacheControl {
                        control_type: "ephemeral",
                    }),
                }]
            })
            .unwrap_or_default();

        MessagesRequest {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
            messages: vec![RequestMessage {
                role: "user",
                content: &request.prompt,
            }],
        }
    }

    /// Send a single request (no retry)
    async fn complete_once(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = self.to_messages_request(request);

        tracing::debug!(model = body.model, "Sending request to Claude API");

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Claude API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ApiStatusError {
                status: status.as_u16(),
                body: error_body,
            }
            .into());
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Claude API response")?;

        let text = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                cache_hit_rate = usage.cache_hit_rate(),
                "Claude usage"
            );
        }

        Ok(CompletionResponse {
            text,
            model: parsed.model,
            usage: parsed.usage,
            provider: "claude".to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        with_retry(self.max_retries, || self.complete_once(request)).await
    }

    fn name(&self) -> &str {
        "claude"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}
