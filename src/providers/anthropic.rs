//! Anthropic provider implementation using the `/v1/messages` API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credentials::AnthropicAuth;

use super::{
    check_http_response, CompletionRequest, CompletionResponse, ContentPart, LlmProvider,
    ProviderError, StopReason, UsageStats,
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Wire types (pub for integration testing)
// ---------------------------------------------------------------------------

/// Anthropic messages API request body.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<AnthropicMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A message in Anthropic format.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Always "user".
    pub role: String,
    /// Text content.
    pub content: String,
}

/// Anthropic API response body.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// Content blocks in the response.
    pub content: Vec<AnthropicContentBlock>,
    /// Model that served the response.
    pub model: String,
    /// Why the model stopped generating.
    pub stop_reason: Option<String>,
    /// Token usage.
    pub usage: AnthropicUsage,
}

/// A content block in the Anthropic response.
///
/// Only the `type` tag and, for text blocks, the text are kept.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicContentBlock {
    /// Block type tag (`text`, `tool_use`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Text, present on `text` blocks.
    #[serde(default)]
    pub text: Option<String>,
}

/// Anthropic usage statistics.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    /// Input tokens consumed.
    pub input_tokens: u32,
    /// Output tokens generated.
    pub output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Anthropic messages API provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    model_name: String,
    auth: AnthropicAuth,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Request` if the HTTP client cannot be built.
    pub fn new(
        model_name: String,
        auth: AnthropicAuth,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            model_name,
            auth,
            endpoint: ANTHROPIC_API_BASE.to_owned(),
            client,
        })
    }

    /// Point the provider at a different messages endpoint (proxies, tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Request / Response builders (pub for integration testing)
// ---------------------------------------------------------------------------

/// Build an Anthropic API request from a completion request.
#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest) -> AnthropicRequest {
    let messages = request
        .messages
        .iter()
        .map(|msg| AnthropicMessage {
            role: "user".to_owned(),
            content: msg.content.clone(),
        })
        .collect();

    AnthropicRequest {
        model: model.to_owned(),
        messages,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    }
}

/// Parse an Anthropic API response into a completion response.
///
/// # Errors
///
/// Returns `ProviderError::Parse` if the response cannot be deserialized.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let resp: AnthropicResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let content = resp
        .content
        .into_iter()
        .map(|block| match (block.kind.as_str(), block.text) {
            ("text", Some(text)) => ContentPart::Text { text },
            _ => ContentPart::Other { kind: block.kind },
        })
        .collect();

    let stop_reason = match resp.stop_reason.as_deref() {
        Some("end_turn") | None => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some(other) => StopReason::Other(other.to_owned()),
    };

    Ok(CompletionResponse {
        content,
        stop_reason,
        usage: UsageStats {
            input_tokens: resp.usage.input_tokens,
            output_tokens: resp.usage.output_tokens,
        },
        model: resp.model,
    })
}

// ---------------------------------------------------------------------------
// Trait impl
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let api_request = build_request(&self.model_name, &request);

        let response = self
            .client
            .post(&self.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("x-api-key", self.auth.expose())
            .json(&api_request)
            .send()
            .await?;

        let payload = check_http_response(response).await?;
        let parsed = parse_response(&payload)?;
        tracing::debug!(
            model = %parsed.model,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            "anthropic completion received"
        );
        Ok(parsed)
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }
}
