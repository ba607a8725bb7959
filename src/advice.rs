//! Prompt construction and the single generation call behind `/advice`.

use std::sync::Arc;

use tracing::debug;

use crate::providers::{CompletionRequest, LlmProvider, Message, ProviderError};

/// Default model used for advice generation.
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";

/// Default output token budget for one piece of advice.
pub const DEFAULT_MAX_TOKENS: u32 = 300;

/// Generation failed or produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The provider call failed (transport, status, or parse).
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The provider answered but the first content block carried no text.
    #[error("generation returned no text content")]
    NoText,
}

/// Build the advice prompt from the rendered guidance lines and the situation.
pub fn build_prompt(situation: &str, guidance_lines: &[String]) -> String {
    let guidance = guidance_lines
        .iter()
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are Babushka, a wise relationship advisor who draws from the collective wisdom of many cultures and generations. You speak with the warm, caring voice of a grandmother who has seen many relationships succeed and fail.

Your advice should incorporate these philosophical perspectives:
{guidance}

Situation: {situation}

Provide warm, practical relationship advice that:
1. Shows empathy and understanding
2. Offers concrete, actionable steps
3. Draws from traditional wisdom while being relevant to modern relationships
4. Is encouraging but realistic
5. Uses gentle, grandmother-like language

Keep your response between 100-200 words. Address the person as \"dearest child\" or similar endearing terms."
    )
}

/// Turns a situation plus guidance into advice text via one provider call.
#[derive(Clone)]
pub struct AdviceGenerator {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl std::fmt::Debug for AdviceGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdviceGenerator")
            .field("model", &self.provider.model_id())
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AdviceGenerator {
    /// Create a generator over `provider` with an output token budget.
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    /// Generate advice. Single attempt; failures are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Provider`] if the call fails and
    /// [`UpstreamError::NoText`] if the first content block is missing or not text.
    pub async fn generate(
        &self,
        situation: &str,
        guidance_lines: &[String],
    ) -> Result<String, UpstreamError> {
        let request = CompletionRequest {
            messages: vec![Message::user(build_prompt(situation, guidance_lines))],
            max_tokens: Some(self.max_tokens),
        };

        debug!(model = self.provider.model_id(), "requesting advice completion");
        let response = self.provider.complete(request).await?;

        response
            .content
            .first()
            .and_then(|part| part.as_text())
            .map(str::to_owned)
            .ok_or(UpstreamError::NoText)
    }
}
