//! Language-model client abstraction and request/response types.
//!
//! The pipeline treats the language model as an external collaborator:
//! anything that can turn a question plus grounding passages into text,
//! either in one piece or as a stream of fragments.

use futures::Stream;
use ragpipe_core::AppResult;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A grounding passage attached to a request.
///
/// Providers that only understand plain prompts can ignore these; the
/// rendered system prompt already contains the same text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPassage {
    /// Identifier the answer may cite (a chunk id)
    pub id: String,

    /// Passage text
    pub text: String,
}

impl ContextPassage {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// User prompt (the question)
    pub prompt: String,

    /// Model identifier
    pub model: String,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Streaming requested
    #[serde(default)]
    pub stream: bool,

    /// System prompt (instructions and rendered context)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Grounding passages, in retrieval order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passages: Vec<ContextPassage>,
}

impl LlmRequest {
    /// Create a new request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            stream: false,
            system: None,
            passages: Vec::new(),
        }
    }

    /// Enable streaming for this request.
    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach grounding passages.
    pub fn with_passages(mut self, passages: Vec<ContextPassage>) -> Self {
        self.passages = passages;
        self
    }
}

/// Completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    pub usage: LlmUsage,

    /// Whether the response was complete
    #[serde(default = "default_true")]
    pub done: bool,
}

fn default_true() -> bool {
    true
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A fragment of a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    /// Incremental text content
    pub content: String,

    pub model: String,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage statistics (only in final chunk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

/// Stream of response fragments.
///
/// Finite and not restartable. Dropping it stops consumption.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// Trait for language-model providers.
///
/// Implementations must keep `complete` and `stream` content-consistent:
/// concatenating every streamed `content` yields the `complete` answer for
/// the same request.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "extractive").
    fn provider_name(&self) -> &str;

    /// Non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Streaming completion.
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = LlmRequest::new("What color is the sky?", "extractive-v1")
            .with_system("Answer from context")
            .with_temperature(0.2)
            .with_max_tokens(64)
            .with_passages(vec![ContextPassage::new("D1-0", "The sky is blue.")])
            .with_streaming();

        assert!(request.stream);
        assert_eq!(request.system.as_deref(), Some("Answer from context"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(64));
        assert_eq!(request.passages[0].id, "D1-0");
    }

    #[test]
    fn test_usage_totals() {
        let usage = LlmUsage::new(12, 30);
        assert_eq!(usage.total_tokens, 42);
    }

    #[test]
    fn test_request_serialization_skips_empty_passages() {
        let request = LlmRequest::new("hi", "m");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("passages").is_none());
        assert!(json.get("system").is_none());
    }
}
