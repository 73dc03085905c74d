//! Answer generation from retrieved context.

pub mod llm;
pub mod predefined;
pub mod prompt;

pub use llm::LlmGenerator;
pub use predefined::PredefinedGenerator;
pub use prompt::{PromptTemplate, DEFAULT_SYSTEM_TEMPLATE};

use crate::types::{GeneratorContext, GeneratorResponse};
use futures::Stream;
use ragpipe_core::AppResult;
use std::pin::Pin;

/// Lazy, finite stream of answer fragments.
///
/// Concatenating every `Ok` fragment gives the answer. An `Err` item means
/// generation failed part way; fragments already yielded stay valid.
pub type AnswerStream = Pin<Box<dyn Stream<Item = AppResult<String>> + Send>>;

/// Turns a query and its retrieved context into an answer.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, context: &GeneratorContext) -> AppResult<GeneratorResponse>;

    /// Streaming variant of [`generate`](Self::generate); the fragments
    /// concatenate to the same answer.
    async fn stream_generate(&self, context: &GeneratorContext) -> AppResult<AnswerStream>;
}
