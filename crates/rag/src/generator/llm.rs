//! Generator backed by a language-model client.

use super::{AnswerStream, Generator, PromptTemplate};
use crate::types::{GeneratorContext, GeneratorResponse};
use futures::StreamExt;
use ragpipe_core::config::GenerationSettings;
use ragpipe_core::{AppError, AppResult};
use ragpipe_llm::{ContextPassage, LlmClient, LlmRequest};
use std::sync::Arc;

/// Generates answers by prompting an [`LlmClient`] with the retrieved
/// passages.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    prompt: PromptTemplate,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            client,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            prompt: PromptTemplate::standard()?,
        })
    }

    /// Build the client named in `settings` and apply its sampling options.
    pub fn from_settings(settings: &GenerationSettings) -> AppResult<Self> {
        let client = ragpipe_llm::create_client(&settings.provider)?;
        let mut generator = Self::new(client, settings.model.clone())?;
        generator.temperature = settings.temperature;
        generator.max_tokens = settings.max_tokens;
        if let Some(template) = &settings.system_template {
            generator = generator.with_prompt(PromptTemplate::new(template)?);
        }
        Ok(generator)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Replace the system prompt template.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    fn build_request(&self, context: &GeneratorContext) -> AppResult<LlmRequest> {
        let retrieved = &context.retrieved_context;
        let system = self.prompt.render(&context.query.text, retrieved)?;

        let passages = retrieved
            .retrieved_chunks()
            .iter()
            .map(|chunk| ContextPassage::new(chunk.id.clone(), chunk.content.clone()))
            .collect();

        let mut request = LlmRequest::new(context.query.text.clone(), self.model.clone())
            .with_system(system)
            .with_passages(passages);

        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        Ok(request)
    }
}

#[async_trait::async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, context: &GeneratorContext) -> AppResult<GeneratorResponse> {
        let request = self.build_request(context)?;

        tracing::debug!(
            "Generating answer for query {} with {} ({} passages)",
            context.query.id,
            self.client.provider_name(),
            request.passages.len()
        );

        let response = self
            .client
            .complete(&request)
            .await
            .map_err(AppError::into_generation_unavailable)?;

        Ok(GeneratorResponse {
            query_id: context.query.id.clone(),
            answer: response.content,
            context_used: context.retrieved_context.chunk_ids(),
        })
    }

    async fn stream_generate(&self, context: &GeneratorContext) -> AppResult<AnswerStream> {
        let request = self.build_request(context)?.with_streaming();

        tracing::debug!(
            "Streaming answer for query {} with {}",
            context.query.id,
            self.client.provider_name()
        );

        let stream = self
            .client
            .stream(&request)
            .await
            .map_err(AppError::into_generation_unavailable)?;

        let fragments = stream.filter_map(|item| async move {
            match item {
                Ok(chunk) if chunk.content.is_empty() => None,
                Ok(chunk) => Some(Ok(chunk.content)),
                Err(e) => Some(Err(e.into_generation_unavailable())),
            }
        });

        Ok(Box::pin(fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, Query, RetrieverResult};
    use futures::TryStreamExt;
    use ragpipe_llm::ExtractiveClient;

    fn context() -> GeneratorContext {
        let query = Query::new("What color is the sky?");
        let retrieved = RetrieverResult::new(
            query.id.clone(),
            vec![
                (Chunk::new("D1-0", "D1", "The sky is blue."), 0.8),
                (Chunk::new("D2-0", "D2", "Grass is green."), 0.1),
            ],
        );
        GeneratorContext::new(query, retrieved)
    }

    fn generator() -> LlmGenerator {
        LlmGenerator::new(Arc::new(ExtractiveClient::new()), "extractive-v1").unwrap()
    }

    #[tokio::test]
    async fn test_generate_cites_context() {
        let context = context();
        let response = generator().generate(&context).await.unwrap();

        assert_eq!(response.query_id, context.query.id);
        assert_eq!(response.answer, "The sky is blue. [D1-0]");
        assert_eq!(response.context_used, vec!["D1-0", "D2-0"]);
    }

    #[tokio::test]
    async fn test_stream_matches_generate() {
        let context = context();
        let generator = generator();

        let full = generator.generate(&context).await.unwrap().answer;
        let fragments: Vec<String> = generator
            .stream_generate(&context)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert!(fragments.len() > 1);
        assert!(fragments.iter().all(|f| !f.is_empty()));
        assert_eq!(fragments.concat(), full);
    }

    #[tokio::test]
    async fn test_request_carries_settings() {
        let generator = generator().with_temperature(0.3).with_max_tokens(128);
        let request = generator.build_request(&context()).unwrap();

        assert_eq!(request.prompt, "What color is the sky?");
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(128));
        assert_eq!(request.passages.len(), 2);
        assert!(request.system.unwrap().contains("[D1-0] The sky is blue."));
    }

    #[tokio::test]
    async fn test_from_settings_custom_system_template() {
        let settings = GenerationSettings {
            system_template: Some(
                "Answer {{query}} from {{#each passages}}[{{this.id}}]{{/each}}".to_string(),
            ),
            ..GenerationSettings::default()
        };
        let generator = LlmGenerator::from_settings(&settings).unwrap();
        let request = generator.build_request(&context()).unwrap();
        assert_eq!(
            request.system.as_deref(),
            Some("Answer What color is the sky? from [D1-0][D2-0]")
        );

        let broken = GenerationSettings {
            system_template: Some("{{#each passages}}".to_string()),
            ..GenerationSettings::default()
        };
        assert!(matches!(
            LlmGenerator::from_settings(&broken),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_from_settings_unknown_provider() {
        let settings = GenerationSettings {
            provider: "gpt".to_string(),
            ..GenerationSettings::default()
        };
        assert!(matches!(
            LlmGenerator::from_settings(&settings),
            Err(AppError::Config(_))
        ));
    }
}
