//! Canned answers for selected queries.

use super::{AnswerStream, Generator};
use crate::types::{GeneratorContext, GeneratorResponse};
use ragpipe_core::AppResult;
use ragpipe_llm::fragments::{split_fragments, DEFAULT_WORDS_PER_FRAGMENT};
use std::collections::HashMap;

/// Answers selected queries with fixed text, delegating the rest.
///
/// Matches on exact query text. Canned answers stream a couple of words per
/// fragment. Intended for tests and debugging sessions.
pub struct PredefinedGenerator<G> {
    inner: G,
    answers: HashMap<String, String>,
    words_per_fragment: usize,
}

impl<G: Generator> PredefinedGenerator<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            answers: HashMap::new(),
            words_per_fragment: DEFAULT_WORDS_PER_FRAGMENT,
        }
    }

    pub fn with_answer(mut self, text: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(text.into(), answer.into());
        self
    }

    pub fn with_words_per_fragment(mut self, words: usize) -> Self {
        self.words_per_fragment = words.max(1);
        self
    }
}

#[async_trait::async_trait]
impl<G: Generator> Generator for PredefinedGenerator<G> {
    async fn generate(&self, context: &GeneratorContext) -> AppResult<GeneratorResponse> {
        match self.answers.get(&context.query.text) {
            Some(answer) => Ok(GeneratorResponse {
                query_id: context.query.id.clone(),
                answer: answer.clone(),
                context_used: context.retrieved_context.chunk_ids(),
            }),
            None => self.inner.generate(context).await,
        }
    }

    async fn stream_generate(&self, context: &GeneratorContext) -> AppResult<AnswerStream> {
        match self.answers.get(&context.query.text) {
            Some(answer) => {
                let fragments: Vec<AppResult<String>> =
                    split_fragments(answer, self.words_per_fragment)
                        .into_iter()
                        .map(Ok)
                        .collect();
                Ok(Box::pin(futures::stream::iter(fragments)))
            }
            None => self.inner.stream_generate(context).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::LlmGenerator;
    use crate::types::{Chunk, Query, RetrieverResult};
    use futures::TryStreamExt;
    use ragpipe_llm::ExtractiveClient;
    use std::sync::Arc;

    fn generator() -> PredefinedGenerator<LlmGenerator> {
        let inner = LlmGenerator::new(Arc::new(ExtractiveClient::new()), "extractive-v1").unwrap();
        PredefinedGenerator::new(inner)
            .with_answer("Tell me about C", "This is the predefined answer about C.")
    }

    fn context(text: &str) -> GeneratorContext {
        let query = Query::new(text);
        let retrieved = RetrieverResult::new(
            query.id.clone(),
            vec![(Chunk::new("C-0", "C", "C is a systems language."), 1.0)],
        );
        GeneratorContext::new(query, retrieved)
    }

    #[tokio::test]
    async fn test_predefined_answer() {
        let response = generator().generate(&context("Tell me about C")).await.unwrap();
        assert_eq!(response.answer, "This is the predefined answer about C.");
        assert_eq!(response.context_used, vec!["C-0"]);
    }

    #[tokio::test]
    async fn test_predefined_stream_two_words_per_fragment() {
        let fragments: Vec<String> = generator()
            .stream_generate(&context("Tell me about C"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            fragments,
            vec!["This is ", "the predefined ", "answer about ", "C."]
        );
    }

    #[tokio::test]
    async fn test_other_queries_delegate() {
        let response = generator()
            .generate(&context("Which language is C?"))
            .await
            .unwrap();
        assert_eq!(response.answer, "C is a systems language. [C-0]");
    }
}
