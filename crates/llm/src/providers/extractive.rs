//! Extractive answer provider.
//!
//! A deterministic, offline stand-in for a language model. It answers by
//! quoting the passage sentences that share the most content terms with the
//! question, citing each one as `[passage-id]`. Streaming is full-then-chunk:
//! the whole answer is computed first and then split into fragments.

use crate::client::{ContextPassage, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use crate::fragments::{split_fragments, DEFAULT_WORDS_PER_FRAGMENT};
use ragpipe_core::text::term_set;
use ragpipe_core::AppResult;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// Answer returned when no passage sentence overlaps the question.
pub const NO_ANSWER: &str = "I could not find this information in the provided context.";

/// Default number of quoted sentences.
const DEFAULT_MAX_SENTENCES: usize = 3;

/// A candidate sentence with its overlap and original position.
struct Candidate<'a> {
    overlap: usize,
    passage_idx: usize,
    sentence_idx: usize,
    text: &'a str,
    passage_id: &'a str,
}

/// Extractive language-model client.
#[derive(Debug, Clone)]
pub struct ExtractiveClient {
    max_sentences: usize,
    words_per_fragment: usize,
}

impl ExtractiveClient {
    pub fn new() -> Self {
        Self {
            max_sentences: DEFAULT_MAX_SENTENCES,
            words_per_fragment: DEFAULT_WORDS_PER_FRAGMENT,
        }
    }

    /// Limit the number of quoted sentences (minimum one).
    pub fn with_max_sentences(mut self, max_sentences: usize) -> Self {
        self.max_sentences = max_sentences.max(1);
        self
    }

    /// Words per streamed fragment.
    pub fn with_words_per_fragment(mut self, words: usize) -> Self {
        self.words_per_fragment = words.max(1);
        self
    }

    /// Build the answer text for a question over passages.
    fn answer(&self, question: &str, passages: &[ContextPassage]) -> String {
        let terms = term_set(question);
        if terms.is_empty() {
            return NO_ANSWER.to_string();
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (passage_idx, passage) in passages.iter().enumerate() {
            for (sentence_idx, sentence) in passage.text.unicode_sentences().enumerate() {
                let sentence = sentence.trim();
                if sentence.is_empty() || !seen.insert(sentence) {
                    continue;
                }

                let overlap = term_set(sentence).intersection(&terms).count();
                if overlap > 0 {
                    candidates.push(Candidate {
                        overlap,
                        passage_idx,
                        sentence_idx,
                        text: sentence,
                        passage_id: &passage.id,
                    });
                }
            }
        }

        if candidates.is_empty() {
            return NO_ANSWER.to_string();
        }

        // Stable: equal overlaps keep passage order
        candidates.sort_by(|a, b| b.overlap.cmp(&a.overlap));
        candidates.truncate(self.max_sentences);
        candidates.sort_by_key(|c| (c.passage_idx, c.sentence_idx));

        candidates
            .iter()
            .map(|c| format!("{} [{}]", c.text, c.passage_id))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn usage(request: &LlmRequest, answer: &str) -> LlmUsage {
        let prompt_words = request.prompt.split_whitespace().count()
            + request
                .system
                .as_deref()
                .map(|s| s.split_whitespace().count())
                .unwrap_or(0);
        LlmUsage::new(
            prompt_words as u32,
            answer.split_whitespace().count() as u32,
        )
    }
}

impl Default for ExtractiveClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for ExtractiveClient {
    fn provider_name(&self) -> &str {
        "extractive"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(
            "Extractive completion over {} passages",
            request.passages.len()
        );

        let content = self.answer(&request.prompt, &request.passages);
        let usage = Self::usage(request, &content);

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage,
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        let response = self.complete(request).await?;
        let model = response.model.clone();

        let mut chunks: Vec<AppResult<LlmStreamChunk>> =
            split_fragments(&response.content, self.words_per_fragment)
                .into_iter()
                .map(|content| {
                    Ok(LlmStreamChunk {
                        content,
                        model: model.clone(),
                        done: false,
                        usage: None,
                    })
                })
                .collect();

        chunks.push(Ok(LlmStreamChunk {
            content: String::new(),
            model,
            done: true,
            usage: Some(response.usage),
        }));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
