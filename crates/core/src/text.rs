//! Content-term extraction.
//!
//! Lexical retrieval, the trigram embedder and the extractive answerer all
//! need the same notion of a "meaningful word": Unicode word segmentation,
//! lowercased, with short words and common English stop words removed.

use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

/// Words carrying no topical signal.
pub const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "who", "how", "why", "when", "where", "does",
    "did", "do", "can", "about",
];

/// Minimum character count for a word to count as a term.
const MIN_TERM_CHARS: usize = 3;

/// Extract content terms in order of appearance (duplicates kept).
pub fn content_terms(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= MIN_TERM_CHARS && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Distinct content terms, sorted.
pub fn term_set(text: &str) -> BTreeSet<String> {
    content_terms(text).into_iter().collect()
}
