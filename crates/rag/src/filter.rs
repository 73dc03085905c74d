//! Metadata and score filters applied during retrieval.

use crate::types::{Chunk, MetadataValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for filtered retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Chunk metadata that must match exactly
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,

    /// Restrict results to these documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,

    /// Minimum relevance score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

impl SearchFilters {
    /// Create a new empty filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a metadata key to hold a value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Restrict to a set of documents
    pub fn with_document_ids(mut self, document_ids: Vec<String>) -> Self {
        self.document_ids = Some(document_ids);
        self
    }

    /// Set minimum relevance score
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Check if any filters are set
    pub fn has_filters(&self) -> bool {
        !self.metadata.is_empty() || self.document_ids.is_some() || self.min_score.is_some()
    }

    /// Whether a chunk passes the metadata and document filters.
    ///
    /// Score is not considered here; see [`SearchFilters::apply`].
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(document_ids) = &self.document_ids {
            if !document_ids.iter().any(|id| id == &chunk.document_id) {
                return false;
            }
        }

        self.metadata
            .iter()
            .all(|(key, expected)| chunk.metadata_value(key) == Some(expected))
    }

    /// Apply filters to a list of chunks with scores, preserving order.
    pub fn apply(&self, chunks: Vec<(Chunk, f32)>) -> Vec<(Chunk, f32)> {
        let mut filtered = chunks;

        // Score first, cheapest
        if let Some(min_score) = self.min_score {
            filtered.retain(|(_, score)| *score >= min_score);
        }

        filtered.retain(|(chunk, _)| self.matches(chunk));

        filtered
    }
}
