//! Pipeline data model.
//!
//! Documents and chunks are what ingestion stores; queries, retriever
//! results and generator types are what flows through a single request.

use crate::filter::SearchFilters;
use chrono::{DateTime, Utc};
use ragpipe_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 5;

/// Scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// String-keyed scalar metadata.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    File,
    #[default]
    Text,
    Url,
    Database,
    Api,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Text => "text",
            Self::Url => "url",
            Self::Database => "database",
            Self::Api => "api",
        }
    }
}

/// A source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within a store
    pub id: String,

    pub content: String,

    pub source: DataSource,

    /// File path, URL or other locator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Document {
    /// Create a document stamped with the current time.
    pub fn new(id: impl Into<String>, content: impl Into<String>, source: DataSource) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source,
            source_uri: None,
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A retrievable span of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier within a store
    pub id: String,

    /// Owning document
    pub document_id: String,

    pub content: String,

    /// Embedding vector; length must equal the index dimension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Chunk {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            content: content.into(),
            embedding: None,
            metadata: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Look up a single metadata value.
    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// Retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Embedding similarity
    #[default]
    Vector,
    /// Similarity seeds expanded along document -> chunk links
    Graph,
    /// Weighted fusion of vector and lexical scores
    Hybrid,
    /// Lexical term overlap
    Naive,
}

impl RetrievalMode {
    /// Parse mode from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vector" => Some(Self::Vector),
            "graph" => Some(Self::Graph),
            "hybrid" => Some(Self::Hybrid),
            "naive" => Some(Self::Naive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Hybrid => "hybrid",
            Self::Naive => "naive",
        }
    }
}

/// A retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Unique per request
    pub id: String,

    pub text: String,

    pub mode: RetrievalMode,

    /// Maximum number of chunks to retrieve; must be positive
    pub top_k: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<SearchFilters>,
}

impl Query {
    /// Create a vector-mode query with a fresh id and default top-k.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            mode: RetrievalMode::default(),
            top_k: DEFAULT_TOP_K,
            filters: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Reject queries that cannot be answered.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::InvalidQuery(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(AppError::InvalidQuery("query text is empty".to_string()));
        }
        Ok(())
    }
}

/// Ranked retrieval output.
///
/// `retrieved_chunks` and `scores` are parallel and always the same length.
/// Scores are non-increasing; chunks with equal scores keep store insertion
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRetrieverResult")]
pub struct RetrieverResult {
    query_id: String,
    retrieved_chunks: Vec<Chunk>,
    scores: Vec<f32>,
}

/// Unchecked wire form; deserialization goes through [`RetrieverResult::from_parts`].
#[derive(Deserialize)]
struct RawRetrieverResult {
    query_id: String,
    retrieved_chunks: Vec<Chunk>,
    scores: Vec<f32>,
}

impl TryFrom<RawRetrieverResult> for RetrieverResult {
    type Error = AppError;

    fn try_from(raw: RawRetrieverResult) -> AppResult<Self> {
        Self::from_parts(raw.query_id, raw.retrieved_chunks, raw.scores)
    }
}

impl RetrieverResult {
    /// Build from `(chunk, score)` pairs already in ranked order.
    ///
    /// Pairs are re-sorted (stably) if a caller hands them out of order.
    pub fn new(query_id: impl Into<String>, mut ranked: Vec<(Chunk, f32)>) -> Self {
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (retrieved_chunks, scores) = ranked.into_iter().unzip();
        Self {
            query_id: query_id.into(),
            retrieved_chunks,
            scores,
        }
    }

    pub fn empty(query_id: impl Into<String>) -> Self {
        Self::new(query_id, Vec::new())
    }

    /// Build from parallel sequences, checking the length and order contract.
    pub fn from_parts(
        query_id: impl Into<String>,
        retrieved_chunks: Vec<Chunk>,
        scores: Vec<f32>,
    ) -> AppResult<Self> {
        if retrieved_chunks.len() != scores.len() {
            return Err(AppError::InvalidInput(format!(
                "{} chunks but {} scores",
                retrieved_chunks.len(),
                scores.len()
            )));
        }
        if scores.iter().any(|s| !s.is_finite()) {
            return Err(AppError::InvalidInput("scores must be finite".to_string()));
        }
        if scores.windows(2).any(|w| w[0] < w[1]) {
            return Err(AppError::InvalidInput(
                "scores must be in descending order".to_string(),
            ));
        }
        Ok(Self {
            query_id: query_id.into(),
            retrieved_chunks,
            scores,
        })
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn retrieved_chunks(&self) -> &[Chunk] {
        &self.retrieved_chunks
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.retrieved_chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retrieved_chunks.is_empty()
    }

    /// Chunk identifiers in ranked order.
    pub fn chunk_ids(&self) -> Vec<String> {
        self.retrieved_chunks.iter().map(|c| c.id.clone()).collect()
    }

    /// Highest score, if any chunk was retrieved.
    pub fn max_score(&self) -> Option<f32> {
        self.scores.first().copied()
    }

    /// Iterate `(chunk, score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Chunk, f32)> {
        self.retrieved_chunks.iter().zip(self.scores.iter().copied())
    }
}

/// Everything one generation call needs.
#[derive(Debug, Clone)]
pub struct GeneratorContext {
    pub query: Query,
    pub retrieved_context: RetrieverResult,
}

impl GeneratorContext {
    pub fn new(query: Query, retrieved_context: RetrieverResult) -> Self {
        Self {
            query,
            retrieved_context,
        }
    }
}

/// Generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorResponse {
    pub query_id: String,

    pub answer: String,

    /// Chunk ids given to the generator, in retrieval order
    pub context_used: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str) -> Chunk {
        Chunk::new(id, "doc", format!("content of {}", id))
    }

    #[test]
    fn test_retrieval_mode_parsing() {
        assert_eq!(RetrievalMode::parse("vector"), Some(RetrievalMode::Vector));
        assert_eq!(RetrievalMode::parse("GRAPH"), Some(RetrievalMode::Graph));
        assert_eq!(RetrievalMode::parse("hybrid"), Some(RetrievalMode::Hybrid));
        assert_eq!(RetrievalMode::parse("naive"), Some(RetrievalMode::Naive));
        assert_eq!(RetrievalMode::parse("semantic"), None);
        assert_eq!(RetrievalMode::Hybrid.as_str(), "hybrid");
    }

    #[test]
    fn test_query_defaults() {
        let query = Query::new("What color is the sky?");
        assert_eq!(query.top_k, DEFAULT_TOP_K);
        assert_eq!(query.mode, RetrievalMode::Vector);
        assert!(uuid::Uuid::parse_str(&query.id).is_ok());
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_query_ids_are_unique() {
        assert_ne!(Query::new("a").id, Query::new("a").id);
    }

    #[test]
    fn test_query_validation() {
        let zero = Query::new("sky").with_top_k(0);
        assert!(matches!(zero.validate(), Err(AppError::InvalidQuery(_))));

        let blank = Query::new("   ");
        assert!(matches!(blank.validate(), Err(AppError::InvalidQuery(_))));
    }

    #[test]
    fn test_retriever_result_sorts_descending() {
        let result = RetrieverResult::new(
            "q1",
            vec![(chunk("a"), 0.2), (chunk("b"), 0.9), (chunk("c"), 0.2)],
        );

        assert_eq!(result.query_id(), "q1");
        assert_eq!(result.chunk_ids(), vec!["b", "a", "c"]);
        assert_eq!(result.scores(), &[0.9, 0.2, 0.2]);
        assert_eq!(result.max_score(), Some(0.9));
    }

    #[test]
    fn test_from_parts_enforces_contract() {
        let mismatched = RetrieverResult::from_parts("q", vec![chunk("a")], vec![1.0, 0.5]);
        assert!(matches!(mismatched, Err(AppError::InvalidInput(_))));

        let unsorted = RetrieverResult::from_parts("q", vec![chunk("a"), chunk("b")], vec![0.1, 0.5]);
        assert!(matches!(unsorted, Err(AppError::InvalidInput(_))));

        let nan = RetrieverResult::from_parts("q", vec![chunk("a"), chunk("b")], vec![f32::NAN, 0.5]);
        assert!(matches!(nan, Err(AppError::InvalidInput(_))));

        let ok = RetrieverResult::from_parts("q", vec![chunk("a"), chunk("b")], vec![0.9, 0.8]).unwrap();
        assert_eq!(ok.len(), ok.scores().len());
    }

    #[test]
    fn test_retriever_result_deserialization_is_checked() {
        let mismatched = r#"{"query_id":"q","retrieved_chunks":[],"scores":[1.0,0.5]}"#;
        assert!(serde_json::from_str::<RetrieverResult>(mismatched).is_err());

        let result = RetrieverResult::new("q", vec![(chunk("a"), 0.9), (chunk("b"), 0.4)]);
        let json = serde_json::to_string(&result).unwrap();
        let parsed: RetrieverResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_metadata_values_serialize_untagged() {
        let mut metadata = Metadata::new();
        metadata.insert("position".to_string(), 0i64.into());
        metadata.insert("lang".to_string(), "en".into());
        metadata.insert("draft".to_string(), false.into());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json, serde_json::json!({"position": 0, "lang": "en", "draft": false}));

        let back: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_data_source_serialization() {
        let json = serde_json::to_string(&DataSource::Database).unwrap();
        assert_eq!(json, "\"database\"");
        assert_eq!(DataSource::default(), DataSource::Text);
    }
}
