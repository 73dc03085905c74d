//! Retrieval over a [`VectorStore`].
//!
//! [`StoreRetriever`] implements all four retrieval modes against a store and
//! an embedding provider. Whatever the mode, results come back ranked by
//! descending score with ties in store insertion order, and never hold more
//! than `top_k` chunks.

use crate::embeddings::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::{Chunk, Query, RetrievalMode, RetrieverResult};
use ragpipe_core::text::term_set;
use ragpipe_core::{AppError, AppResult};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Default weight of the vector score in hybrid mode.
pub const DEFAULT_HYBRID_ALPHA: f32 = 0.5;

/// Score multiplier for chunks reached from a seed through their document.
pub const GRAPH_NEIGHBOR_DECAY: f32 = 0.5;

/// Produces ranked context for a query.
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &Query) -> AppResult<RetrieverResult>;
}

/// Retriever backed by a vector store and an embedding provider.
pub struct StoreRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    hybrid_alpha: f32,
}

impl StoreRetriever {
    /// The embedder must produce vectors of the store's dimension.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if embedder.dimensions() != store.dimension() {
            return Err(AppError::Config(format!(
                "Embedding provider '{}' produces {} dimensions but the store expects {}",
                embedder.provider_name(),
                embedder.dimensions(),
                store.dimension()
            )));
        }

        Ok(Self {
            store,
            embedder,
            hybrid_alpha: DEFAULT_HYBRID_ALPHA,
        })
    }

    /// Weight of the vector score in hybrid mode, clamped to `0.0..=1.0`.
    pub fn with_hybrid_alpha(mut self, alpha: f32) -> Self {
        self.hybrid_alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(AppError::into_embedding_unavailable)?;

        if embedding.len() != self.store.dimension() {
            return Err(AppError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    async fn vector(&self, query: &Query) -> AppResult<Vec<(Chunk, f32)>> {
        let embedding = self.embed_query(&query.text).await?;
        self.store
            .search_scored(&embedding, query.top_k, query.filters.as_ref())
            .await
    }

    async fn naive(&self, query: &Query) -> AppResult<Vec<(Chunk, f32)>> {
        let terms = term_set(&query.text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.store.scan_chunks(query.filters.as_ref()).await?;
        Ok(chunks
            .into_iter()
            .filter_map(|chunk| {
                let score = lexical_score(&terms, &chunk.content);
                (score > 0.0).then_some((chunk, score))
            })
            .collect())
    }

    async fn hybrid(&self, query: &Query) -> AppResult<Vec<(Chunk, f32)>> {
        let embedding = self.embed_query(&query.text).await?;
        let terms = term_set(&query.text);
        let metric = self.store.metric();
        let alpha = self.hybrid_alpha;

        let chunks = self.store.scan_chunks(query.filters.as_ref()).await?;
        Ok(chunks
            .into_iter()
            .map(|chunk| {
                let vector_score = chunk
                    .embedding
                    .as_deref()
                    .map(|e| metric.score(&embedding, e))
                    .unwrap_or(0.0);
                let lexical = lexical_score(&terms, &chunk.content);
                let score = alpha * vector_score + (1.0 - alpha) * lexical;
                (chunk, score)
            })
            .collect())
    }

    async fn graph(&self, query: &Query) -> AppResult<Vec<(Chunk, f32)>> {
        let seeds = self.vector(query).await?;
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let mut seed_scores: HashMap<String, f32> = HashMap::new();
        let mut document_scores: HashMap<String, f32> = HashMap::new();
        for (chunk, score) in &seeds {
            seed_scores.insert(chunk.id.clone(), *score);
            let best = document_scores
                .entry(chunk.document_id.clone())
                .or_insert(*score);
            *best = best.max(*score);
        }

        // Walk document -> chunk edges; scanning keeps insertion order for ties
        let chunks = self.store.scan_chunks(query.filters.as_ref()).await?;
        Ok(chunks
            .into_iter()
            .filter_map(|chunk| {
                let own = seed_scores.get(&chunk.id).copied();
                let neighbor = document_scores
                    .get(&chunk.document_id)
                    .map(|s| s * GRAPH_NEIGHBOR_DECAY);
                let score = match (own, neighbor) {
                    (Some(a), Some(b)) => a.max(b),
                    (a, b) => a.or(b)?,
                };
                Some((chunk, score))
            })
            .collect())
    }
}

/// Fraction of distinct query terms that occur in `content`.
fn lexical_score(terms: &BTreeSet<String>, content: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let found = term_set(content).intersection(terms).count();
    found as f32 / terms.len() as f32
}

/// Apply the query filters, rank, and cut to `top_k`.
fn finish(query: &Query, scored: Vec<(Chunk, f32)>) -> RetrieverResult {
    let mut scored = match query.filters.as_ref() {
        Some(filters) if filters.has_filters() => filters.apply(scored),
        _ => scored,
    };
    // Stable: equal scores keep insertion order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(query.top_k);
    RetrieverResult::new(query.id.clone(), scored)
}

#[async_trait::async_trait]
impl Retriever for StoreRetriever {
    async fn retrieve(&self, query: &Query) -> AppResult<RetrieverResult> {
        query.validate()?;

        let stats = self.store.stats().await?;
        if stats.chunks == 0 {
            tracing::debug!("Store is empty, nothing to retrieve for query {}", query.id);
            return Ok(RetrieverResult::empty(query.id.clone()));
        }

        // Vector and graph ranking start from the index alone
        if matches!(query.mode, RetrievalMode::Vector | RetrievalMode::Graph)
            && stats.indexed_chunks == 0
        {
            tracing::debug!("Index is empty, nothing to retrieve for query {}", query.id);
            return Ok(RetrieverResult::empty(query.id.clone()));
        }

        let scored = match query.mode {
            RetrievalMode::Vector => self.vector(query).await?,
            RetrievalMode::Naive => self.naive(query).await?,
            RetrievalMode::Hybrid => self.hybrid(query).await?,
            RetrievalMode::Graph => self.graph(query).await?,
        };

        let result = finish(query, scored);
        tracing::info!(
            "Retrieved {} chunks for query {} (mode: {}, top_k: {})",
            result.len(),
            query.id,
            query.mode.as_str(),
            query.top_k
        );
        Ok(result)
    }
}

/// Answers selected queries from a fixed table, delegating the rest.
///
/// Matches on exact query text. Intended for tests and debugging sessions
/// that need deterministic context.
pub struct PredefinedRetriever<R> {
    inner: R,
    results: HashMap<String, Vec<Chunk>>,
}

impl<R: Retriever> PredefinedRetriever<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            results: HashMap::new(),
        }
    }

    /// Return `chunks` (in this order) whenever the query text is `text`.
    pub fn with_result(mut self, text: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        self.results.insert(text.into(), chunks);
        self
    }
}

#[async_trait::async_trait]
impl<R: Retriever> Retriever for PredefinedRetriever<R> {
    async fn retrieve(&self, query: &Query) -> AppResult<RetrieverResult> {
        query.validate()?;

        match self.results.get(&query.text) {
            Some(chunks) => {
                tracing::debug!("Using predefined context for query {}", query.id);
                let ranked = chunks
                    .iter()
                    .take(query.top_k)
                    .map(|chunk| (chunk.clone(), 1.0))
                    .collect();
                Ok(RetrieverResult::new(query.id.clone(), ranked))
            }
            None => self.inner.retrieve(query).await,
        }
    }
}
