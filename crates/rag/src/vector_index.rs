//! Vector index abstraction for chunk embeddings.
//!
//! The index only knows chunk ids and vectors; the store that owns it keeps
//! the chunks themselves. Entries stay in insertion order so that equal
//! scores rank the earlier-inserted chunk first.

use ragpipe_core::{AppError, AppResult};
use std::collections::HashMap;

/// How two embeddings are compared. Higher is always more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    /// Raw inner product
    Dot,
    /// `1 / (1 + distance)`
    Euclidean,
}

impl SimilarityMetric {
    /// Parse metric from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(Self::Cosine),
            "dot" => Some(Self::Dot),
            "euclidean" => Some(Self::Euclidean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclidean => "euclidean",
        }
    }

    /// Score two equal-length vectors.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Dot => dot(a, b),
            Self::Euclidean => {
                let distance = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; zero when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Upserting ids with embeddings
/// - Searching for similar vectors (top-k)
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored and query vector must have.
    fn dimension(&self) -> usize;

    fn metric(&self) -> SimilarityMetric;

    /// Insert or replace the vector for `id`. A replaced id keeps its slot.
    fn upsert(&mut self, id: &str, embedding: Vec<f32>) -> AppResult<()>;

    /// Remove `id`; returns whether it was present.
    fn remove(&mut self, id: &str) -> bool;

    /// Search for the top-k ids most similar to `query`, skipping ids that
    /// `accept` rejects.
    ///
    /// Returns ids ordered by descending similarity score.
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        accept: &dyn Fn(&str) -> bool,
    ) -> AppResult<Vec<(String, f32)>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive in-memory index.
#[derive(Debug)]
pub struct FlatIndex {
    dimension: usize,
    metric: SimilarityMetric,
    entries: Vec<(String, Vec<f32>)>,
    positions: HashMap<String, usize>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: SimilarityMetric) -> AppResult<Self> {
        if dimension == 0 {
            return Err(AppError::Config(
                "Index dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            metric,
            entries: Vec::new(),
            positions: HashMap::new(),
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    fn upsert(&mut self, id: &str, embedding: Vec<f32>) -> AppResult<()> {
        self.check_dimension(&embedding)?;

        match self.positions.get(id) {
            Some(&pos) => self.entries[pos].1 = embedding,
            None => {
                self.positions.insert(id.to_string(), self.entries.len());
                self.entries.push((id.to_string(), embedding));
            }
        }
        Ok(())
    }

    fn remove(&mut self, id: &str) -> bool {
        let Some(pos) = self.positions.remove(id) else {
            return false;
        };
        self.entries.remove(pos);
        for (entry_id, _) in &self.entries[pos..] {
            if let Some(p) = self.positions.get_mut(entry_id) {
                *p -= 1;
            }
        }
        true
    }

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        accept: &dyn Fn(&str) -> bool,
    ) -> AppResult<Vec<(String, f32)>> {
        self.check_dimension(query)?;

        let mut scored: Vec<(String, f32)> = self
            .entries
            .iter()
            .filter(|(id, _)| accept(id))
            .map(|(id, vector)| (id.clone(), self.metric.score(query, vector)))
            .collect();

        // Stable sort keeps insertion order for equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
