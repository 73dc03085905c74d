//! Error types for ragpipe.
//!
//! One enum covers the whole pipeline: lookups, vector dimensions, the two
//! external collaborators (embedder and language model), query validation,
//! plus configuration and I/O concerns of the surrounding tooling.

use thiserror::Error;

/// Unified error type for the ragpipe crates.
///
/// Every fallible operation returns `Result<T, AppError>`. Errors are
/// propagated to the orchestrator's caller and never swallowed.
#[derive(Error, Debug)]
pub enum AppError {
    /// A single-entity fetch found nothing for the identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// An embedding length differs from the index's configured dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding collaborator failed during retrieval
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The language-model collaborator failed during generation
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// Query rejected before retrieval (zero top_k, blank text)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Malformed input to a store or result constructor
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Re-tag a collaborator failure as `EmbeddingUnavailable`.
    ///
    /// Errors that already carry a pipeline meaning (dimension mismatch,
    /// embedding unavailable) pass through unchanged.
    pub fn into_embedding_unavailable(self) -> Self {
        match self {
            AppError::EmbeddingUnavailable(_) | AppError::DimensionMismatch { .. } => self,
            other => AppError::EmbeddingUnavailable(other.to_string()),
        }
    }

    /// Re-tag a collaborator failure as `GenerationUnavailable`.
    pub fn into_generation_unavailable(self) -> Self {
        match self {
            AppError::GenerationUnavailable(_) => self,
            other => AppError::GenerationUnavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = AppError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 3"
        );
    }

    #[test]
    fn test_into_embedding_unavailable_wraps_other_errors() {
        let err = AppError::Other("socket closed".to_string()).into_embedding_unavailable();
        assert!(matches!(err, AppError::EmbeddingUnavailable(ref msg) if msg == "socket closed"));

        let kept = AppError::DimensionMismatch {
            expected: 4,
            actual: 2,
        }
        .into_embedding_unavailable();
        assert!(matches!(kept, AppError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_into_generation_unavailable_is_idempotent() {
        let err = AppError::GenerationUnavailable("model offline".to_string())
            .into_generation_unavailable();
        assert_eq!(err.to_string(), "Generation unavailable: model offline");
    }
}
