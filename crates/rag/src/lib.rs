//! In-memory retrieval-augmented generation.
//!
//! Documents are chunked, embedded and kept in an [`InMemoryStore`]; a
//! [`Retriever`] ranks chunks for a [`Query`] and a [`Generator`] turns the
//! ranked context into an answer. [`RagPipeline`] wires the stages together.

pub mod chunker;
pub mod embeddings;
pub mod filter;
pub mod generator;
pub mod pipeline;
pub mod retriever;
pub mod store;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::{Chunker, TextChunker, TextSpan};
pub use embeddings::{create_provider, EmbeddingProvider, TrigramProvider};
pub use filter::SearchFilters;
pub use generator::{AnswerStream, Generator, LlmGenerator, PredefinedGenerator, PromptTemplate};
pub use pipeline::{IngestRequest, IngestSummary, QueryStream, RagPipeline, RagPipelineBuilder};
pub use retriever::{PredefinedRetriever, Retriever, StoreRetriever};
pub use store::{DocumentStore, InMemoryStore, StoreStats, VectorStore};
pub use types::{
    Chunk, DataSource, Document, GeneratorContext, GeneratorResponse, Metadata, MetadataValue,
    Query, RetrievalMode, RetrieverResult,
};
pub use vector_index::{FlatIndex, SimilarityMetric, VectorIndex};
