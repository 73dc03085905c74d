//! Embedding providers.
//!
//! Turning text into vectors is an external concern; the pipeline only talks
//! to the [`EmbeddingProvider`] trait. A deterministic trigram hashing
//! provider ships for offline use and tests.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::TrigramProvider;
