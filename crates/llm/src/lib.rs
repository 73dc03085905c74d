//! Language-model collaborator crate for ragpipe.
//!
//! Defines the provider-agnostic `LlmClient` trait the generator talks to,
//! the request/response/stream types, fragment splitting for full-then-chunk
//! streaming, and a deterministic extractive provider.
//!
//! # Example
//! ```no_run
//! use ragpipe_llm::{ContextPassage, ExtractiveClient, LlmClient, LlmRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ExtractiveClient::new();
//! let request = LlmRequest::new("What color is the sky?", "extractive-v1")
//!     .with_passages(vec![ContextPassage::new("D1-0", "The sky is blue.")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod fragments;
pub mod providers;

// Re-export main types
pub use client::{
    ContextPassage, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
pub use factory::create_client;
pub use fragments::split_fragments;
pub use providers::ExtractiveClient;
