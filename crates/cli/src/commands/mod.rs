//! Command handlers for the ragpipe CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod ingest;
mod sources;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use ingest::IngestCommand;
