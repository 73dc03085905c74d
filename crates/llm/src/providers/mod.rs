//! Bundled language-model providers.

pub mod extractive;

pub use extractive::ExtractiveClient;
