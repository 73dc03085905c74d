//! ragpipe core library
//!
//! Foundational utilities shared by every ragpipe crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Layered configuration
//! - Text term extraction used by lexical scoring and hashing embedders

pub mod config;
pub mod error;
pub mod logging;
pub mod text;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
