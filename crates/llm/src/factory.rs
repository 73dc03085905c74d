//! Language-model provider factory.
//!
//! Resolves a provider name from configuration to a client instance.

use crate::client::LlmClient;
use crate::providers::ExtractiveClient;
use ragpipe_core::{AppError, AppResult};
use std::sync::Arc;

/// Create a language-model client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("extractive")
///
/// # Errors
/// Returns `AppError::Config` for an unknown provider.
pub fn create_client(provider: &str) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "extractive" => {
            tracing::debug!("Creating extractive language-model client");
            Ok(Arc::new(ExtractiveClient::new()))
        }
        _ => Err(AppError::Config(format!(
            "Unknown LLM provider: '{}'. Supported providers: extractive",
            provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_extractive_client() {
        let client = create_client("extractive").unwrap();
        assert_eq!(client.provider_name(), "extractive");
    }

    #[test]
    fn test_provider_name_is_case_insensitive() {
        assert!(create_client("Extractive").is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown") {
            Err(err) => assert!(err.to_string().contains("Unknown LLM provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
