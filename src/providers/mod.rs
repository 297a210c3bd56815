//! Provider module for MetaRetrieval
//!
//! This module contains the completion endpoint abstraction, the HTTP
//! client implementing it, and the model registry.

pub mod base;
pub mod http;
pub mod registry;

pub use base::{
    ChatMessage, Completion, CompletionProvider, CompletionRequest, Role, SamplingParams,
};
pub use http::HttpCompletionClient;
pub use registry::ModelRegistry;

use crate::config::Config;
use crate::error::Result;

/// Create the completion provider described by the configuration
///
/// # Errors
///
/// Returns error if the API key is missing or the HTTP client cannot be
/// initialized
pub fn create_provider(config: &Config) -> Result<Box<dyn CompletionProvider>> {
    Ok(Box::new(HttpCompletionClient::from_config(&config.endpoint)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_requires_api_key() {
        let mut config = Config::default();
        config.endpoint.api_key = None;
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_create_provider_with_api_key() {
        let mut config = Config::default();
        config.endpoint.api_key = Some("secret".to_string());
        assert!(create_provider(&config).is_ok());
    }
}
