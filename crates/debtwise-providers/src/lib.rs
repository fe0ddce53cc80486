//! # DebtWise Providers
//!
//! Embedding and text-generation capabilities for DebtWise.
//!
//! All remote providers (OpenAI, Groq, Ollama, Together, ...) are handled by a
//! single `OpenAiCompatibleProvider`. The `HashingEmbedder` runs locally.

pub mod hashing;
pub mod openai_compatible;
pub mod provider_registry;

use debtwise_core::config::{EmbeddingConfig, LlmConfig};
use debtwise_core::error::{DebtWiseError, Result};
use debtwise_core::traits::{Embedder, Provider};
use std::sync::Arc;

use hashing::{DEFAULT_HASHING_DIMENSIONS, HashingEmbedder};
use openai_compatible::OpenAiCompatibleProvider;

/// Create the embedding capability from configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(
            config.dimensions.unwrap_or(DEFAULT_HASHING_DIMENSIONS),
        )?)),

        other if other.starts_with("custom:") => Ok(Arc::new(
            OpenAiCompatibleProvider::custom(other, &config.api_key, config.timeout_secs)?
                .with_embedding_model(&config.model, config.dimensions),
        )),

        name => {
            let registry = provider_registry::get_provider_config(name)
                .ok_or_else(|| unknown_provider(name))?;
            if !registry.supports_embeddings() {
                return Err(DebtWiseError::Config(format!(
                    "provider '{name}' does not offer an embeddings endpoint"
                )));
            }
            Ok(Arc::new(
                OpenAiCompatibleProvider::from_registry(
                    registry,
                    &config.endpoint,
                    &config.api_key,
                    config.timeout_secs,
                )?
                .with_embedding_model(&config.model, config.dimensions),
            ))
        }
    }
}

/// Create the text-generation capability from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn Provider>> {
    let name = config.provider.as_str();
    if name.starts_with("custom:") {
        return Ok(Arc::new(OpenAiCompatibleProvider::custom(
            name,
            &config.api_key,
            config.timeout_secs,
        )?));
    }
    let registry = provider_registry::get_provider_config(name)
        .ok_or_else(|| unknown_provider(name))?;
    Ok(Arc::new(OpenAiCompatibleProvider::from_registry(
        registry,
        &config.endpoint,
        &config.api_key,
        config.timeout_secs,
    )?))
}

fn unknown_provider(name: &str) -> DebtWiseError {
    DebtWiseError::ProviderNotFound(format!(
        "{name} (available: {})",
        available_providers().join(", ")
    ))
}

/// List all available provider names.
pub fn available_providers() -> Vec<&'static str> {
    let mut names = provider_registry::all_provider_names();
    names.push("hashing");
    names.push("custom");
    names
}
