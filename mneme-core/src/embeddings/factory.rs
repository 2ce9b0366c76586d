//! Factory for creating embedding providers from configuration

use std::sync::Arc;

use crate::config::{EmbeddingProviderKind, EmbeddingsConfig};
use crate::embeddings::cache::CachedEmbeddings;
use crate::embeddings::providers::{EmbeddingProvider, HashingEmbeddings, OpenAIEmbeddings};
use crate::embeddings::retry::RetryConfig;
use crate::error::{MnemeError, Result};

#[cfg(feature = "embeddings-local")]
use crate::embeddings::providers::LocalEmbeddings;

/// Factory for creating embedding providers
pub struct EmbeddingProviderFactory;

impl EmbeddingProviderFactory {
    /// Create an embedding provider from configuration.
    ///
    /// The provider is wrapped in a [`CachedEmbeddings`] unless
    /// `cache_capacity` is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be created, e.g. a missing
    /// OpenAI API key or the `embeddings-local` feature being disabled.
    pub fn create(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let retry = Self::retry_config(config);

        match config.provider {
            EmbeddingProviderKind::Hashing => {
                Ok(Self::wrap(HashingEmbeddings::new(config.dimension)?, config))
            }

            #[cfg(feature = "embeddings-local")]
            EmbeddingProviderKind::Local => {
                Ok(Self::wrap(LocalEmbeddings::new(config.model.clone())?, config))
            }

            #[cfg(not(feature = "embeddings-local"))]
            EmbeddingProviderKind::Local => Err(MnemeError::Configuration(
                "Local embeddings require 'embeddings-local' feature".to_string(),
            )),

            EmbeddingProviderKind::OpenAI => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| {
                        MnemeError::Configuration(
                            "OpenAI embeddings need embeddings.api_key or OPENAI_API_KEY"
                                .to_string(),
                        )
                    })?;
                let mut provider = OpenAIEmbeddings::new(
                    api_key,
                    config.model.clone(),
                    config.dimension,
                    config.timeout,
                )?
                .with_retry(retry);
                if let Some(base_url) = &config.base_url {
                    provider = provider.with_base_url(base_url.clone());
                }
                Ok(Self::wrap(provider, config))
            }

            EmbeddingProviderKind::Ollama => {
                let mut provider =
                    OpenAIEmbeddings::ollama(config.model.clone(), config.dimension, config.timeout)?
                        .with_retry(retry);
                if let Some(base_url) = &config.base_url {
                    provider = provider.with_base_url(base_url.clone());
                }
                Ok(Self::wrap(provider, config))
            }
        }
    }

    /// One initial attempt plus `max_retries` retries
    fn retry_config(config: &EmbeddingsConfig) -> RetryConfig {
        RetryConfig::default().with_max_attempts(config.max_retries.saturating_add(1))
    }

    fn wrap<P: EmbeddingProvider + 'static>(
        provider: P,
        config: &EmbeddingsConfig,
    ) -> Arc<dyn EmbeddingProvider> {
        tracing::debug!(
            provider = provider.name(),
            dimension = provider.dimension(),
            cache_capacity = config.cache_capacity,
            "Created embedding provider"
        );
        if config.cache_capacity == 0 {
            Arc::new(provider)
        } else {
            Arc::new(CachedEmbeddings::new(provider, config.cache_capacity))
        }
    }
}
