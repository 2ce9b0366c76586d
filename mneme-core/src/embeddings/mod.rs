//! Embedding provider implementations for generating text embeddings.

pub mod cache;
pub mod factory;
pub mod providers;
pub mod retry;

pub use cache::{CacheStats, CachedEmbeddings};
pub use factory::EmbeddingProviderFactory;
pub use providers::{EmbeddingProvider, HashingEmbeddings, OpenAIEmbeddings};

#[cfg(feature = "embeddings-local")]
pub use providers::LocalEmbeddings;
