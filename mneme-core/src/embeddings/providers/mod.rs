//! Embedding provider implementations

use crate::error::Result;
use async_trait::async_trait;

pub mod hashing;
pub mod openai;

#[cfg(feature = "embeddings-local")]
pub mod local;

pub use hashing::HashingEmbeddings;
pub use openai::OpenAIEmbeddings;

#[cfg(feature = "embeddings-local")]
pub use local::LocalEmbeddings;

/// Trait for embedding provider implementations.
///
/// Embedding providers turn text into fixed-length vectors. Identical text
/// must yield vectors with cosine self-similarity 1.0, or duplicate
/// suppression stops working.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns [`MnemeError::Embedding`](crate::error::MnemeError::Embedding)
    /// when the upstream model or service fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts, one per input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Default implementation: embed each text sequentially
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;

    /// Provider name for diagnostics
    fn name(&self) -> &str;
}

/// Scale `vector` to unit length in place; zero vectors are left alone
pub(crate) fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
