//! Deterministic feature-hashing embeddings
//!
//! Every lowercase word and adjacent word pair is hashed with SHA-256 into a
//! signed bucket of a fixed-size vector, which is then L2-normalised. Texts
//! sharing most of their words land close together, identical texts are
//! identical vectors. No model download or network access is needed.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{EmbeddingProvider, normalize};
use crate::error::{MnemeError, Result};

/// Feature-hashing embedding provider
#[derive(Debug, Clone)]
pub struct HashingEmbeddings {
    dimension: usize,
}

impl HashingEmbeddings {
    /// Create a provider producing vectors of `dimension` floats.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dimension` is zero.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MnemeError::Configuration(
                "hashing embeddings need a non-zero dimension".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        // Text with no word characters still gets a stable, non-zero vector
        if tokens.is_empty() {
            self.add_feature(&mut vector, text, 1.0);
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
