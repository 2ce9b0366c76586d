//! Local embedding provider using fastembed

use async_trait::async_trait;
use std::sync::Mutex;

use super::EmbeddingProvider;
use crate::error::{MnemeError, Result};

/// Local embedding provider using fastembed (runs locally, no API needed).
pub struct LocalEmbeddings {
    model: Mutex<fastembed::TextEmbedding>,
    dimension: usize,
}

impl std::fmt::Debug for LocalEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbeddings")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    use fastembed::EmbeddingModel;

    let resolved = match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "all_minilm_l6_v2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "all-minilm-l12-v2" | "all_minilm_l12_v2" => (EmbeddingModel::AllMiniLML12V2, 384),
        "bge-small-en-v1.5" | "bge_small_en_v15" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" | "bge_base_en_v15" => (EmbeddingModel::BGEBaseENV15, 768),
        "bge-large-en-v1.5" | "bge_large_en_v15" => (EmbeddingModel::BGELargeENV15, 1024),
        "multilingual-e5-small" => (EmbeddingModel::MultilingualE5Small, 384),
        "multilingual-e5-base" => (EmbeddingModel::MultilingualE5Base, 768),
        "multilingual-e5-large" => (EmbeddingModel::MultilingualE5Large, 1024),
        _ => {
            return Err(MnemeError::Configuration(format!(
                "Unsupported local embedding model '{}'",
                name
            )));
        }
    };
    Ok(resolved)
}

impl LocalEmbeddings {
    /// Load the named model (e.g. `all-MiniLM-L6-v2`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the model is unknown or cannot be loaded.
    pub fn new(model_name: impl Into<String>) -> Result<Self> {
        let model_name = model_name.into();
        let (embedding_model, dimension) = resolve_model(&model_name)?;

        // InitOptions is non-exhaustive
        let mut init_options = fastembed::InitOptions::default();
        init_options.model_name = embedding_model;

        let model = fastembed::TextEmbedding::try_new(init_options).map_err(|e| {
            MnemeError::Configuration(format!(
                "Failed to load embedding model '{}': {}",
                model_name, e
            ))
        })?;

        tracing::info!(model = %model_name, dimension, "Loaded local embedding model");

        Ok(Self {
            model: Mutex::new(model),
            dimension,
        })
    }

    fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|e| MnemeError::Embedding(format!("embedding model lock poisoned: {}", e)))?;
        model
            .embed(texts, None)
            .map_err(|e| MnemeError::Embedding(format!("Failed to generate embedding: {}", e)))
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| MnemeError::Embedding("model returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.run(texts.iter().map(|s| s.to_string()).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "local"
    }
}
