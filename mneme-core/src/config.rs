//! Configuration types for the memory engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MnemeError, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MnemeConfig {
    /// Decay and reinforcement parameters
    pub memory: MemoryConfig,

    /// Duplicate suppression parameters
    pub clustering: ClusteringConfig,

    /// Embedding provider selection
    pub embeddings: EmbeddingsConfig,

    /// Prompt context rendering
    pub context: ContextConfig,
}

/// Decay and reinforcement configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exponential decay constant, per `decay_unit`
    pub decay_rate: f64,

    /// Unit in which elapsed time is measured
    #[serde(with = "humantime_serde")]
    pub decay_unit: Duration,

    /// Strength below which a memory is forgotten
    pub forgetting_threshold: f64,

    /// Strength of a freshly inserted memory
    pub initial_strength: f64,

    /// Boost applied on direct access
    pub access_boost: f64,

    /// Boost applied when a memory is surfaced by a query
    pub query_boost: f64,

    /// Query over-fetch factor applied before filtering cold memories
    pub candidate_multiplier: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.1,
            decay_unit: Duration::from_secs(1),
            forgetting_threshold: 0.01,
            initial_strength: 1.0,
            access_boost: 0.3,
            query_boost: 0.1,
            candidate_multiplier: 2,
        }
    }
}

/// Duplicate suppression configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Cosine similarity at or above which a new memory merges into an existing one
    pub similarity_threshold: f64,

    /// Merge boost per unit of similarity
    pub boost_base: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            boost_base: 0.3,
        }
    }
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature hashing, no model required
    #[default]
    Hashing,
    /// fastembed model running in-process
    Local,
    /// OpenAI embeddings API
    OpenAI,
    /// Ollama's OpenAI-compatible endpoint
    Ollama,
}

/// Embeddings configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Provider type
    pub provider: EmbeddingProviderKind,

    /// Model name
    pub model: String,

    /// Output dimension
    pub dimension: usize,

    /// API key (if needed, prefer env vars)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for custom endpoints, e.g., Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Number of embeddings kept in the content cache (0 disables it)
    pub cache_capacity: usize,

    /// Per-request timeout for remote providers
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Retries after a failed request to a remote provider; 0 disables retrying
    pub max_retries: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: 384,
            api_key: None,
            base_url: None,
            cache_capacity: 1024,
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Prompt context rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum memories rendered into one context block
    pub max_items: usize,

    /// Strength strictly above which a memory is shown as hot
    pub hot_threshold: f64,

    /// Strength strictly above which a memory is shown as warm
    pub warm_threshold: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_items: 5,
            hot_threshold: 0.7,
            warm_threshold: 0.3,
        }
    }
}

impl MnemeConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `mneme.toml` in the working directory
    /// 3. File named by `MNEME_CONFIG_PATH`
    /// 4. `MNEME_` environment variables, `__` separating sections
    ///    (e.g. `MNEME_MEMORY__DECAY_RATE=0.05`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or the merged
    /// values fail validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(MnemeConfig::default()))
            .merge(Toml::file("mneme.toml"));

        if let Ok(path) = std::env::var("MNEME_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: MnemeConfig = figment
            .merge(Env::prefixed("MNEME_").ignore(&["config_path"]).split("__"))
            .extract()
            .map_err(|e| {
                MnemeError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: MnemeConfig = Figment::from(Serialized::defaults(MnemeConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                MnemeError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let memory = &self.memory;
        if !memory.decay_rate.is_finite() || memory.decay_rate < 0.0 {
            return Err(invalid("memory.decay_rate must be a finite value >= 0"));
        }
        if memory.decay_unit.is_zero() {
            return Err(invalid("memory.decay_unit must be non-zero"));
        }
        check_unit_interval("memory.forgetting_threshold", memory.forgetting_threshold)?;
        check_unit_interval("memory.initial_strength", memory.initial_strength)?;
        check_non_negative("memory.access_boost", memory.access_boost)?;
        check_non_negative("memory.query_boost", memory.query_boost)?;
        if memory.candidate_multiplier == 0 {
            return Err(invalid("memory.candidate_multiplier must be at least 1"));
        }

        check_unit_interval(
            "clustering.similarity_threshold",
            self.clustering.similarity_threshold,
        )?;
        check_non_negative("clustering.boost_base", self.clustering.boost_base)?;

        if self.embeddings.dimension == 0 {
            return Err(invalid("embeddings.dimension must be non-zero"));
        }

        check_unit_interval("context.hot_threshold", self.context.hot_threshold)?;
        check_unit_interval("context.warm_threshold", self.context.warm_threshold)?;
        if self.context.warm_threshold > self.context.hot_threshold {
            return Err(invalid(
                "context.warm_threshold must not exceed context.hot_threshold",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> MnemeError {
    MnemeError::Configuration(message.to_string())
}

fn check_unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MnemeError::Configuration(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MnemeError::Configuration(format!(
            "{} must be a finite value >= 0, got {}",
            field, value
        )))
    }
}
