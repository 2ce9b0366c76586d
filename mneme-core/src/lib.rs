//! # Mneme - Associative Memory That Forgets
//!
//! Mneme gives a stateless conversational service a per-user memory that
//! behaves like a biological one:
//! - Every fact decays exponentially unless it is reinforced by access
//! - Near-duplicate facts are merged into the existing memory instead of stored twice
//! - Queries rank by current strength, never returning forgotten facts
//! - Cold memories are removed from both the record store and the vector index
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mneme_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MnemeConfig::load()?;
//!     let memory = MemoryOrchestrator::builder()
//!         .embeddings(EmbeddingProviderFactory::create(&config.embeddings)?)
//!         .index(Arc::new(InMemoryVectorIndex::new()))
//!         .config(config)
//!         .build()?;
//!
//!     memory.add("alice", "Alice prefers green tea", Metadata::new()).await?;
//!     let recalled = memory.query("alice", "what does Alice drink?", 5).await?;
//!     println!("{}", render_memory_context(&recalled, &memory.config().context));
//!
//!     memory.cleanup(None).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Lifecycle**: pure decay model and the decay-then-boost access protocol
//! - **Clustering**: cosine-similarity merge decision
//! - **Memory store**: authoritative records, per-owner indexed
//! - **Orchestrator**: write-through add/query/stats/cleanup over an
//!   embedding provider and a vector index
//!
//! ## Feature Flags
//!
//! - `embeddings-local`: in-process fastembed models

pub mod clock;
pub mod clustering;
pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod events;
pub mod index;
pub mod lifecycle;
pub mod memory;
pub mod orchestrator;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::clustering::{ClusteringSuppressor, Decision, cosine_similarity};
    pub use crate::config::{
        ClusteringConfig, ContextConfig, EmbeddingProviderKind, EmbeddingsConfig, MemoryConfig,
        MnemeConfig,
    };
    pub use crate::context::{format_elapsed, render_memory_context};
    pub use crate::embeddings::{
        CachedEmbeddings, EmbeddingProvider, EmbeddingProviderFactory, HashingEmbeddings,
        OpenAIEmbeddings,
    };
    pub use crate::error::{MnemeError, Result};
    pub use crate::events::{HookRegistry, LoggingHook, MemoryHook};
    pub use crate::index::{InMemoryVectorIndex, IndexEntry, IndexHit, VectorIndex};
    pub use crate::lifecycle::{DecayModel, StrengthTier};
    pub use crate::memory::{MemoryRecord, MemoryStore, Metadata};
    pub use crate::orchestrator::{
        AddOutcome, AddStatus, CleanupReport, HealthReport, MemoryOrchestrator,
        MemoryOrchestratorBuilder, MemoryStats, REINFORCED_AT_KEY, REINFORCEMENT_COUNT_KEY,
        RESERVED_METADATA_KEYS, RecalledMemory,
    };

    #[cfg(feature = "embeddings-local")]
    pub use crate::embeddings::LocalEmbeddings;
}
