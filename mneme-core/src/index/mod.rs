//! Vector index abstraction
//!
//! The index holds a denormalized copy of each memory (vector, content,
//! metadata) for similarity search. It is namespaced by owner and offers no
//! cross-id transactions; keeping it in sync with the
//! [`MemoryStore`](crate::memory::MemoryStore) is the orchestrator's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::Metadata;

pub mod inmemory;

pub use inmemory::InMemoryVectorIndex;

/// One stored index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Memory id
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Memory content
    pub text: String,
    /// Entry metadata
    #[serde(default)]
    pub metadata: Metadata,
}

/// One similarity search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHit {
    /// Memory id
    pub id: String,
    /// Memory content
    pub text: String,
    /// Entry metadata
    pub metadata: Metadata,
    /// Distance from the query vector; smaller is closer
    pub distance: f64,
}

/// Owner-namespaced vector storage
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace an entry
    async fn upsert(
        &self,
        owner: &str,
        id: &str,
        vector: &[f32],
        text: &str,
        metadata: Metadata,
    ) -> Result<()>;

    /// Nearest `k` entries of `owner`, ascending by distance
    async fn query(&self, owner: &str, vector: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Merge `metadata` into an existing entry.
    ///
    /// `None` leaves the entry untouched but still fails for a missing id.
    async fn update(&self, owner: &str, id: &str, metadata: Option<Metadata>) -> Result<()>;

    /// Remove an entry; removing a missing entry succeeds
    async fn delete(&self, owner: &str, id: &str) -> Result<()>;

    /// Fetch an entry
    async fn get(&self, owner: &str, id: &str) -> Result<Option<IndexEntry>>;

    /// Number of entries stored for `owner`
    async fn count(&self, owner: &str) -> Result<usize>;

    /// Check that the index is reachable
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Backend name for diagnostics
    fn name(&self) -> &str;
}
