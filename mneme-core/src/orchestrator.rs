//! Memory orchestrator
//!
//! Composes an [`EmbeddingProvider`], a [`VectorIndex`], the
//! [`ClusteringSuppressor`] and the [`MemoryStore`] into the four engine
//! operations: add, query, stats and cleanup.
//!
//! The store and the index are written through together. The orchestrator
//! is the only component that touches both, and it rolls the store back when
//! an insert cannot be mirrored into the index.
//!
//! Every read-modify-write sequence for an owner runs under that owner's
//! async mutex, so concurrent adds for the same owner deduplicate against
//! each other and cleanup never races a reinforcement. Embedding calls
//! happen before the lock is taken.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::clustering::{Candidate, ClusteringSuppressor, Decision};
use crate::config::MnemeConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{MnemeError, Result};
use crate::events::{HookRegistry, MemoryHook};
use crate::index::{IndexEntry, VectorIndex};
use crate::lifecycle::DecayModel;
use crate::memory::{MemoryRecord, MemoryStore, Metadata};

/// Index metadata key counting merges into a memory
pub const REINFORCEMENT_COUNT_KEY: &str = "reinforcement_count";

/// Index metadata key holding the last merge time (RFC 3339)
pub const REINFORCED_AT_KEY: &str = "reinforced_at";

/// Index metadata keys written by the engine; `add` rejects caller metadata using them
pub const RESERVED_METADATA_KEYS: &[&str] = &[
    "strength",
    "created_at",
    REINFORCEMENT_COUNT_KEY,
    REINFORCED_AT_KEY,
    "access_count",
    "last_accessed_at",
];

/// Whether an add created a memory or reinforced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddStatus {
    /// A new memory was stored
    Added,
    /// An existing near-duplicate was reinforced instead
    Merged,
}

/// Result of [`MemoryOrchestrator::add`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOutcome {
    /// Id of the stored or reinforced memory
    pub id: String,
    /// What happened
    pub status: AddStatus,
    /// Similarity with the reinforced memory, for merges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// One memory returned by [`MemoryOrchestrator::query`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalledMemory {
    /// Memory id
    pub id: String,
    /// Memory content
    pub content: String,
    /// Strength after the recall boost
    pub strength: f64,
    /// Index metadata
    pub metadata: Metadata,
    /// Vector distance from the query
    pub distance: f64,
    /// When the memory was stored
    pub created_at: DateTime<Utc>,
    /// When the memory was last accessed (this recall)
    pub last_accessed_at: DateTime<Utc>,
    /// Number of accesses including this recall
    pub access_count: u64,
}

/// Result of [`MemoryOrchestrator::stats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Memories held for the owner
    pub total: usize,
    /// Memories at or above the forgetting threshold
    pub hot: usize,
    /// Memories below the forgetting threshold
    pub cold: usize,
    /// Mean current strength, 0 when there are no memories
    pub mean_strength: f64,
}

/// Result of [`MemoryOrchestrator::cleanup`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Memories removed from the store
    pub removed_count: usize,
    /// Removed memories whose index entry could not be deleted
    pub failed_index_deletes: Vec<String>,
}

/// Result of [`MemoryOrchestrator::health`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Whether the vector index answered its health check
    pub index_healthy: bool,
    /// Vector index backend name
    pub index_backend: String,
    /// Embedding provider name
    pub embedding_provider: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Memories held across all owners
    pub total_memories: usize,
    /// Owners with at least one memory
    pub owners: usize,
}

/// Builder for [`MemoryOrchestrator`]
#[derive(Default)]
pub struct MemoryOrchestratorBuilder {
    config: MnemeConfig,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    clock: Option<Arc<dyn Clock>>,
    hooks: HookRegistry,
}

impl MemoryOrchestratorBuilder {
    /// Set the configuration
    pub fn config(mut self, config: MnemeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the embedding provider (required)
    pub fn embeddings(mut self, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Set the vector index (required)
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the time source; defaults to [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register a lifecycle hook
    pub fn hook(mut self, hook: Arc<dyn MemoryHook>) -> Self {
        self.hooks.register(hook);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the embedding provider or vector
    /// index is missing, or the configuration is invalid.
    pub fn build(self) -> Result<MemoryOrchestrator> {
        self.config.validate()?;

        let embeddings = self.embeddings.ok_or_else(|| {
            MnemeError::Configuration("an embedding provider is required".to_string())
        })?;
        let index = self
            .index
            .ok_or_else(|| MnemeError::Configuration("a vector index is required".to_string()))?;

        let store = MemoryStore::new(
            DecayModel::from(&self.config.memory),
            self.config.memory.forgetting_threshold,
        );

        Ok(MemoryOrchestrator {
            suppressor: ClusteringSuppressor::from(&self.config.clustering),
            config: self.config,
            store,
            embeddings,
            index,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            hooks: self.hooks,
            owner_locks: Mutex::new(HashMap::new()),
        })
    }
}

type OwnerLock = Arc<tokio::sync::Mutex<()>>;

/// Held owner lock; the map entry is dropped once no task holds or awaits it
struct OwnerGuard<'a> {
    locks: &'a Mutex<HashMap<String, OwnerLock>>,
    owner: String,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Waiters hold a clone, so a count of one means only the map remains
        if locks
            .get(&self.owner)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.owner);
        }
    }
}

/// Memory lifecycle engine
pub struct MemoryOrchestrator {
    config: MnemeConfig,
    store: MemoryStore,
    embeddings: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    suppressor: ClusteringSuppressor,
    clock: Arc<dyn Clock>,
    hooks: HookRegistry,
    owner_locks: Mutex<HashMap<String, OwnerLock>>,
}

impl std::fmt::Debug for MemoryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOrchestrator")
            .field("embeddings", &self.embeddings.name())
            .field("index", &self.index.name())
            .field("memories", &self.store.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl MemoryOrchestrator {
    /// Start building an orchestrator
    pub fn builder() -> MemoryOrchestratorBuilder {
        MemoryOrchestratorBuilder::default()
    }

    /// Active configuration
    pub fn config(&self) -> &MnemeConfig {
        &self.config
    }

    /// Authoritative record store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Vector index
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Time source
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Serialise mutations of `owner`'s memories until the guard drops
    async fn lock_owner(&self, owner: &str) -> OwnerGuard<'_> {
        let lock = {
            let mut locks = self.owner_locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(owner.to_string()).or_default().clone()
        };
        OwnerGuard {
            locks: &self.owner_locks,
            owner: owner.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embeddings.embed(text).await.map_err(|e| match e {
            MnemeError::Embedding(_) => e,
            other => MnemeError::Embedding(other.to_string()),
        })?;

        let expected = self.embeddings.dimension();
        if vector.len() != expected {
            return Err(MnemeError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Look up index entries for `ids`; lookup failures count as absent
    async fn index_entries(&self, owner: &str, ids: &[String]) -> HashMap<String, IndexEntry> {
        let lookups = join_all(ids.iter().map(|id| self.index.get(owner, id))).await;

        let mut entries = HashMap::with_capacity(ids.len());
        for (id, lookup) in ids.iter().zip(lookups) {
            match lookup {
                Ok(Some(entry)) => {
                    entries.insert(id.clone(), entry);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        owner = %owner,
                        memory_id = %id,
                        error = %e,
                        "Index lookup failed, excluding from candidates"
                    );
                }
            }
        }
        entries
    }

    /// Store `content` for `owner`, or reinforce a near-duplicate of it.
    ///
    /// # Errors
    ///
    /// - `Embedding` (retryable) or `DimensionMismatch` if the vector cannot
    ///   be produced; nothing is mutated.
    /// - `IndexWrite` if the new entry cannot be written to the index; the
    ///   store insert is rolled back.
    /// - `InvalidInput` for an empty owner or metadata using one of
    ///   [`RESERVED_METADATA_KEYS`].
    pub async fn add(&self, owner: &str, content: &str, metadata: Metadata) -> Result<AddOutcome> {
        if owner.is_empty() {
            return Err(MnemeError::InvalidInput("owner must not be empty".to_string()));
        }
        if let Some(key) = RESERVED_METADATA_KEYS
            .iter()
            .find(|key| metadata.contains_key(**key))
        {
            return Err(MnemeError::InvalidInput(format!(
                "metadata key '{}' is reserved",
                key
            )));
        }

        let vector = self.embed(content).await?;

        let prefetched_ids = self.store.ids_for_owner(owner);
        let mut entries = self.index_entries(owner, &prefetched_ids).await;

        let _guard = self.lock_owner(owner).await;

        // Only ids not yet confirmed in the index need another round trip:
        // ones added since the prefetch, or whose index write was in flight
        let current_ids = self.store.ids_for_owner(owner);
        let unconfirmed: Vec<String> = current_ids
            .iter()
            .filter(|id| !entries.contains_key(*id))
            .cloned()
            .collect();
        if !unconfirmed.is_empty() {
            entries.extend(self.index_entries(owner, &unconfirmed).await);
        }

        let mut candidates: Vec<(String, Vec<f32>)> = Vec::with_capacity(current_ids.len());
        for id in &current_ids {
            if !entries.contains_key(id) {
                tracing::warn!(
                    owner = %owner,
                    memory_id = %id,
                    "Memory present in store but missing from index"
                );
                continue;
            }
            if let Some(record) = self.store.get(id) {
                candidates.push((record.id, record.vector));
            }
        }

        let candidate_refs: Vec<Candidate<'_>> = candidates
            .iter()
            .map(|(id, vector)| Candidate {
                id: id.as_str(),
                vector: vector.as_slice(),
            })
            .collect();

        match self.suppressor.decide(&vector, &candidate_refs) {
            Decision::MergeInto { id, similarity } => {
                // The prefetched entry may predate a merge that finished
                // while this task waited for the lock
                let target = match self.index.get(owner, &id).await {
                    Ok(Some(entry)) => Some(entry),
                    Ok(None) => entries.remove(&id),
                    Err(e) => {
                        tracing::warn!(
                            owner = %owner,
                            memory_id = %id,
                            error = %e,
                            "Index lookup of merge target failed, using prefetched entry"
                        );
                        entries.remove(&id)
                    }
                };
                let previous = target
                    .as_ref()
                    .and_then(|entry| entry.metadata.get(REINFORCEMENT_COUNT_KEY))
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0);
                self.merge(owner, id, similarity, previous).await
            }
            Decision::Insert => self.insert(owner, content, vector, metadata).await,
        }
    }

    async fn merge(
        &self,
        owner: &str,
        id: String,
        similarity: f64,
        previous_reinforcements: u64,
    ) -> Result<AddOutcome> {
        let now = self.clock.now();
        let boost = self.suppressor.merge_boost(similarity);
        let record = self.store.access(&id, boost, now)?;

        let mut patch = Metadata::new();
        patch.insert(
            REINFORCEMENT_COUNT_KEY.to_string(),
            serde_json::json!(previous_reinforcements + 1),
        );
        patch.insert(REINFORCED_AT_KEY.to_string(), serde_json::json!(now.to_rfc3339()));
        patch.insert("strength".to_string(), serde_json::json!(record.strength));

        if let Err(e) = self.index.update(owner, &id, Some(patch)).await {
            tracing::warn!(
                owner = %owner,
                memory_id = %id,
                error = %e,
                "Failed to record reinforcement in index"
            );
        }

        tracing::debug!(
            owner = %owner,
            memory_id = %id,
            similarity,
            strength = record.strength,
            "Merged near-duplicate memory"
        );
        self.hooks.trigger_reinforced(&record, similarity).await;

        Ok(AddOutcome {
            id,
            status: AddStatus::Merged,
            similarity: Some(similarity),
        })
    }

    async fn insert(
        &self,
        owner: &str,
        content: &str,
        vector: Vec<f32>,
        metadata: Metadata,
    ) -> Result<AddOutcome> {
        let now = self.clock.now();
        let id = uuid::Uuid::new_v4().to_string();
        let record = MemoryRecord::new(
            id.clone(),
            owner,
            content,
            vector,
            metadata,
            self.config.memory.initial_strength,
            now,
        );

        let mut index_metadata = record.metadata.clone();
        index_metadata.insert("strength".to_string(), serde_json::json!(record.strength));
        index_metadata.insert(
            "created_at".to_string(),
            serde_json::json!(record.created_at.to_rfc3339()),
        );
        index_metadata.insert(REINFORCEMENT_COUNT_KEY.to_string(), serde_json::json!(0));

        self.store.add(record.clone())?;

        if let Err(e) = self
            .index
            .upsert(owner, &id, &record.vector, content, index_metadata)
            .await
        {
            self.store.remove(&id);
            tracing::error!(
                owner = %owner,
                memory_id = %id,
                error = %e,
                "Index write failed, rolled back store insert"
            );
            return Err(MnemeError::IndexWrite {
                id,
                message: e.to_string(),
            });
        }

        self.hooks.trigger_created(&record).await;

        Ok(AddOutcome {
            id,
            status: AddStatus::Added,
            similarity: None,
        })
    }

    /// Up to `n` of the owner's live memories relevant to `text`, strongest first.
    ///
    /// Vector distance only selects the candidate pool; the result is ranked
    /// by strength after each surviving candidate receives the query boost.
    ///
    /// # Errors
    ///
    /// Returns `Embedding` if the query text cannot be embedded and `Index`
    /// if the similarity search fails.
    pub async fn query(&self, owner: &str, text: &str, n: usize) -> Result<Vec<RecalledMemory>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed(text).await?;

        let guard = self.lock_owner(owner).await;

        let now = self.clock.now();
        self.store.refresh_owner(owner, now);

        let k = n.saturating_mul(self.config.memory.candidate_multiplier);
        let hits = self.index.query(owner, &vector, k).await?;

        let threshold = self.store.forgetting_threshold();
        let mut recalled = Vec::with_capacity(hits.len());
        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            let record = match self.store.get(&hit.id) {
                Some(record) if record.owner == owner => record,
                _ => {
                    tracing::warn!(
                        owner = %owner,
                        memory_id = %hit.id,
                        "Memory present in index but missing from store"
                    );
                    continue;
                }
            };

            if record.strength < threshold {
                continue;
            }

            let record = self
                .store
                .access(&record.id, self.config.memory.query_boost, now)?;
            recalled.push(RecalledMemory {
                id: record.id.clone(),
                content: record.content.clone(),
                strength: record.strength,
                metadata: hit.metadata,
                distance: hit.distance,
                created_at: record.created_at,
                last_accessed_at: record.last_accessed_at,
                access_count: record.access_count,
            });
            records.push(record);
        }
        drop(guard);

        recalled.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| a.distance.total_cmp(&b.distance))
                .then_with(|| a.id.cmp(&b.id))
        });
        recalled.truncate(n);

        for record in records
            .iter()
            .filter(|r| recalled.iter().any(|m| m.id == r.id))
        {
            self.hooks.trigger_recalled(record).await;
        }

        Ok(recalled)
    }

    /// Strength distribution of the owner's memories
    pub fn stats(&self, owner: &str) -> MemoryStats {
        let records = self.store.refresh_owner(owner, self.clock.now());
        let threshold = self.store.forgetting_threshold();

        let total = records.len();
        let hot = records.iter().filter(|r| r.strength >= threshold).count();
        let mean_strength = if total == 0 {
            0.0
        } else {
            records.iter().map(|r| r.strength).sum::<f64>() / total as f64
        };

        MemoryStats {
            total,
            hot,
            cold: total - hot,
            mean_strength,
        }
    }

    /// Forget every memory whose current strength is below the threshold.
    ///
    /// `None` cleans every owner, one owner at a time under that owner's
    /// lock. Index deletions are best-effort; ids that could not be deleted
    /// are reported rather than failing the batch.
    pub async fn cleanup(&self, owner: Option<&str>) -> CleanupReport {
        let owners = match owner {
            Some(owner) => vec![owner.to_string()],
            None => self.store.owners(),
        };

        let mut report = CleanupReport::default();
        for owner in owners {
            let (removed, failed) = self.cleanup_owner(&owner).await;
            report.removed_count += removed;
            report.failed_index_deletes.extend(failed);
        }
        report.failed_index_deletes.sort();

        if report.removed_count > 0 {
            tracing::info!(
                removed = report.removed_count,
                failed_index_deletes = report.failed_index_deletes.len(),
                "Cleaned up cold memories"
            );
        }
        report
    }

    async fn cleanup_owner(&self, owner: &str) -> (usize, Vec<String>) {
        let guard = self.lock_owner(owner).await;

        let removed = self.store.drain_cold(Some(owner), self.clock.now());
        let deletions = join_all(removed.iter().map(|r| self.index.delete(owner, &r.id))).await;

        let mut failed = Vec::new();
        for (record, result) in removed.iter().zip(deletions) {
            if let Err(e) = result {
                tracing::warn!(
                    owner = %owner,
                    memory_id = %record.id,
                    error = %e,
                    "Failed to delete forgotten memory from index"
                );
                failed.push(record.id.clone());
            }
        }
        drop(guard);

        for record in &removed {
            self.hooks.trigger_forgotten(owner, &record.id).await;
        }
        (removed.len(), failed)
    }

    /// Directly recall one memory, applying the full access boost.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the owner has no memory with this id.
    pub async fn access(&self, owner: &str, id: &str) -> Result<MemoryRecord> {
        let guard = self.lock_owner(owner).await;

        match self.store.get(id) {
            Some(record) if record.owner == owner => {}
            _ => return Err(MnemeError::NotFound(id.to_string())),
        }

        let record = self
            .store
            .access(id, self.config.memory.access_boost, self.clock.now())?;

        let mut patch = Metadata::new();
        patch.insert("strength".to_string(), serde_json::json!(record.strength));
        patch.insert("access_count".to_string(), serde_json::json!(record.access_count));
        patch.insert(
            "last_accessed_at".to_string(),
            serde_json::json!(record.last_accessed_at.to_rfc3339()),
        );
        if let Err(e) = self.index.update(owner, id, Some(patch)).await {
            tracing::warn!(
                owner = %owner,
                memory_id = %id,
                error = %e,
                "Failed to record access in index"
            );
        }
        drop(guard);

        self.hooks.trigger_recalled(&record).await;
        Ok(record)
    }

    /// The owner's strongest memories, most recently accessed first on ties
    pub fn hottest(&self, owner: &str, limit: usize) -> Vec<MemoryRecord> {
        self.store.hottest(owner, limit, self.clock.now())
    }

    /// Probe the index and summarise engine state
    pub async fn health(&self) -> HealthReport {
        let index_healthy = match self.index.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(error = %e, "Vector index health check failed");
                false
            }
        };

        HealthReport {
            index_healthy,
            index_backend: self.index.name().to_string(),
            embedding_provider: self.embeddings.name().to_string(),
            dimension: self.embeddings.dimension(),
            total_memories: self.store.len(),
            owners: self.store.owners().len(),
        }
    }
}
