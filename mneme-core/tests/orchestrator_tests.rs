//! End-to-end tests for the memory orchestrator

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mneme_core::prelude::*;

/// Embedder returning fixed vectors for known texts
struct StaticEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
    failing: AtomicBool,
}

impl StaticEmbeddings {
    fn new(dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            dimension,
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MnemeError::Embedding("upstream unavailable".to_string()));
        }
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| MnemeError::Embedding(format!("no vector for '{}'", text)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// In-memory index with switchable failures
#[derive(Default)]
struct FaultyIndex {
    inner: InMemoryVectorIndex,
    fail_upsert: AtomicBool,
    fail_update: AtomicBool,
    yield_after_get: AtomicBool,
    fail_delete: Mutex<HashSet<String>>,
}

#[async_trait]
impl VectorIndex for FaultyIndex {
    async fn upsert(
        &self,
        owner: &str,
        id: &str,
        vector: &[f32],
        text: &str,
        metadata: Metadata,
    ) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(MnemeError::Index("disk full".to_string()));
        }
        self.inner.upsert(owner, id, vector, text, metadata).await
    }

    async fn query(&self, owner: &str, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        self.inner.query(owner, vector, k).await
    }

    async fn update(&self, owner: &str, id: &str, metadata: Option<Metadata>) -> Result<()> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(MnemeError::Index("update rejected".to_string()));
        }
        self.inner.update(owner, id, metadata).await
    }

    async fn delete(&self, owner: &str, id: &str) -> Result<()> {
        if self.fail_delete.lock().unwrap().contains(id) {
            return Err(MnemeError::Index(format!("cannot delete {}", id)));
        }
        self.inner.delete(owner, id).await
    }

    async fn get(&self, owner: &str, id: &str) -> Result<Option<IndexEntry>> {
        let entry = self.inner.get(owner, id).await;
        if self.yield_after_get.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        entry
    }

    async fn count(&self, owner: &str) -> Result<usize> {
        self.inner.count(owner).await
    }

    fn name(&self) -> &str {
        "faulty"
    }
}

#[derive(Default)]
struct CountingHook {
    created: AtomicUsize,
    reinforced: AtomicUsize,
    recalled: AtomicUsize,
    forgotten: AtomicUsize,
}

#[async_trait]
impl MemoryHook for CountingHook {
    async fn on_memory_created(&self, _record: &MemoryRecord) -> Result<()> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_memory_reinforced(&self, _record: &MemoryRecord, _similarity: f64) -> Result<()> {
        self.reinforced.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_memory_recalled(&self, _record: &MemoryRecord) -> Result<()> {
        self.recalled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_memory_forgotten(&self, _owner: &str, _memory_id: &str) -> Result<()> {
        self.forgotten.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    memory: Arc<MemoryOrchestrator>,
    clock: Arc<ManualClock>,
    embeddings: Arc<StaticEmbeddings>,
    index: Arc<FaultyIndex>,
    hook: Arc<CountingHook>,
}

fn harness() -> Harness {
    let embeddings = Arc::new(StaticEmbeddings::new(
        4,
        &[
            ("fact A", vec![1.0, 0.0, 0.0, 0.0]),
            ("fact A again", vec![0.99, 0.1, 0.0, 0.0]),
            ("fact B", vec![0.0, 1.0, 0.0, 0.0]),
            ("fact C", vec![0.0, 0.0, 1.0, 0.0]),
            ("fact D", vec![0.7, 0.7, 0.0, 0.0]),
            ("truncated", vec![1.0, 0.0]),
        ],
    ));
    let index = Arc::new(FaultyIndex::default());
    let clock = Arc::new(ManualClock::starting_now());
    let hook = Arc::new(CountingHook::default());

    let memory = MemoryOrchestrator::builder()
        .embeddings(embeddings.clone())
        .index(index.clone())
        .clock(clock.clone())
        .hook(hook.clone())
        .build()
        .expect("Failed to build orchestrator");

    Harness {
        memory: Arc::new(memory),
        clock,
        embeddings,
        index,
        hook,
    }
}

async fn add(h: &Harness, owner: &str, content: &str) -> AddOutcome {
    h.memory
        .add(owner, content, Metadata::new())
        .await
        .expect("add failed")
}

#[tokio::test]
async fn test_near_duplicate_merges_into_existing() {
    let h = harness();

    let first = add(&h, "u", "fact A").await;
    assert_eq!(first.status, AddStatus::Added);

    let second = add(&h, "u", "fact A again").await;
    assert_eq!(second.status, AddStatus::Merged);
    assert_eq!(second.id, first.id);
    assert!(second.similarity.unwrap() >= 0.85);

    assert_eq!(h.memory.store().len(), 1);
    assert_eq!(h.index.count("u").await.unwrap(), 1);
    assert_eq!(h.hook.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.hook.reinforced.load(Ordering::SeqCst), 1);

    let record = h.memory.store().get(&first.id).unwrap();
    assert_eq!(record.access_count, 1);
}

#[tokio::test]
async fn test_merge_boost_applies_after_decay() {
    let h = harness();
    let first = add(&h, "u", "fact A").await;

    h.clock.advance(Duration::from_secs(10));
    let second = add(&h, "u", "fact A again").await;

    let similarity = second.similarity.unwrap();
    let expected = ((-1.0f64).exp() + similarity * 0.3).min(1.0);
    let record = h.memory.store().get(&first.id).unwrap();
    assert!((record.strength - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_cleanup_removes_fully_decayed_facts() {
    let h = harness();
    add(&h, "u", "fact A").await;
    add(&h, "u", "fact B").await;

    h.clock.advance(Duration::from_secs(100));
    let report = h.memory.cleanup(Some("u")).await;

    assert_eq!(report.removed_count, 2);
    assert!(report.failed_index_deletes.is_empty());
    assert!(h.memory.store().is_empty());
    assert_eq!(h.index.count("u").await.unwrap(), 0);
    assert_eq!(h.hook.forgotten.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stats_counts_hot_and_cold() {
    let h = harness();
    add(&h, "u", "fact A").await;

    h.clock.advance(Duration::from_secs(100));
    add(&h, "u", "fact B").await;
    add(&h, "u", "fact C").await;

    let stats = h.memory.stats("u");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.hot, 2);
    assert_eq!(stats.cold, 1);
    let expected_mean = ((-10.0f64).exp() + 2.0) / 3.0;
    assert!((stats.mean_strength - expected_mean).abs() < 1e-9);

    let empty = h.memory.stats("nobody");
    assert_eq!(empty.total, 0);
    assert_eq!(empty.mean_strength, 0.0);
}

#[tokio::test]
async fn test_query_never_returns_cold_memories() {
    let h = harness();
    add(&h, "u", "fact A").await;

    // e^-5 is below the 0.01 threshold
    h.clock.advance(Duration::from_secs(50));
    let c = add(&h, "u", "fact C").await;

    let results = h.memory.query("u", "fact A", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, c.id);
    assert_eq!(h.hook.recalled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_query_ranks_by_strength_not_distance() {
    let h = harness();
    let a = add(&h, "u", "fact A").await;

    h.clock.advance(Duration::from_secs(3));
    let d = add(&h, "u", "fact D").await;
    assert_eq!(d.status, AddStatus::Added);

    let results = h.memory.query("u", "fact A", 2).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![d.id.as_str(), a.id.as_str()]);

    // The nearer memory is weaker, decayed for 3s then boosted by 0.1
    let expected = (-0.3f64).exp() + 0.1;
    assert!((results[1].strength - expected).abs() < 1e-9);
    assert!(results[1].distance < results[0].distance);
    assert_eq!(results[1].access_count, 1);
}

#[tokio::test]
async fn test_index_write_failure_rolls_back_store() {
    let h = harness();
    h.index.fail_upsert.store(true, Ordering::SeqCst);

    let err = h
        .memory
        .add("u", "fact A", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, MnemeError::IndexWrite { .. }));
    assert!(!err.is_retryable());
    assert!(h.memory.store().is_empty());
    assert_eq!(h.hook.created.load(Ordering::SeqCst), 0);

    h.index.fail_upsert.store(false, Ordering::SeqCst);
    let outcome = add(&h, "u", "fact A").await;
    assert_eq!(outcome.status, AddStatus::Added);
}

#[tokio::test]
async fn test_merge_survives_index_metadata_failure() {
    let h = harness();
    let first = add(&h, "u", "fact A").await;

    h.index.fail_update.store(true, Ordering::SeqCst);
    let second = add(&h, "u", "fact A again").await;
    assert_eq!(second.status, AddStatus::Merged);
    assert_eq!(h.memory.store().get(&first.id).unwrap().access_count, 1);
}

#[tokio::test]
async fn test_cleanup_index_delete_failures_are_best_effort() {
    let h = harness();
    add(&h, "u", "fact A").await;
    let b = add(&h, "u", "fact B").await;
    add(&h, "v", "fact C").await;
    h.index.fail_delete.lock().unwrap().insert(b.id.clone());

    h.clock.advance(Duration::from_secs(100));
    let report = h.memory.cleanup(None).await;

    assert_eq!(report.removed_count, 3);
    assert_eq!(report.failed_index_deletes, vec![b.id.clone()]);
    assert!(h.memory.store().is_empty());
    assert_eq!(h.index.count("u").await.unwrap(), 1);
    assert_eq!(h.index.count("v").await.unwrap(), 0);
}

#[tokio::test]
async fn test_embedding_failure_mutates_nothing() {
    let h = harness();
    h.embeddings.failing.store(true, Ordering::SeqCst);

    let err = h
        .memory
        .add("u", "fact A", Metadata::new())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(h.memory.store().is_empty());
    assert_eq!(h.index.count("u").await.unwrap(), 0);

    let err = h.memory.query("u", "fact A", 3).await.unwrap_err();
    assert!(matches!(err, MnemeError::Embedding(_)));
}

#[tokio::test]
async fn test_wrong_dimension_rejected() {
    let h = harness();
    let err = h
        .memory
        .add("u", "truncated", Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MnemeError::DimensionMismatch {
            expected: 4,
            actual: 2
        }
    ));
    assert!(h.memory.store().is_empty());
}

#[tokio::test]
async fn test_store_only_record_is_not_a_candidate() {
    let h = harness();
    let first = add(&h, "u", "fact A").await;

    // Break write-through behind the orchestrator's back
    h.index.inner.delete("u", &first.id).await.unwrap();

    let second = add(&h, "u", "fact A again").await;
    assert_eq!(second.status, AddStatus::Added);
    assert_ne!(second.id, first.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_for_one_owner_deduplicate() {
    let h = harness();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let memory = h.memory.clone();
            tokio::spawn(async move { memory.add("u", "fact A", Metadata::new()).await })
        })
        .collect();

    let mut added = 0;
    let mut merged = 0;
    for task in tasks {
        match task.await.unwrap().unwrap().status {
            AddStatus::Added => added += 1,
            AddStatus::Merged => merged += 1,
        }
    }

    assert_eq!(added, 1);
    assert_eq!(merged, 7);
    assert_eq!(h.memory.store().len(), 1);
    assert_eq!(h.index.count("u").await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_merges_count_every_reinforcement() {
    let h = harness();
    let first = add(&h, "u", "fact A").await;
    h.index.yield_after_get.store(true, Ordering::SeqCst);

    let (a, b) = tokio::join!(add(&h, "u", "fact A"), add(&h, "u", "fact A"));
    assert_eq!(a.status, AddStatus::Merged);
    assert_eq!(b.status, AddStatus::Merged);

    let record = h.memory.store().get(&first.id).unwrap();
    assert_eq!(record.access_count, 2);
    let entry = h.index.get("u", &first.id).await.unwrap().unwrap();
    assert_eq!(entry.metadata[REINFORCEMENT_COUNT_KEY], serde_json::json!(2));
}

#[tokio::test]
async fn test_query_skips_index_hits_without_store_record() {
    let h = harness();
    let kept = add(&h, "u", "fact A").await;
    let foreign = add(&h, "other", "fact A again").await;

    // Entries the store does not hold for this owner
    h.index
        .inner
        .upsert("u", "orphan", &[1.0, 0.0, 0.0, 0.0], "orphan", Metadata::new())
        .await
        .unwrap();
    h.index
        .inner
        .upsert("u", &foreign.id, &[0.99, 0.1, 0.0, 0.0], "fact A again", Metadata::new())
        .await
        .unwrap();

    let recalled = h.memory.query("u", "fact A", 5).await.unwrap();
    let ids: Vec<&str> = recalled.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![kept.id.as_str()]);

    let other = h.memory.store().get(&foreign.id).unwrap();
    assert_eq!(other.access_count, 0);
}

#[tokio::test]
async fn test_hottest_and_context_rendering() {
    let h = harness();
    add(&h, "u", "fact A").await;
    h.clock.advance(Duration::from_secs(10));
    add(&h, "u", "fact B").await;

    let hottest = h.memory.hottest("u", 1);
    assert_eq!(hottest.len(), 1);
    assert_eq!(hottest[0].content, "fact B");

    let recalled = h.memory.query("u", "fact B", 2).await.unwrap();
    let rendered = render_memory_context(&recalled, &ContextConfig::default());
    assert!(rendered.starts_with("# Relevant context from memory:"));
    assert!(rendered.contains("1. [hot] fact B"));
    assert!(rendered.contains("2. [warm] fact A"));
}
