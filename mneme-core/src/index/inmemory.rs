//! In-process vector index
//!
//! Brute-force cosine search over per-owner hash maps. Suitable for tests,
//! the CLI, and small deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{IndexEntry, IndexHit, VectorIndex};
use crate::clustering::cosine_similarity;
use crate::error::{MnemeError, Result};
use crate::memory::Metadata;

type Namespaces = HashMap<String, HashMap<String, IndexEntry>>;

/// Vector index held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    namespaces: RwLock<Namespaces>,
}

impl InMemoryVectorIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Namespaces> {
        self.namespaces.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Namespaces> {
        self.namespaces.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        owner: &str,
        id: &str,
        vector: &[f32],
        text: &str,
        metadata: Metadata,
    ) -> Result<()> {
        if vector.is_empty() {
            return Err(MnemeError::InvalidInput(format!(
                "empty vector for {}",
                id
            )));
        }
        self.write().entry(owner.to_string()).or_default().insert(
            id.to_string(),
            IndexEntry {
                id: id.to_string(),
                vector: vector.to_vec(),
                text: text.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn query(&self, owner: &str, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let namespaces = self.read();
        let Some(entries) = namespaces.get(owner) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<IndexHit> = entries
            .values()
            .filter_map(|entry| {
                let similarity = cosine_similarity(vector, &entry.vector)?;
                Some(IndexHit {
                    id: entry.id.clone(),
                    text: entry.text.clone(),
                    metadata: entry.metadata.clone(),
                    distance: 1.0 - similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn update(&self, owner: &str, id: &str, metadata: Option<Metadata>) -> Result<()> {
        let mut namespaces = self.write();
        let entry = namespaces
            .get_mut(owner)
            .and_then(|entries| entries.get_mut(id))
            .ok_or_else(|| MnemeError::NotFound(id.to_string()))?;
        if let Some(metadata) = metadata {
            entry.metadata.extend(metadata);
        }
        Ok(())
    }

    async fn delete(&self, owner: &str, id: &str) -> Result<()> {
        let mut namespaces = self.write();
        if let Some(entries) = namespaces.get_mut(owner) {
            entries.remove(id);
            if entries.is_empty() {
                namespaces.remove(owner);
            }
        }
        Ok(())
    }

    async fn get(&self, owner: &str, id: &str) -> Result<Option<IndexEntry>> {
        Ok(self
            .read()
            .get(owner)
            .and_then(|entries| entries.get(id))
            .cloned())
    }

    async fn count(&self, owner: &str) -> Result<usize> {
        Ok(self.read().get(owner).map_or(0, HashMap::len))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert("alice", "m1", &[1.0, 0.0], "tea", Metadata::new())
            .await
            .unwrap();

        let entry = index.get("alice", "m1").await.unwrap().unwrap();
        assert_eq!(entry.text, "tea");
        assert!(index.get("bob", "m1").await.unwrap().is_none());
        assert_eq!(index.count("alice").await.unwrap(), 1);
        assert_eq!(index.count("bob").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_orders_by_distance() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert("alice", "far", &[0.0, 1.0], "far", Metadata::new())
            .await
            .unwrap();
        index
            .upsert("alice", "near", &[0.9, 0.1], "near", Metadata::new())
            .await
            .unwrap();
        index
            .upsert("alice", "exact", &[1.0, 0.0], "exact", Metadata::new())
            .await
            .unwrap();
        index
            .upsert("bob", "other", &[1.0, 0.0], "other", Metadata::new())
            .await
            .unwrap();

        let hits = index.query("alice", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(hits[0].distance.abs() < 1e-9);
        assert!(hits[0].distance <= hits[1].distance);

        assert!(index.query("alice", &[1.0, 0.0], 0).await.unwrap().is_empty());
        assert!(index.query("carol", &[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_metadata() {
        let index = InMemoryVectorIndex::new();
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("chat"));
        index
            .upsert("alice", "m1", &[1.0], "tea", metadata)
            .await
            .unwrap();

        let mut patch = Metadata::new();
        patch.insert("reinforcement_count".into(), json!(1));
        index.update("alice", "m1", Some(patch)).await.unwrap();

        let entry = index.get("alice", "m1").await.unwrap().unwrap();
        assert_eq!(entry.metadata["source"], json!("chat"));
        assert_eq!(entry.metadata["reinforcement_count"], json!(1));

        index.update("alice", "m1", None).await.unwrap();
        let err = index.update("alice", "missing", None).await.unwrap_err();
        assert!(matches!(err, MnemeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert("alice", "m1", &[1.0], "tea", Metadata::new())
            .await
            .unwrap();

        index.delete("alice", "m1").await.unwrap();
        index.delete("alice", "m1").await.unwrap();
        index.delete("nobody", "m1").await.unwrap();
        assert_eq!(index.count("alice").await.unwrap(), 0);
    }
}
