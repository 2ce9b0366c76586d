//! In-process registry of memory records
//!
//! Holds the authoritative copy of every [`MemoryRecord`], indexed both by
//! id and by owner so that per-owner scans never walk the whole store.
//! Strength is recomputed lazily on every read that needs it; there is no
//! background timer.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::record::MemoryRecord;
use crate::error::{MnemeError, Result};
use crate::lifecycle::DecayModel;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, MemoryRecord>,
    by_owner: HashMap<String, BTreeSet<String>>,
}

impl Inner {
    fn owner_ids(&self, owner: &str) -> impl Iterator<Item = &String> {
        self.by_owner.get(owner).into_iter().flatten()
    }

    fn remove(&mut self, id: &str) -> Option<MemoryRecord> {
        let record = self.records.remove(id)?;
        if let Some(ids) = self.by_owner.get_mut(&record.owner) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_owner.remove(&record.owner);
            }
        }
        Some(record)
    }
}

/// Authoritative memory registry with strength maintenance and eviction
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    model: DecayModel,
    forgetting_threshold: f64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(model: DecayModel, forgetting_threshold: f64) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            model,
            forgetting_threshold,
        }
    }

    /// Decay model used for every strength computation
    pub fn model(&self) -> &DecayModel {
        &self.model
    }

    /// Strength below which records are forgotten
    pub fn forgetting_threshold(&self) -> f64 {
        self.forgetting_threshold
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a record with the same id already exists.
    pub fn add(&self, record: MemoryRecord) -> Result<()> {
        let mut inner = self.write();
        if inner.records.contains_key(&record.id) {
            return Err(MnemeError::InvalidInput(format!(
                "memory {} already exists",
                record.id
            )));
        }
        inner
            .by_owner
            .entry(record.owner.clone())
            .or_default()
            .insert(record.id.clone());
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Remove a record, returning it if it existed
    pub fn remove(&self, id: &str) -> Option<MemoryRecord> {
        self.write().remove(id)
    }

    /// Snapshot of a record
    pub fn get(&self, id: &str) -> Option<MemoryRecord> {
        self.read().records.get(id).cloned()
    }

    /// Whether a record exists
    pub fn contains(&self, id: &str) -> bool {
        self.read().records.contains_key(id)
    }

    /// Reinforce a record: decay to `now`, add `boost`, restart its clock.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such record exists.
    pub fn access(&self, id: &str, boost: f64, now: DateTime<Utc>) -> Result<MemoryRecord> {
        let mut inner = self.write();
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| MnemeError::NotFound(id.to_string()))?;
        record.access(&self.model, boost, now);
        Ok(record.clone())
    }

    /// Ids of every record belonging to `owner`, in id order
    pub fn ids_for_owner(&self, owner: &str) -> Vec<String> {
        self.read().owner_ids(owner).cloned().collect()
    }

    /// Every record belonging to `owner`, with strengths as last refreshed
    pub fn list_by_owner(&self, owner: &str) -> Vec<MemoryRecord> {
        let inner = self.read();
        inner
            .owner_ids(owner)
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Owners with at least one record
    pub fn owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.read().by_owner.keys().cloned().collect();
        owners.sort();
        owners
    }

    /// Recompute strength for every record of `owner` and return them
    pub fn refresh_owner(&self, owner: &str, now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut inner = self.write();
        let ids: Vec<String> = inner.owner_ids(owner).cloned().collect();
        let mut refreshed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = inner.records.get_mut(&id) {
                record.refresh(&self.model, now);
                refreshed.push(record.clone());
            }
        }
        refreshed
    }

    /// Recompute strength for every record in the store
    pub fn refresh_all(&self, now: DateTime<Utc>) {
        let mut inner = self.write();
        for record in inner.records.values_mut() {
            record.refresh(&self.model, now);
        }
    }

    /// Up to `limit` records of `owner`, strongest first.
    ///
    /// Ties are broken by most recent access.
    pub fn hottest(&self, owner: &str, limit: usize, now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut records = self.refresh_owner(owner, now);
        records.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| b.last_accessed_at.cmp(&a.last_accessed_at))
        });
        records.truncate(limit);
        records
    }

    /// Remove and return every record whose freshly recomputed strength is
    /// below the forgetting threshold.
    ///
    /// `owner` restricts the scan to one namespace; `None` scans everything.
    pub fn drain_cold(&self, owner: Option<&str>, now: DateTime<Utc>) -> Vec<MemoryRecord> {
        let mut inner = self.write();
        let candidates: Vec<String> = match owner {
            Some(owner) => inner.owner_ids(owner).cloned().collect(),
            None => inner.records.keys().cloned().collect(),
        };

        let mut cold = Vec::new();
        for id in candidates {
            let is_cold = match inner.records.get_mut(&id) {
                Some(record) => record.refresh(&self.model, now) < self.forgetting_threshold,
                None => false,
            };
            if is_cold {
                if let Some(record) = inner.remove(&id) {
                    cold.push(record);
                }
            }
        }
        cold.sort_by(|a, b| a.id.cmp(&b.id));
        cold
    }

    /// Remove cold records and return how many were removed
    pub fn cleanup(&self, owner: Option<&str>, now: DateTime<Utc>) -> usize {
        self.drain_cold(owner, now).len()
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }
}
