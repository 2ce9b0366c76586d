//! A single remembered fact and its decay state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::lifecycle::{self, DecayModel};

/// Open string-keyed metadata attached to a memory.
///
/// The engine owns the keys listed in
/// [`RESERVED_METADATA_KEYS`](crate::orchestrator::RESERVED_METADATA_KEYS).
pub type Metadata = HashMap<String, serde_json::Value>;

/// Core memory record held by the [`MemoryStore`](super::MemoryStore)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Unique identifier
    pub id: String,

    /// Owner (user) namespace
    pub owner: String,

    /// Memory content
    pub content: String,

    /// Embedding of `content`
    pub vector: Vec<f32>,

    /// Caller-supplied metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Strength as of the last refresh, in [0, 1]
    pub strength: f64,

    /// Strength at `last_accessed_at`; decay is always computed from here
    pub anchor_strength: f64,

    /// When the memory was first stored
    pub created_at: DateTime<Utc>,

    /// When the memory was last accessed or reinforced
    pub last_accessed_at: DateTime<Utc>,

    /// Number of accesses (direct, merge, or recall)
    pub access_count: u64,
}

impl MemoryRecord {
    /// Create a fresh record with the given initial strength
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        content: impl Into<String>,
        vector: Vec<f32>,
        metadata: Metadata,
        initial_strength: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let strength = lifecycle::boost(0.0, initial_strength);
        Self {
            id: id.into(),
            owner: owner.into(),
            content: content.into(),
            vector,
            metadata,
            strength,
            anchor_strength: strength,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    /// Strength at `now` without touching the record
    pub fn current_strength(&self, model: &DecayModel, now: DateTime<Utc>) -> f64 {
        model.strength_at(self.anchor_strength, self.last_accessed_at, now)
    }

    /// Recompute the cached strength for `now` and return it
    pub fn refresh(&mut self, model: &DecayModel, now: DateTime<Utc>) -> f64 {
        self.strength = self.current_strength(model, now);
        self.strength
    }

    /// Reinforce the record.
    ///
    /// Decays to `now` first, then adds `boost_amount` (capped at 1.0) and
    /// restarts the decay clock.
    pub fn access(&mut self, model: &DecayModel, boost_amount: f64, now: DateTime<Utc>) -> f64 {
        let decayed = self.current_strength(model, now);
        let boosted = lifecycle::boost(decayed, boost_amount);
        self.strength = boosted;
        self.anchor_strength = boosted;
        self.last_accessed_at = now;
        self.access_count += 1;
        boosted
    }

    /// Whether the record is below the forgetting threshold at `now`
    pub fn is_cold(&self, model: &DecayModel, threshold: f64, now: DateTime<Utc>) -> bool {
        self.current_strength(model, now) < threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(now: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord::new(
            "m1",
            "alice",
            "Alice likes tea",
            vec![1.0, 0.0],
            Metadata::new(),
            1.0,
            now,
        )
    }

    #[test]
    fn test_refresh_does_not_compound() {
        let model = DecayModel::new(0.1, Duration::from_secs(1));
        let t0 = Utc::now();
        let mut rec = record(t0);

        let t1 = t0 + chrono::Duration::seconds(5);
        let first = rec.refresh(&model, t1);
        let second = rec.refresh(&model, t1);
        assert_eq!(first, second);
        assert!((first - (-0.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_access_decays_then_boosts() {
        let model = DecayModel::new(0.1, Duration::from_secs(1));
        let t0 = Utc::now();
        let mut rec = record(t0);

        let t1 = t0 + chrono::Duration::seconds(10);
        let decayed = rec.current_strength(&model, t1);
        let after = rec.access(&model, 0.3, t1);

        assert!((after - (decayed + 0.3)).abs() < 1e-12);
        assert_eq!(rec.last_accessed_at, t1);
        assert_eq!(rec.access_count, 1);
        assert_eq!(rec.anchor_strength, after);
    }

    #[test]
    fn test_repeated_access_counts_and_never_drops() {
        let model = DecayModel::new(0.1, Duration::from_secs(1));
        let t0 = Utc::now();
        let mut rec = record(t0);

        let t1 = t0 + chrono::Duration::seconds(3);
        let before_first = rec.current_strength(&model, t1);
        let first = rec.access(&model, 0.05, t1);
        assert!(first >= before_first);

        let t2 = t1 + chrono::Duration::seconds(7);
        let before_second = rec.current_strength(&model, t2);
        let second = rec.access(&model, 0.05, t2);
        assert!(second >= before_second);

        assert_eq!(rec.access_count, 2);
        assert!(second <= 1.0);
    }

    #[test]
    fn test_is_cold() {
        let model = DecayModel::new(0.1, Duration::from_secs(1));
        let t0 = Utc::now();
        let rec = record(t0);
        assert!(!rec.is_cold(&model, 0.01, t0));
        assert!(rec.is_cold(&model, 0.01, t0 + chrono::Duration::seconds(100)));
    }
}
