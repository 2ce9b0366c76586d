//! Memory decay and reinforcement
//!
//! Strength relaxes exponentially toward zero (complete forgetting):
//!
//! ```text
//! strength(Δt) = initial · e^(−rate · Δt)
//! ```
//!
//! where Δt is the time since the record was last accessed, measured in
//! multiples of the configured decay unit. Nothing here caches: callers
//! recompute whenever they need the current value.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::clock::elapsed_seconds;
use crate::config::{ContextConfig, MemoryConfig};

/// Upper bound for strength
pub const MAX_STRENGTH: f64 = 1.0;

/// Retention after `elapsed` decay units.
///
/// Never NaN, never negative, never above `initial` for finite `elapsed >= 0`.
pub fn retention(initial: f64, elapsed: f64, rate: f64) -> f64 {
    let initial = clamp_strength(initial);
    if elapsed <= 0.0 || rate <= 0.0 || elapsed.is_nan() || rate.is_nan() {
        return initial;
    }

    let decayed = initial * (-rate * elapsed).exp();
    if decayed.is_nan() {
        return 0.0;
    }
    decayed.clamp(0.0, initial)
}

/// Apply a boost to an already-decayed strength, capped at [`MAX_STRENGTH`]
pub fn boost(decayed: f64, amount: f64) -> f64 {
    clamp_strength(decayed + amount.max(0.0))
}

fn clamp_strength(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_STRENGTH)
    }
}

/// Deployment-wide decay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayModel {
    rate: f64,
    unit: Duration,
}

impl DecayModel {
    /// Create a model decaying at `rate` per `unit` of elapsed time
    pub fn new(rate: f64, unit: Duration) -> Self {
        let unit = if unit.is_zero() {
            Duration::from_secs(1)
        } else {
            unit
        };
        Self {
            rate: rate.max(0.0),
            unit,
        }
    }

    /// Decay constant
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Length of one decay unit
    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Elapsed decay units between two instants
    pub fn elapsed_units(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
        elapsed_seconds(from, to) / self.unit.as_secs_f64()
    }

    /// Strength at `now` of a record that had `initial` strength when last accessed
    pub fn strength_at(
        &self,
        initial: f64,
        last_accessed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        retention(initial, self.elapsed_units(last_accessed_at, now), self.rate)
    }
}

impl From<&MemoryConfig> for DecayModel {
    fn from(config: &MemoryConfig) -> Self {
        Self::new(config.decay_rate, config.decay_unit)
    }
}

/// Coarse classification of a strength value
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthTier {
    /// Recently used or repeatedly reinforced
    Hot,
    /// Fading
    Warm,
    /// Close to forgotten
    Cold,
}

/// Boundaries between strength tiers
#[derive(Debug, Clone, Copy)]
pub struct TierThresholds {
    /// Strictly above this is hot
    pub hot: f64,
    /// Strictly above this is warm
    pub warm: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            hot: 0.7,
            warm: 0.3,
        }
    }
}

impl From<&ContextConfig> for TierThresholds {
    fn from(config: &ContextConfig) -> Self {
        Self {
            hot: config.hot_threshold,
            warm: config.warm_threshold,
        }
    }
}

impl StrengthTier {
    /// Classify a strength value
    pub fn classify(strength: f64, thresholds: &TierThresholds) -> Self {
        if strength > thresholds.hot {
            StrengthTier::Hot
        } else if strength > thresholds.warm {
            StrengthTier::Warm
        } else {
            StrengthTier::Cold
        }
    }

    /// Short marker used in rendered context
    pub fn marker(&self) -> &'static str {
        match self {
            StrengthTier::Hot => "[hot]",
            StrengthTier::Warm => "[warm]",
            StrengthTier::Cold => "[cold]",
        }
    }
}
