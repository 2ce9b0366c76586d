//! Duplicate suppression by cosine similarity
//!
//! A new observation whose vector is close enough to an existing memory is
//! merged into it (reinforcing the existing memory) instead of being stored
//! again. The suppressor is pure and knows nothing about owners; callers
//! scope the candidate set.

use crate::config::ClusteringConfig;

/// Cosine similarity of two vectors, clamped to [-1, 1].
///
/// Returns `None` for empty or differently sized vectors. A zero vector has
/// similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_nan() {
        Some(0.0)
    } else {
        Some(similarity.clamp(-1.0, 1.0))
    }
}

/// Existing memory considered for a merge
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Memory id
    pub id: &'a str,
    /// Memory vector
    pub vector: &'a [f32],
}

/// Outcome of a suppression check
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No candidate is similar enough; store the new memory
    Insert,
    /// Reinforce an existing memory instead
    MergeInto {
        /// Memory to reinforce
        id: String,
        /// Cosine similarity with the new vector
        similarity: f64,
    },
}

/// Merge-vs-insert decision component
#[derive(Debug, Clone)]
pub struct ClusteringSuppressor {
    similarity_threshold: f64,
    boost_base: f64,
}

impl Default for ClusteringSuppressor {
    fn default() -> Self {
        Self::new(0.85, 0.3)
    }
}

impl From<&ClusteringConfig> for ClusteringSuppressor {
    fn from(config: &ClusteringConfig) -> Self {
        Self::new(config.similarity_threshold, config.boost_base)
    }
}

impl ClusteringSuppressor {
    /// Create a suppressor
    pub fn new(similarity_threshold: f64, boost_base: f64) -> Self {
        Self {
            similarity_threshold,
            boost_base,
        }
    }

    /// Similarity at or above which a merge happens
    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// Decide whether `vector` should merge into one of `candidates`.
    ///
    /// The best-scoring candidate wins; ties at the maximum go to the
    /// lexicographically smallest id, so the result does not depend on
    /// candidate order. Candidates of the wrong dimension are ignored.
    pub fn decide(&self, vector: &[f32], candidates: &[Candidate<'_>]) -> Decision {
        let mut best: Option<(&str, f64)> = None;

        for candidate in candidates {
            let Some(similarity) = cosine_similarity(vector, candidate.vector) else {
                continue;
            };
            best = match best {
                Some((id, score))
                    if score > similarity || (score == similarity && id <= candidate.id) =>
                {
                    Some((id, score))
                }
                _ => Some((candidate.id, similarity)),
            };
        }

        match best {
            Some((id, similarity)) if similarity >= self.similarity_threshold => {
                Decision::MergeInto {
                    id: id.to_string(),
                    similarity,
                }
            }
            _ => Decision::Insert,
        }
    }

    /// Boost applied to the memory being merged into.
    ///
    /// Proportional to similarity: a closer duplicate reinforces more.
    pub fn merge_boost(&self, similarity: f64) -> f64 {
        (similarity * self.boost_base).max(0.0)
    }
}
