//! Content-addressed embedding cache

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::EmbeddingProvider;
use crate::error::Result;

type ContentHash = [u8; 32];

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<ContentHash, Vec<f32>>,
    order: VecDeque<ContentHash>,
    hits: u64,
    misses: u64,
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups forwarded to the provider
    pub misses: u64,
    /// Vectors currently held
    pub entries: usize,
}

/// Wraps a provider with a bounded cache keyed by the SHA-256 of the text.
///
/// The oldest entry is evicted first once `capacity` is reached.
#[derive(Debug)]
pub struct CachedEmbeddings<P> {
    inner: P,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl<P: EmbeddingProvider> CachedEmbeddings<P> {
    /// Wrap `inner`, keeping at most `capacity` vectors
    pub fn new(inner: P, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Wrapped provider
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }

    fn key(text: &str) -> ContentHash {
        Sha256::digest(text.as_bytes()).into()
    }

    fn lookup(&self, key: &ContentHash) -> Option<Vec<f32>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.entries.get(key).cloned() {
            Some(vector) => {
                state.hits += 1;
                Some(vector)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    fn store(&self, key: ContentHash, vector: Vec<f32>) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.entries.contains_key(&key) {
            return;
        }
        while state.entries.len() >= self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        state.order.push_back(key);
        state.entries.insert(key, vector);
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbeddings<P> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::key(text);
        if let Some(vector) = self.lookup(&key) {
            return Ok(vector);
        }
        let vector = self.inner.embed(text).await?;
        self.store(key, vector.clone());
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }

        fn dimension(&self) -> usize {
            1
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn counting() -> CountingProvider {
        CountingProvider {
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_repeated_text_hits_cache() {
        let cached = CachedEmbeddings::new(counting(), 8);
        let a = cached.embed("hello").await.unwrap();
        let b = cached.embed("hello").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

        let stats = cached.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_oldest_entry_evicted() {
        let cached = CachedEmbeddings::new(counting(), 2);
        cached.embed("a").await.unwrap();
        cached.embed("bb").await.unwrap();
        cached.embed("ccc").await.unwrap();
        assert_eq!(cached.stats().entries, 2);

        // "a" was evicted, so it goes back to the provider
        cached.embed("a").await.unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_storage() {
        let cached = CachedEmbeddings::new(counting(), 0);
        cached.embed("a").await.unwrap();
        cached.embed("a").await.unwrap();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.stats().entries, 0);
    }
}
