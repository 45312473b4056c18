use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe LRU cache for question embeddings
///
/// Keyed by the exact question text, so a repeated question returns the
/// same vector without calling the embeddings endpoint again.
pub struct EmbeddingCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Create a cache holding up to `capacity` vectors.
    ///
    /// Returns None for a zero capacity, which means caching is disabled.
    pub fn new(capacity: usize) -> Option<Self> {
        let cap = NonZeroUsize::new(capacity)?;
        Some(Self {
            cache: Mutex::new(LruCache::new(cap)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Vec<f32>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.lock().get(text).cloned()
    }

    pub fn put(&self, text: String, embedding: Vec<f32>) {
        self.lock().put(text, embedding);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
