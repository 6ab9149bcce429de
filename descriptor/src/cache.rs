//! LRU cache of decoded descriptor trees

use crate::tree::DescriptorTree;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Shared cache of descriptor trees keyed by their owner (usually a file)
#[derive(Debug)]
pub struct DescriptorCache<K: Hash + Eq> {
    entries: Mutex<LruCache<K, Arc<DescriptorTree>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq> DescriptorCache<K> {
    /// A capacity of zero is treated as one
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<DescriptorTree>> {
        let found = self.lock().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert `tree`, evicting the least recently used entry when full
    pub fn insert(&self, key: K, tree: Arc<DescriptorTree>) {
        self.lock().put(key, tree);
    }

    pub fn invalidate(&self, key: &K) -> Option<Arc<DescriptorTree>> {
        self.lock().pop(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            entries: entries.len(),
            capacity: entries.cap().get(),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }

    // A panic while holding the lock cannot leave the LRU list half-updated.
    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, Arc<DescriptorTree>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}
