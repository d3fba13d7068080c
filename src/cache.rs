//! LRU cache of decoded postings lists, keyed by term.
//!
//! Sits in front of the variable-byte decode step in the segment reader.
//! High-frequency query terms would otherwise be re-decoded on every search;
//! the cache trades a bounded amount of memory for avoiding that. Eviction
//! never affects correctness, only latency.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type CacheKey = (u32, String);

pub struct PostingsCache {
    entries: RwLock<LruCache<CacheKey, Arc<Vec<(u64, u32)>>>>,
    stats: RwLock<CacheStats>,
}

impl PostingsCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// `segment_id` disambiguates terms across readers sharing one cache.
    pub fn get(&self, segment_id: u32, term: &str) -> Option<Arc<Vec<(u64, u32)>>> {
        let key = (segment_id, term.to_string());
        let mut entries = self.entries.write();
        let found = entries.get(&key).cloned();
        let mut stats = self.stats.write();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    pub fn insert(&self, segment_id: u32, term: &str, postings: Arc<Vec<(u64, u32)>>) {
        let key = (segment_id, term.to_string());
        self.entries.write().put(key, postings);
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache = PostingsCache::new(4);
        assert!(cache.get(0, "term").is_none());
        cache.insert(0, "term", Arc::new(vec![(1, 2)]));
        let got = cache.get(0, "term").unwrap();
        assert_eq!(*got, vec![(1, 2)]);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = PostingsCache::new(1);
        cache.insert(0, "a", Arc::new(vec![(1, 1)]));
        cache.insert(0, "b", Arc::new(vec![(2, 1)]));
        assert!(cache.get(0, "a").is_none());
        assert!(cache.get(0, "b").is_some());
    }

    #[test]
    fn segments_are_disambiguated() {
        let cache = PostingsCache::new(4);
        cache.insert(0, "term", Arc::new(vec![(1, 1)]));
        cache.insert(1, "term", Arc::new(vec![(2, 2)]));
        assert_eq!(*cache.get(0, "term").unwrap(), vec![(1, 1)]);
        assert_eq!(*cache.get(1, "term").unwrap(), vec![(2, 2)]);
    }
}
