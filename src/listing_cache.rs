//! Panel listing cache for fast folder re-entry.
//!
//! Caches the ordered panel list of recently opened folders using an LRU
//! policy. Entries are the "cached listing" handed to the staleness check,
//! so an evicted or invalidated folder is simply reloaded from the store.

use crate::model::Panel;
use lru::LruCache;
use std::num::NonZeroUsize;

/// LRU cache of panel listings keyed by folder path.
pub struct ListingCache {
    cache: LruCache<String, Vec<Panel>>,
}

impl ListingCache {
    /// Creates a new listing cache; a zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    /// Retrieves a folder's panels if they are cached.
    pub fn get(&mut self, folder_path: &str) -> Option<Vec<Panel>> {
        let result = self.cache.get(folder_path).cloned();
        if result.is_some() {
            log::debug!("Listing cache HIT: {}", folder_path);
        } else {
            log::debug!("Listing cache MISS: {}", folder_path);
        }
        result
    }

    /// Stores a folder's panels.
    pub fn put(&mut self, folder_path: String, panels: Vec<Panel>) {
        log::debug!("Listing cache PUT: {} ({} panels)", folder_path, panels.len());
        self.cache.put(folder_path, panels);
    }

    /// Drops a folder's listing; returns whether one was cached.
    pub fn invalidate(&mut self, folder_path: &str) -> bool {
        let evicted = self.cache.pop(folder_path).is_some();
        if evicted {
            log::debug!("Listing cache EVICT: {}", folder_path);
        }
        evicted
    }

    pub fn contains(&self, folder_path: &str) -> bool {
        self.cache.contains(folder_path)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
