// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Cost-bounded least-recently-used cache

use ahash::AHashMap;
use std::collections::BTreeMap;

struct Entry<V> {
    value: V,
    cost: usize,
    last_used: u64,
    message: Option<String>,
}

/// Hit/miss/eviction counters, exposed for instrumentation and the
/// cache-idempotence tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
    pub total_cost: usize,
}

/// LRU cache keyed by subtree fingerprints, bounded by a byte budget.
///
/// Not internally synchronized: callers serialize access (the evaluator
/// runs single-threaded over a given cache set).
pub struct LruCache<V> {
    entries: AHashMap<String, Entry<V>>,
    // last_used tick -> key; the first entry is always the next victim
    order: BTreeMap<u64, String>,
    max_cost: usize,
    total_cost: usize,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V: Clone> LruCache<V> {
    pub fn new(max_cost: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            order: BTreeMap::new(),
            max_cost,
            total_cost: 0,
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn max_cost(&self) -> usize {
        self.max_cost
    }

    pub fn set_max_cost(&mut self, max_cost: usize) {
        self.max_cost = max_cost;
        self.trim(max_cost);
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len(),
            total_cost: self.total_cost,
        }
    }

    fn bump(&mut self, key: &str) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        self.order.remove(&entry.last_used);
        self.tick += 1;
        entry.last_used = self.tick;
        self.order.insert(self.tick, key.to_string());
    }

    /// Membership test; refreshes the entry's LRU position on a hit.
    pub fn contains(&mut self, key: &str) -> bool {
        if self.entries.contains_key(key) {
            self.bump(key);
            true
        } else {
            false
        }
    }

    /// Fetch a value, refreshing its LRU position and replaying any
    /// diagnostic recorded with it.
    pub fn get(&mut self, key: &str) -> Option<V> {
        if !self.entries.contains_key(key) {
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        self.bump(key);
        let entry = &self.entries[key];
        if let Some(message) = &entry.message {
            log::warn!("{message}");
        }
        Some(entry.value.clone())
    }

    pub fn insert(&mut self, key: &str, value: V, cost: usize) -> bool {
        self.insert_with_message(key, value, cost, None)
    }

    /// Insert a value together with an accumulated diagnostic that is
    /// re-surfaced whenever the entry is served from cache. Items
    /// larger than the whole budget are rejected outright.
    pub fn insert_with_message(
        &mut self,
        key: &str,
        value: V,
        cost: usize,
        message: Option<String>,
    ) -> bool {
        self.remove(key);
        if cost > self.max_cost {
            log::debug!("cache item of {cost} bytes exceeds the {} byte budget", self.max_cost);
            return false;
        }
        self.trim(self.max_cost - cost);

        self.tick += 1;
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                cost,
                last_used: self.tick,
                message,
            },
        );
        self.order.insert(self.tick, key.to_string());
        self.total_cost += cost;
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.last_used);
                self.total_cost -= entry.cost;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_cost = 0;
    }

    /// Evict least-recently-used entries until total cost is at most
    /// `budget`.
    fn trim(&mut self, budget: usize) {
        while self.total_cost > budget {
            let Some((&tick, _)) = self.order.first_key_value() else {
                break;
            };
            let Some(key) = self.order.remove(&tick) else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_cost -= entry.cost;
                self.evictions += 1;
                log::debug!("evicting cache entry {} ({} bytes)", &key[..key.len().min(16)], entry.cost);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut cache: LruCache<u32> = LruCache::new(100);
        assert!(cache.insert("a", 1, 10));
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_oversized_item_rejected() {
        let mut cache: LruCache<u32> = LruCache::new(100);
        assert!(!cache.insert("huge", 1, 101));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.total_cost(), 0);
    }

    #[test]
    fn test_cost_bound_holds_under_eviction() {
        let mut cache: LruCache<u32> = LruCache::new(100);
        for i in 0..20 {
            assert!(cache.insert(&format!("k{i}"), i, 30));
            assert!(cache.total_cost() <= 100);
        }
        assert_eq!(cache.stats().evictions, 17);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_lru_victim_is_least_recently_used() {
        let mut cache: LruCache<u32> = LruCache::new(90);
        cache.insert("a", 1, 30);
        cache.insert("b", 2, 30);
        cache.insert("c", 3, 30);
        // Touch "a" so "b" becomes the victim
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("d", 4, 30);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_contains_bumps() {
        let mut cache: LruCache<u32> = LruCache::new(60);
        cache.insert("a", 1, 30);
        cache.insert("b", 2, 30);
        assert!(cache.contains("a"));
        cache.insert("c", 3, 30);
        // "b" was least recently used once "a" was touched
        assert!(!cache.contains("b"));
        assert!(cache.contains("a"));
    }

    #[test]
    fn test_reinsert_replaces_cost() {
        let mut cache: LruCache<u32> = LruCache::new(100);
        cache.insert("a", 1, 40);
        cache.insert("a", 2, 20);
        assert_eq!(cache.total_cost(), 20);
        assert_eq!(cache.get("a"), Some(2));
    }
}
