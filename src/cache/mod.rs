// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Evaluation caches

mod lru;
pub mod persistent;

pub use lru::{CacheStats, LruCache};
pub use persistent::PersistentStore;

use crate::config::EngineConfig;
use crate::exact::ExactSolid;
use crate::geometry::Geometry;
use std::sync::Arc;

/// Cache for display geometry (meshes and groups), keyed by subtree
/// fingerprints.
pub struct GeometryCache {
    lru: LruCache<Geometry>,
}

impl GeometryCache {
    pub fn new(max_cost: usize) -> Self {
        Self {
            lru: LruCache::new(max_cost),
        }
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.lru.contains(key)
    }

    pub fn get(&mut self, key: &str) -> Option<Geometry> {
        self.lru.get(key)
    }

    pub fn insert(&mut self, key: &str, geometry: Geometry) -> bool {
        let cost = geometry.memory_size();
        self.lru.insert(key, geometry, cost)
    }

    pub fn insert_with_message(
        &mut self,
        key: &str,
        geometry: Geometry,
        message: Option<String>,
    ) -> bool {
        let cost = geometry.memory_size();
        self.lru.insert_with_message(key, geometry, cost, message)
    }

    pub fn stats(&self) -> CacheStats {
        self.lru.stats()
    }

    pub fn set_max_cost(&mut self, max_cost: usize) {
        self.lru.set_max_cost(max_cost);
    }

    pub fn clear(&mut self) {
        self.lru.clear();
    }
}

/// Cache for exact solids, optionally backed by a cross-process
/// persistent store. A miss in memory consults the store; a hit there
/// is promoted into memory and counts as a hit overall. Inserts write
/// through to both. Store failures (lock timeouts, pool exhaustion)
/// degrade to memory-only caching with a log line, never an error.
pub struct SolidCache {
    lru: LruCache<Arc<ExactSolid>>,
    store: Option<PersistentStore>,
    promotions: u64,
}

impl SolidCache {
    pub fn new(max_cost: usize, store: Option<PersistentStore>) -> Self {
        Self {
            lru: LruCache::new(max_cost),
            store,
            promotions: 0,
        }
    }

    pub fn contains(&mut self, key: &str) -> bool {
        if self.lru.contains(key) {
            return true;
        }
        match self.store.as_mut().map(|s| s.contains(key)) {
            Some(Ok(found)) => found,
            Some(Err(err)) => {
                log::warn!("persistent cache unavailable: {err}");
                false
            }
            None => false,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<Arc<ExactSolid>> {
        if let Some(solid) = self.lru.get(key) {
            return Some(solid);
        }
        let from_store = match self.store.as_mut().map(|s| s.get(key)) {
            Some(Ok(found)) => found,
            Some(Err(err)) => {
                log::warn!("persistent cache unavailable: {err}");
                None
            }
            None => None,
        };
        from_store.map(|solid| {
            let solid = Arc::new(solid);
            let cost = solid.memory_size();
            self.lru.insert(key, Arc::clone(&solid), cost);
            self.promotions += 1;
            solid
        })
    }

    pub fn insert(&mut self, key: &str, solid: Arc<ExactSolid>) -> bool {
        self.insert_with_message(key, solid, None)
    }

    pub fn insert_with_message(
        &mut self,
        key: &str,
        solid: Arc<ExactSolid>,
        message: Option<String>,
    ) -> bool {
        let cost = solid.memory_size();
        let stored = self
            .lru
            .insert_with_message(key, Arc::clone(&solid), cost, message);
        if let Some(store) = self.store.as_mut() {
            match store.insert(key, &solid) {
                Ok(false) => log::debug!("solid did not fit the persistent pool"),
                Ok(true) => {}
                Err(err) => log::warn!("persistent cache unavailable: {err}"),
            }
        }
        stored
    }

    pub fn stats(&self) -> CacheStats {
        self.lru.stats()
    }

    pub fn promotions(&self) -> u64 {
        self.promotions
    }

    pub fn set_max_cost(&mut self, max_cost: usize) {
        self.lru.set_max_cost(max_cost);
    }

    /// Drop the in-memory entries. The persistent store is untouched;
    /// its entries age out through their own LRU.
    pub fn clear(&mut self) {
        self.lru.clear();
    }

    pub fn has_persistent_store(&self) -> bool {
        self.store.is_some()
    }
}

/// The caches one evaluation pipeline works against. Constructed once
/// by the embedder and passed to the evaluator and Minkowski engine;
/// there are no process-wide cache singletons.
pub struct CacheSet {
    pub geometry: GeometryCache,
    pub solids: SolidCache,
}

impl CacheSet {
    pub fn new(config: &EngineConfig) -> Self {
        let store = config.persistent.as_ref().and_then(|cfg| {
            match PersistentStore::open(cfg) {
                Ok(store) => Some(store),
                Err(err) => {
                    log::warn!(
                        "persistent cache at {} could not be opened ({err}); continuing memory-only",
                        cfg.path.display()
                    );
                    None
                }
            }
        });
        Self {
            geometry: GeometryCache::new(config.geometry_cache_bytes),
            solids: SolidCache::new(config.solid_cache_bytes, store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistentCacheConfig;
    use crate::exact::convert::mesh_to_solid;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn cube_solid() -> Arc<ExactSolid> {
        Arc::new(
            mesh_to_solid(
                &Primitive::Cube {
                    size: Vector3::new(1.0, 1.0, 1.0),
                    center: false,
                }
                .to_mesh()
                .unwrap(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_cache_set_without_store() {
        let mut caches = CacheSet::new(&EngineConfig::default());
        assert!(!caches.solids.has_persistent_store());
        assert!(caches.solids.get("missing").is_none());
        assert!(caches.solids.insert("cube", cube_solid()));
        assert!(caches.solids.contains("cube"));
    }

    #[test]
    fn test_persistent_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PersistentCacheConfig {
            path: dir.path().join("solids.cache"),
            capacity_bytes: 2 * 1024 * 1024,
            lock_timeout_ms: 500,
        };

        let mut config = EngineConfig::default();
        config.persistent = Some(cfg);

        // First cache set writes through to the store
        let mut first = CacheSet::new(&config);
        assert!(first.solids.has_persistent_store());
        first.solids.insert("shared-cube", cube_solid());
        drop(first);

        // A fresh cache set (empty memory cache) finds it in the store
        let mut second = CacheSet::new(&config);
        let found = second.solids.get("shared-cube");
        assert!(found.is_some());
        assert_eq!(second.solids.promotions(), 1);
        // Promoted: the next lookup hits memory
        assert!(second.solids.get("shared-cube").is_some());
        assert_eq!(second.solids.stats().hits, 1);
    }
}
