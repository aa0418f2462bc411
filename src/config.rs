// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Engine configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Numeric tolerances used by the inexact (floating point) paths.
///
/// The exact kernel never consults these; they only govern the float
/// convex-hull reduction, the weak-convexity test and vertex snapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerances {
    /// Squared distance beyond which an edge's opposite vertex on the
    /// positive side of a face plane counts as a reflex configuration.
    pub reflex_sq: f64,
    /// Cross-product magnitude below which three hull vertices are
    /// treated as collinear during Minkowski point reduction.
    pub collinear: f64,
    /// Tetrahedron volume magnitude below which a hull vertex counts as
    /// locally coplanar with its neighborhood.
    pub coplanar: f64,
    /// Grid resolution for snapping near-coincident mesh vertices.
    pub grid: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            reflex_sq: 1e-8,
            collinear: 1e-9,
            coplanar: 1e-9,
            grid: 1e-8,
        }
    }
}

/// Settings for the optional cross-process persistent solid store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentCacheConfig {
    /// Backing file for the memory-mapped arena.
    pub path: PathBuf,
    /// Total arena size in bytes (fixed; entries are evicted, the file
    /// never grows).
    pub capacity_bytes: usize,
    /// Upper bound on waiting for the cross-process lock before the
    /// store is treated as transiently unavailable.
    pub lock_timeout_ms: u64,
}

impl PersistentCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity_bytes: 64 * 1024 * 1024,
            lock_timeout_ms: 2000,
        }
    }
}

/// Top-level engine configuration, constructed once and handed to
/// [`crate::cache::CacheSet`] and [`crate::eval::Evaluator`].
/// Fields omitted from a loaded file keep their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Byte budget of the mesh cache.
    pub geometry_cache_bytes: usize,
    /// Byte budget of the exact-solid cache.
    pub solid_cache_bytes: usize,
    /// Optional persistent backing for the solid cache.
    pub persistent: Option<PersistentCacheConfig>,
    pub tolerances: Tolerances,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            geometry_cache_bytes: 128 * 1024 * 1024,
            solid_cache_bytes: 128 * 1024 * 1024,
            persistent: None,
            tolerances: Tolerances::default(),
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = EngineConfig::default();
        assert!(cfg.geometry_cache_bytes > 0);
        assert!(cfg.persistent.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str("solid_cache_bytes = 1024").unwrap();
        assert_eq!(cfg.solid_cache_bytes, 1024);
        assert_eq!(
            cfg.geometry_cache_bytes,
            EngineConfig::default().geometry_cache_bytes
        );
        assert_eq!(cfg.tolerances.grid, Tolerances::default().grid);
    }

    #[test]
    fn test_config_roundtrip() {
        let mut cfg = EngineConfig::default();
        cfg.persistent = Some(PersistentCacheConfig::new("/tmp/solids.cache"));
        let text = toml::to_string(&cfg).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.solid_cache_bytes, cfg.solid_cache_bytes);
        assert!(back.persistent.is_some());
    }
}
