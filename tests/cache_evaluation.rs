// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Caching behavior across whole evaluations

use csgforge::geometry::analytics;
use csgforge::{CacheSet, CsgNode, CsgOp, EngineConfig, Evaluator, Primitive};
use nalgebra::Vector3;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cube(size: f64) -> CsgNode {
    CsgNode::new(CsgOp::Primitive(Primitive::Cube {
        size: Vector3::new(size, size, size),
        center: false,
    }))
}

fn carved_cube() -> CsgNode {
    CsgNode::with_children(CsgOp::Difference, vec![cube(10.0), cube(5.0)])
}

#[test]
fn test_second_evaluation_is_a_cache_hit() {
    init_logging();
    let config = EngineConfig::default();
    let mut caches = CacheSet::new(&config);
    let tree = carved_cube();

    let first = {
        let mut evaluator = Evaluator::new(&config, &mut caches);
        evaluator.evaluate_to_mesh(&tree)
    };
    let after_first = caches.solids.stats();

    let second = {
        let mut evaluator = Evaluator::new(&config, &mut caches);
        evaluator.evaluate_to_mesh(&tree)
    };
    let after_second = caches.solids.stats();

    // No recomputation: the root fingerprint answered from cache
    assert_eq!(after_second.misses, after_first.misses);
    assert_eq!(after_second.hits, after_first.hits + 1);

    // cube(10) minus cube(5) sharing a corner: 1000 - 125
    assert!((analytics::analyze(&first).volume - 875.0).abs() < 1e-6);
    assert!((analytics::analyze(&second).volume - 875.0).abs() < 1e-6);
}

#[test]
fn test_identical_trees_share_fingerprints() {
    let a = carved_cube();
    let b = carved_cube();
    assert_eq!(csgforge::fingerprint(&a), csgforge::fingerprint(&b));
}

#[test]
fn test_tight_cache_budget_still_correct() {
    // A cache too small for the solids forces recomputation but never
    // wrong results
    let config = EngineConfig {
        geometry_cache_bytes: 512,
        solid_cache_bytes: 512,
        ..EngineConfig::default()
    };
    let mut caches = CacheSet::new(&config);
    let tree = carved_cube();

    for _ in 0..2 {
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(&tree);
        assert!((analytics::analyze(&mesh).volume - 875.0).abs() < 1e-6);
    }
    assert!(caches.solids.stats().total_cost <= 512);
}

#[test]
fn test_clear_forces_recomputation() {
    let config = EngineConfig::default();
    let mut caches = CacheSet::new(&config);
    let tree = carved_cube();

    {
        let mut evaluator = Evaluator::new(&config, &mut caches);
        evaluator.evaluate_to_mesh(&tree);
    }
    caches.solids.clear();
    caches.geometry.clear();
    assert_eq!(caches.solids.stats().entries, 0);

    let mut evaluator = Evaluator::new(&config, &mut caches);
    let mesh = evaluator.evaluate_to_mesh(&tree);
    drop(evaluator);
    assert!((analytics::analyze(&mesh).volume - 875.0).abs() < 1e-6);
    assert!(caches.solids.stats().entries > 0);
}

#[test]
fn test_persistent_store_shared_between_cache_sets() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.persistent = Some(csgforge::config::PersistentCacheConfig {
        path: dir.path().join("solids.cache"),
        capacity_bytes: 8 * 1024 * 1024,
        lock_timeout_ms: 1000,
    });
    let tree = carved_cube();

    // First run fills the store
    {
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        evaluator.evaluate_to_mesh(&tree);
        assert!(caches.solids.has_persistent_store());
    }

    // A fresh cache set with empty memory promotes from the store
    let mut caches = CacheSet::new(&config);
    let mut evaluator = Evaluator::new(&config, &mut caches);
    let mesh = evaluator.evaluate_to_mesh(&tree);
    drop(evaluator);
    assert!((analytics::analyze(&mesh).volume - 875.0).abs() < 1e-6);
    assert!(caches.solids.promotions() >= 1);
}
