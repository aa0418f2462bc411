// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use csgforge::{CacheSet, CsgNode, CsgOp, EngineConfig, Evaluator, Primitive};
use nalgebra::Vector3;

fn cube(size: f64) -> CsgNode {
    CsgNode::new(CsgOp::Primitive(Primitive::Cube {
        size: Vector3::new(size, size, size),
        center: false,
    }))
}

fn carved_cube() -> CsgNode {
    CsgNode::with_children(CsgOp::Difference, vec![cube(10.0), cube(5.0)])
}

fn bench_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("primitives");

    group.bench_function("cube", |b| {
        b.iter(|| {
            Primitive::Cube {
                size: black_box(Vector3::new(10.0, 10.0, 10.0)),
                center: false,
            }
            .to_mesh()
            .unwrap()
        });
    });

    group.bench_function("sphere_32", |b| {
        b.iter(|| {
            Primitive::Sphere {
                r: black_box(10.0),
                segments: 32,
            }
            .to_mesh()
            .unwrap()
        });
    });

    group.finish();
}

fn bench_boolean(c: &mut Criterion) {
    let mut group = c.benchmark_group("boolean");
    group.sample_size(10);

    group.bench_function("cube_difference_uncached", |b| {
        let config = EngineConfig::default();
        let tree = carved_cube();
        b.iter(|| {
            // Fresh caches every iteration: full recomputation
            let mut caches = CacheSet::new(&config);
            let mut evaluator = Evaluator::new(&config, &mut caches);
            black_box(evaluator.evaluate_to_mesh(&tree))
        });
    });

    group.bench_function("cube_difference_cached", |b| {
        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let tree = carved_cube();
        let mut evaluator = Evaluator::new(&config, &mut caches);
        evaluator.evaluate(&tree);
        drop(evaluator);
        b.iter(|| {
            let mut evaluator = Evaluator::new(&config, &mut caches);
            black_box(evaluator.evaluate(&tree))
        });
    });

    group.finish();
}

fn bench_minkowski(c: &mut Criterion) {
    let mut group = c.benchmark_group("minkowski");
    group.sample_size(10);

    group.bench_function("cube_cube", |b| {
        let config = EngineConfig::default();
        let tree = CsgNode::with_children(CsgOp::Minkowski, vec![cube(10.0), cube(1.0)]);
        b.iter(|| {
            let mut caches = CacheSet::new(&config);
            let mut evaluator = Evaluator::new(&config, &mut caches);
            black_box(evaluator.evaluate_to_mesh(&tree))
        });
    });

    group.finish();
}

criterion_group!(benches, bench_primitives, bench_boolean, bench_minkowski);
criterion_main!(benches);
