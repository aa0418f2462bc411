// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! csgforge
//!
//! An exact CSG evaluation engine: a scripting front-end hands over a
//! tree of primitives and set operations, and the evaluator folds it
//! into exact boundary solids, with convex decomposition backing
//! Minkowski sums, fingerprint-keyed caching (optionally shared across
//! processes through a memory-mapped store), and constrained-Delaunay
//! tessellation for mesh extraction and STL export.

pub mod cache;
pub mod config;
pub mod decompose;
pub mod error;
pub mod eval;
pub mod exact;
pub mod geometry;
pub mod io;
pub mod minkowski;
pub mod tess;
pub mod tree;

pub use cache::{CacheSet, CacheStats};
pub use config::{EngineConfig, Tolerances};
pub use error::{GeometryError, GeometryResult};
pub use eval::Evaluator;
pub use exact::ExactSolid;
pub use geometry::{Geometry, Mesh, Primitive};
pub use tree::{fingerprint, CsgNode, CsgOp};

/// Evaluate a tree to a display mesh against caller-owned caches.
/// Background-tagged subtrees are excluded from boolean combination but
/// appear in the display output alongside the result.
pub fn render(config: &EngineConfig, caches: &mut CacheSet, node: &CsgNode) -> Mesh {
    let mut evaluator = Evaluator::new(config, caches);
    let mut items = vec![evaluator.evaluate(node)];

    // Background subtrees are collected from the tree, not from the
    // evaluation pass: a cached root short-circuits without revisiting
    // children, while their subtree entries stay individually cached
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        for child in &n.children {
            if child.background {
                items.push(evaluator.evaluate(child));
            }
            stack.push(child);
        }
    }

    let display = if items.len() == 1 {
        items.remove(0)
    } else {
        Geometry::List(items)
    };
    evaluator.extract_mesh(&display)
}

/// One-shot evaluation with a fresh default configuration and caches.
pub fn render_once(node: &CsgNode) -> Mesh {
    let config = EngineConfig::default();
    let mut caches = CacheSet::new(&config);
    render(&config, &mut caches, node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_basic_cube() {
        let node = CsgNode::new(CsgOp::Primitive(Primitive::Cube {
            size: Vector3::new(10.0, 10.0, 10.0),
            center: false,
        }));
        let mesh = render_once(&node);
        assert!(mesh.polygon_count() > 0);
    }

    #[test]
    fn test_background_appears_in_display_output() {
        let cube = |s: f64| {
            CsgNode::new(CsgOp::Primitive(Primitive::Cube {
                size: Vector3::new(s, s, s),
                center: false,
            }))
        };
        let moved = CsgNode::with_children(
            CsgOp::Transform(nalgebra::Matrix4::new_translation(&Vector3::new(
                10.0, 0.0, 0.0,
            ))),
            vec![cube(2.0)],
        );
        let node =
            CsgNode::with_children(CsgOp::Union, vec![cube(2.0), moved.into_background()]);

        // The background cube is outside the boolean result but still
        // part of the rendered output
        let mesh = render_once(&node);
        let stats = geometry::analytics::analyze(&mesh);
        assert!((stats.volume - 16.0).abs() < 1e-9);
        assert!((mesh.bounding_box().max.x - 12.0).abs() < 1e-9);
    }
}
