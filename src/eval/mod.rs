// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! CSG tree evaluation
//!
//! Bottom-up walk with structural-fingerprint caching. A node is done
//! once its fingerprint has a cache entry; identical subtrees anywhere
//! in the tree share that entry. Failures are contained per operator:
//! a malformed leaf or a kernel failure turns into an explicit empty
//! result plus a diagnostic, and never aborts sibling subtrees.

mod extrude;
mod project;

use crate::cache::CacheSet;
use crate::config::EngineConfig;
use crate::error::{GeometryError, GeometryResult};
use crate::exact::boolean::{self, BoolOp};
use crate::exact::convert::{mesh_to_solid, solid_to_mesh};
use crate::exact::ExactSolid;
use crate::geometry::{Geometry, Mesh, Primitive};
use crate::minkowski;
use crate::tree::{fingerprint, CsgNode, CsgOp};
use std::sync::Arc;

pub struct Evaluator<'a> {
    config: &'a EngineConfig,
    caches: &'a mut CacheSet,
    background: Vec<Geometry>,
    diagnostics: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(config: &'a EngineConfig, caches: &'a mut CacheSet) -> Self {
        Self {
            config,
            caches,
            background: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Background-tagged subtrees encountered so far, retained for
    /// display outside the boolean result.
    pub fn background(&self) -> &[Geometry] {
        &self.background
    }

    /// Warnings surfaced during evaluation, in order.
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.diagnostics.push(message);
    }

    /// Evaluate a tree to geometry. Never fails: a subtree that cannot
    /// be computed yields empty geometry and a diagnostic.
    pub fn evaluate(&mut self, node: &CsgNode) -> Geometry {
        let key = fingerprint(node);
        if let Some(cached) = self.caches.geometry.get(&key) {
            return cached;
        }
        if let Some(solid) = self.caches.solids.get(&key) {
            return Geometry::Solid(solid);
        }

        let before = self.diagnostics.len();
        let result = match self.compute(node) {
            Ok(geometry) => geometry,
            Err(err) => {
                self.warn(format!("{} failed: {err}; using empty geometry", op_name(&node.op)));
                Geometry::Solid(Arc::new(ExactSolid::empty(expected_dimension(node))))
            }
        };

        // Entries remember the diagnostics produced while computing
        // them, and replay them on later cache hits
        let message = if self.diagnostics.len() > before {
            Some(self.diagnostics[before..].join("; "))
        } else {
            None
        };
        match &result {
            Geometry::Solid(solid) => {
                self.caches
                    .solids
                    .insert_with_message(&key, Arc::clone(solid), message);
            }
            _ => {
                self.caches
                    .geometry
                    .insert_with_message(&key, result.clone(), message);
            }
        }
        result
    }

    /// Evaluate and extract a display mesh.
    pub fn evaluate_to_mesh(&mut self, node: &CsgNode) -> Mesh {
        let geometry = self.evaluate(node);
        self.extract_mesh(&geometry)
    }

    /// Extract a display mesh from evaluated geometry. Extraction
    /// failures (non-simple solids) degrade to an empty mesh plus a
    /// diagnostic.
    pub fn extract_mesh(&mut self, geometry: &Geometry) -> Mesh {
        match geometry {
            Geometry::Mesh(mesh) => mesh.as_ref().clone(),
            Geometry::Solid(solid) => match solid_to_mesh(solid) {
                Ok(mesh) => mesh,
                Err(err) => {
                    self.warn(format!("mesh extraction failed: {err}; using empty mesh"));
                    Mesh::new_3d()
                }
            },
            Geometry::List(items) => {
                let mut merged = match items.first().map(Geometry::dimension) {
                    Some(2) => Mesh::new_2d(),
                    _ => Mesh::new_3d(),
                };
                for item in items {
                    merged.merge(&self.extract_mesh(item));
                }
                merged
            }
        }
    }

    fn compute(&mut self, node: &CsgNode) -> GeometryResult<Geometry> {
        match &node.op {
            CsgOp::Primitive(primitive) => {
                let mesh = primitive.to_mesh()?;
                Ok(Geometry::Mesh(Arc::new(mesh)))
            }
            CsgOp::Import { path, convexity } => {
                let mut mesh = crate::io::stl::import(path)?;
                mesh.convexity = (*convexity).max(1);
                Ok(Geometry::Mesh(Arc::new(mesh)))
            }
            CsgOp::Union => self.fold_boolean(node, BoolOp::Union),
            CsgOp::Difference => self.fold_boolean(node, BoolOp::Difference),
            CsgOp::Intersection => self.fold_boolean(node, BoolOp::Intersection),
            CsgOp::Minkowski => {
                let operands = self.evaluate_operands(node);
                if operands.is_empty() {
                    return Ok(Geometry::Solid(Arc::new(ExactSolid::empty(3))));
                }
                minkowski::apply_minkowski(&operands, &self.config.tolerances)
            }
            CsgOp::Hull => {
                let operands = self.evaluate_operands(node);
                minkowski::apply_hull(&operands, &self.config.tolerances)
            }
            CsgOp::LinearExtrude(spec) => {
                let region = self.fold_to_solid(node, BoolOp::Union, 2)?;
                let mesh = extrude::linear_extrude(&region, spec)?;
                Ok(Geometry::Mesh(Arc::new(mesh)))
            }
            CsgOp::RotateExtrude(spec) => {
                let region = self.fold_to_solid(node, BoolOp::Union, 2)?;
                let mesh = extrude::rotate_extrude(&region, spec)?;
                Ok(Geometry::Mesh(Arc::new(mesh)))
            }
            CsgOp::Projection { cut } => {
                let solid = self.fold_to_solid(node, BoolOp::Union, 3)?;
                let region = if *cut {
                    project::projection_cut(&solid)?
                } else {
                    project::projection_shadow(&solid)?
                };
                Ok(Geometry::Solid(Arc::new(region)))
            }
            CsgOp::Render { convexity: _ } => {
                // A cache barrier: force the subtree into its exact form
                let operands = self.evaluate_operands(node);
                let dim = operands
                    .iter()
                    .map(Geometry::dimension)
                    .find(|&d| d != 0)
                    .unwrap_or(3);
                let solid = self.union_operands(operands, dim)?;
                Ok(Geometry::Solid(Arc::new(solid)))
            }
            CsgOp::Transform(matrix) => {
                let operands = self.evaluate_operands(node);
                if matrix.iter().any(|v| !v.is_finite()) {
                    return Err(GeometryError::malformed(
                        "transformation matrix contains NaN or infinity; removing object",
                    ));
                }
                let dim = operands
                    .iter()
                    .map(Geometry::dimension)
                    .find(|&d| d != 0)
                    .unwrap_or(3);
                match &operands[..] {
                    [] => Ok(Geometry::Solid(Arc::new(ExactSolid::empty(dim)))),
                    [Geometry::Mesh(mesh)] => {
                        let mut moved = mesh.as_ref().clone();
                        moved.transform(matrix);
                        Ok(Geometry::Mesh(Arc::new(moved)))
                    }
                    _ => {
                        let solid = self.union_operands(operands, dim)?;
                        Ok(Geometry::Solid(Arc::new(solid.transform(matrix)?)))
                    }
                }
            }
        }
    }

    /// Evaluate every child, diverting background-tagged ones into the
    /// background collection.
    fn evaluate_operands(&mut self, node: &CsgNode) -> Vec<Geometry> {
        let mut operands = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let geometry = self.evaluate(child);
            if child.background {
                self.background.push(geometry);
            } else {
                operands.push(geometry);
            }
        }
        operands
    }

    fn fold_boolean(&mut self, node: &CsgNode, op: BoolOp) -> GeometryResult<Geometry> {
        let mut acc: Option<ExactSolid> = None;
        for child in &node.children {
            let geometry = self.evaluate(child);
            if child.background {
                self.background.push(geometry);
                continue;
            }
            // A child that cannot produce a solid participates as an
            // explicit empty, so difference and intersection keep their
            // identity semantics
            let solid = match self.child_solid(child, &geometry) {
                Ok(solid) => solid,
                Err(err) => {
                    self.warn(format!(
                        "child of {} evaluates to empty: {err}",
                        op.name()
                    ));
                    Arc::new(ExactSolid::empty(expected_dimension(child)))
                }
            };
            acc = Some(match acc {
                None => solid.as_ref().clone(),
                Some(current) => {
                    if !solid.is_empty() && current.dimension() != solid.dimension() {
                        self.warn(format!(
                            "{} cannot mix 2D and 3D children; skipping one",
                            op.name()
                        ));
                        current
                    } else {
                        boolean::apply(op, &current, &solid)?
                    }
                }
            });
        }
        let dim = acc.as_ref().map_or(3, ExactSolid::dimension);
        Ok(Geometry::Solid(Arc::new(
            acc.unwrap_or_else(|| ExactSolid::empty(dim)),
        )))
    }

    /// Union all non-background children into a solid of the given
    /// expected dimension.
    fn fold_to_solid(
        &mut self,
        node: &CsgNode,
        op: BoolOp,
        expected_dim: u32,
    ) -> GeometryResult<ExactSolid> {
        let mut acc = ExactSolid::empty(expected_dim);
        for child in &node.children {
            let geometry = self.evaluate(child);
            if child.background {
                self.background.push(geometry);
                continue;
            }
            let solid = match self.child_solid(child, &geometry) {
                Ok(solid) => solid,
                Err(err) => {
                    self.warn(format!("child of {} skipped: {err}", op.name()));
                    continue;
                }
            };
            if solid.is_empty() {
                continue;
            }
            if solid.dimension() != expected_dim {
                self.warn(format!(
                    "expected {expected_dim}D child geometry; skipping a {}D child",
                    solid.dimension()
                ));
                continue;
            }
            acc = boolean::apply(op, &acc, &solid)?;
        }
        Ok(acc)
    }

    fn union_operands(
        &mut self,
        operands: Vec<Geometry>,
        dim: u32,
    ) -> GeometryResult<ExactSolid> {
        let mut acc = ExactSolid::empty(dim);
        for geometry in operands {
            let solid = self.geometry_solid(&geometry)?;
            if solid.is_empty() {
                continue;
            }
            if solid.dimension() != dim {
                self.warn("cannot mix 2D and 3D children; skipping one".to_string());
                continue;
            }
            acc = boolean::apply(BoolOp::Union, &acc, &solid)?;
        }
        Ok(acc)
    }

    /// Exact form of an evaluated child, cached under the child's own
    /// fingerprint so repeated boolean parents pay the conversion once.
    fn child_solid(
        &mut self,
        child: &CsgNode,
        geometry: &Geometry,
    ) -> GeometryResult<Arc<ExactSolid>> {
        if let Geometry::Solid(solid) = geometry {
            return Ok(Arc::clone(solid));
        }
        let key = fingerprint(child);
        if let Some(solid) = self.caches.solids.get(&key) {
            return Ok(solid);
        }
        let solid = self.geometry_solid(geometry)?;
        self.caches.solids.insert(&key, Arc::clone(&solid));
        Ok(solid)
    }

    fn geometry_solid(&mut self, geometry: &Geometry) -> GeometryResult<Arc<ExactSolid>> {
        match geometry {
            Geometry::Solid(solid) => Ok(Arc::clone(solid)),
            Geometry::Mesh(mesh) => Ok(Arc::new(mesh_to_solid(mesh)?)),
            Geometry::List(_) => Err(GeometryError::malformed(
                "grouped geometry cannot enter a boolean combination",
            )),
        }
    }
}

fn op_name(op: &CsgOp) -> &'static str {
    match op {
        CsgOp::Union => "union",
        CsgOp::Difference => "difference",
        CsgOp::Intersection => "intersection",
        CsgOp::Minkowski => "minkowski",
        CsgOp::Hull => "hull",
        CsgOp::LinearExtrude(_) => "linear_extrude",
        CsgOp::RotateExtrude(_) => "rotate_extrude",
        CsgOp::Projection { .. } => "projection",
        CsgOp::Render { .. } => "render",
        CsgOp::Transform(_) => "transform",
        CsgOp::Primitive(_) => "primitive",
        CsgOp::Import { .. } => "import",
    }
}

fn expected_dimension(node: &CsgNode) -> u32 {
    match &node.op {
        CsgOp::Projection { .. } => 2,
        CsgOp::Primitive(
            Primitive::Square { .. } | Primitive::Circle { .. } | Primitive::Polygon { .. },
        ) => 2,
        CsgOp::Primitive(_) | CsgOp::Import { .. } => 3,
        CsgOp::LinearExtrude(_) | CsgOp::RotateExtrude(_) | CsgOp::Minkowski | CsgOp::Hull => 3,
        // Combinators take after their first child
        _ => node
            .children
            .first()
            .map(expected_dimension)
            .unwrap_or(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analytics;
    use nalgebra::{Matrix4, Vector3};

    fn cube_node(size: f64) -> CsgNode {
        CsgNode::new(CsgOp::Primitive(Primitive::Cube {
            size: Vector3::new(size, size, size),
            center: false,
        }))
    }

    fn translated(node: CsgNode, offset: [f64; 3]) -> CsgNode {
        CsgNode::with_children(
            CsgOp::Transform(Matrix4::new_translation(&Vector3::new(
                offset[0], offset[1], offset[2],
            ))),
            vec![node],
        )
    }

    fn evaluate_volume(node: &CsgNode) -> f64 {
        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(node);
        analytics::analyze(&mesh).volume
    }

    #[test]
    fn test_difference_volume() {
        let node = CsgNode::with_children(
            CsgOp::Difference,
            vec![cube_node(10.0), cube_node(5.0)],
        );
        assert!((evaluate_volume(&node) - 875.0).abs() < 1e-6);
    }

    #[test]
    fn test_bad_leaf_does_not_kill_siblings() {
        let bad = CsgNode::new(CsgOp::Primitive(Primitive::Cube {
            size: Vector3::new(-1.0, 1.0, 1.0),
            center: false,
        }));
        let node = CsgNode::with_children(CsgOp::Union, vec![bad, cube_node(2.0)]);

        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(&node);
        assert!((analytics::analyze(&mesh).volume - 8.0).abs() < 1e-9);
        assert!(!evaluator.diagnostics().is_empty());
    }

    #[test]
    fn test_background_child_excluded() {
        let node = CsgNode::with_children(
            CsgOp::Union,
            vec![
                cube_node(2.0),
                translated(cube_node(2.0), [10.0, 0.0, 0.0]).into_background(),
            ],
        );

        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(&node);
        // Only the foreground cube contributes to the result
        assert!((analytics::analyze(&mesh).volume - 8.0).abs() < 1e-9);
        assert_eq!(evaluator.background().len(), 1);
    }

    #[test]
    fn test_transform_nan_warns_and_empties() {
        let mut bad = Matrix4::identity();
        bad[(0, 3)] = f64::NAN;
        let node = CsgNode::with_children(CsgOp::Transform(bad), vec![cube_node(1.0)]);

        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(&node);
        assert!(mesh.is_empty());
        assert!(!evaluator.diagnostics().is_empty());
    }

    #[test]
    fn test_repeated_evaluation_hits_cache() {
        let node = CsgNode::with_children(
            CsgOp::Difference,
            vec![cube_node(10.0), cube_node(5.0)],
        );

        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);

        let mut evaluator = Evaluator::new(&config, &mut caches);
        let first = evaluator.evaluate(&node);
        drop(evaluator);
        let misses_after_first = caches.solids.stats().misses;

        let mut evaluator = Evaluator::new(&config, &mut caches);
        let second = evaluator.evaluate(&node);
        drop(evaluator);
        let stats = caches.solids.stats();

        // Second pass is answered from cache: no new misses, one hit
        assert_eq!(stats.misses, misses_after_first);
        assert!(stats.hits >= 1);
        assert!(!first.is_empty() && !second.is_empty());
    }

    #[test]
    fn test_shared_subtree_shares_cache_entry() {
        let shared = cube_node(3.0);
        let node = CsgNode::with_children(
            CsgOp::Union,
            vec![shared.clone(), translated(shared, [10.0, 0.0, 0.0])],
        );

        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(&node);
        assert!((analytics::analyze(&mesh).volume - 54.0).abs() < 1e-6);
        // The second occurrence of the identical cube was a cache hit
        assert!(caches.geometry.stats().hits >= 1);
    }

    #[test]
    fn test_linear_extrude_through_evaluator() {
        let square = CsgNode::new(CsgOp::Primitive(Primitive::Square {
            size: [2.0, 2.0],
            center: false,
        }));
        let node = CsgNode::with_children(
            CsgOp::LinearExtrude(crate::tree::LinearExtrudeSpec {
                height: 5.0,
                ..Default::default()
            }),
            vec![square],
        );
        assert!((evaluate_volume(&node) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_cut_through_evaluator() {
        let cube = CsgNode::new(CsgOp::Primitive(Primitive::Cube {
            size: Vector3::new(4.0, 4.0, 4.0),
            center: true,
        }));
        let node = CsgNode::with_children(CsgOp::Projection { cut: true }, vec![cube]);

        let config = EngineConfig::default();
        let mut caches = CacheSet::new(&config);
        let mut evaluator = Evaluator::new(&config, &mut caches);
        let mesh = evaluator.evaluate_to_mesh(&node);
        assert_eq!(mesh.dimension(), 2);
        assert!((analytics::analyze(&mesh).surface_area - 16.0).abs() < 1e-9);
    }
}
