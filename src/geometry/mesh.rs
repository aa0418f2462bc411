// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Polygon-soup mesh representation (display/export form)

use super::BoundingBox;
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// An ordered ring of 3D points. 2D meshes keep z = 0.
pub type Polygon = Vec<Point3<f64>>;

/// Inexact polygon soup used for display and export.
///
/// Polygons are stored as ordered point rings rather than an indexed
/// triangle list; faces may be arbitrary n-gons and are triangulated on
/// demand by the tessellator. 2D meshes additionally carry their outline
/// loops in `borders` for edge rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    dim: u32,
    pub polygons: Vec<Polygon>,
    pub borders: Vec<Polygon>,
    /// User-supplied convexity hint: an upper bound on the number of
    /// front/back transitions a ray through the solid can see. An
    /// optimization hint, not a guarantee.
    pub convexity: u32,
    /// Tri-state known-convex flag set by generators that can vouch for
    /// their output (e.g. convex hulls).
    convex: Option<bool>,
}

impl Mesh {
    pub fn new_3d() -> Self {
        Self {
            dim: 3,
            polygons: Vec::new(),
            borders: Vec::new(),
            convexity: 1,
            convex: None,
        }
    }

    pub fn new_2d() -> Self {
        Self {
            dim: 2,
            ..Self::new_3d()
        }
    }

    pub fn dimension(&self) -> u32 {
        self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty() && self.borders.is_empty()
    }

    pub fn is_convex(&self) -> Option<bool> {
        self.convex
    }

    pub fn set_convex(&mut self, convex: bool) {
        self.convex = Some(convex);
    }

    /// Begin a new (empty) polygon. Vertices are added with
    /// [`Mesh::append_vertex`].
    pub fn append_poly(&mut self) {
        self.polygons.push(Vec::new());
    }

    pub fn append_vertex(&mut self, p: Point3<f64>) {
        if let Some(poly) = self.polygons.last_mut() {
            poly.push(p);
        }
    }

    /// Add a complete polygon ring. Rings with fewer than three vertices
    /// are rejected.
    pub fn push_polygon(&mut self, poly: Polygon) {
        debug_assert!(poly.len() >= 3, "polygons require at least 3 vertices");
        if poly.len() >= 3 {
            self.polygons.push(poly);
        }
    }

    pub fn push_border(&mut self, outline: Polygon) {
        self.borders.push(outline);
    }

    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.polygons.iter().map(|p| p.len()).sum()
    }

    /// Transform all points by `matrix`. A reflecting transform (negative
    /// determinant of the linear part) reverses every ring so windings
    /// keep facing outward.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for poly in self.polygons.iter_mut().chain(self.borders.iter_mut()) {
            for p in poly.iter_mut() {
                *p = matrix.transform_point(p);
            }
        }
        let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        if linear.determinant() < 0.0 {
            for poly in self.polygons.iter_mut().chain(self.borders.iter_mut()) {
                poly.reverse();
            }
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(
            self.polygons
                .iter()
                .chain(self.borders.iter())
                .flat_map(|p| p.iter()),
        )
    }

    /// Approximate heap footprint, used as the cache cost.
    pub fn memory_size(&self) -> usize {
        let points: usize = self
            .polygons
            .iter()
            .chain(self.borders.iter())
            .map(|p| p.len())
            .sum();
        std::mem::size_of::<Self>()
            + points * std::mem::size_of::<Point3<f64>>()
            + (self.polygons.len() + self.borders.len()) * std::mem::size_of::<Polygon>()
    }

    /// Merge another mesh's polygons and borders into this one.
    pub fn merge(&mut self, other: &Mesh) {
        self.polygons.extend(other.polygons.iter().cloned());
        self.borders.extend(other.borders.iter().cloned());
        self.convexity = self.convexity.max(other.convexity);
        self.convex = None;
    }

    /// Deduplicated vertex list (grid-snapped) plus index rings.
    pub fn indexed(&self, grid_res: f64) -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
        let mut grid = super::VertexGrid::new(grid_res);
        let rings = self
            .polygons
            .iter()
            .map(|poly| poly.iter().map(|p| grid.align(p)).collect())
            .collect();
        (grid.points().to_vec(), rings)
    }
}
