// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Spatial vertex grid for snapping near-coincident coordinates

use ahash::AHashMap;
use nalgebra::Point3;

/// Grid index that maps floating-point coordinates within a fixed
/// resolution of each other onto one shared vertex index.
///
/// Two coordinates landing in the same grid cell are treated as the same
/// vertex, which keeps accumulated rounding error from opening cracks
/// between adjacent faces.
pub struct VertexGrid {
    res: f64,
    cells: AHashMap<(i64, i64, i64), usize>,
    points: Vec<Point3<f64>>,
}

impl VertexGrid {
    pub fn new(res: f64) -> Self {
        assert!(res > 0.0, "grid resolution must be positive");
        Self {
            res,
            cells: AHashMap::new(),
            points: Vec::new(),
        }
    }

    fn key(&self, p: &Point3<f64>) -> (i64, i64, i64) {
        (
            (p.x / self.res).round() as i64,
            (p.y / self.res).round() as i64,
            (p.z / self.res).round() as i64,
        )
    }

    /// Return the index for `p`, inserting it if no existing vertex
    /// occupies the same cell. The first point to claim a cell fixes the
    /// coordinate all later aliases snap to.
    pub fn align(&mut self, p: &Point3<f64>) -> usize {
        let key = self.key(p);
        if let Some(&idx) = self.cells.get(&key) {
            return idx;
        }
        let idx = self.points.len();
        self.points.push(*p);
        self.cells.insert(key, idx);
        idx
    }

    pub fn point(&self, idx: usize) -> &Point3<f64> {
        &self.points[idx]
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snaps_nearby_points() {
        let mut grid = VertexGrid::new(1e-6);
        let a = grid.align(&Point3::new(1.0, 2.0, 3.0));
        let b = grid.align(&Point3::new(1.0 + 1e-9, 2.0 - 1e-9, 3.0));
        assert_eq!(a, b);
        assert_eq!(grid.len(), 1);
        // The stored coordinate is the first one seen
        assert_eq!(*grid.point(a), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_distinct_points_stay_distinct() {
        let mut grid = VertexGrid::new(1e-6);
        let a = grid.align(&Point3::new(0.0, 0.0, 0.0));
        let b = grid.align(&Point3::new(0.5, 0.0, 0.0));
        assert_ne!(a, b);
        assert_eq!(grid.len(), 2);
    }
}
