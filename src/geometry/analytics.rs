// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Geometry statistics

use super::{BoundingBox, Mesh};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Aggregate measurements over a mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryStats {
    /// Enclosed volume (cubic units); 0 for 2D meshes.
    pub volume: f64,
    pub surface_area: f64,
    pub bbox: BoundingBox,
    pub polygon_count: usize,
    pub vertex_count: usize,
    /// True when every boundary edge is shared by exactly two polygons.
    pub is_watertight: bool,
}

impl GeometryStats {
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: BoundingBox::empty(),
            polygon_count: 0,
            vertex_count: 0,
            is_watertight: false,
        }
    }
}

/// Analyze mesh geometry. Faces are fanned from their first vertex;
/// signed contributions cancel correctly for planar rings.
pub fn analyze(mesh: &Mesh) -> GeometryStats {
    if mesh.is_empty() {
        return GeometryStats::empty();
    }

    let grid_res = crate::config::Tolerances::default().grid;
    let (points, rings) = mesh.indexed(grid_res);

    let mut volume = 0.0;
    let mut surface_area = 0.0;
    for ring in &rings {
        for w in 1..ring.len().saturating_sub(1) {
            let a = &points[ring[0]];
            let b = &points[ring[w]];
            let c = &points[ring[w + 1]];
            // Signed volume of the tetrahedron spanned with the origin
            volume += a.coords.dot(&b.coords.cross(&c.coords)) / 6.0;
            surface_area += (b - a).cross(&(c - a)).norm() / 2.0;
        }
    }

    GeometryStats {
        volume: volume.abs(),
        surface_area,
        bbox: mesh.bounding_box(),
        polygon_count: mesh.polygon_count(),
        vertex_count: points.len(),
        is_watertight: is_watertight(&rings),
    }
}

fn is_watertight(rings: &[Vec<usize>]) -> bool {
    let mut edge_count: AHashMap<(usize, usize), usize> = AHashMap::new();
    for ring in rings {
        for i in 0..ring.len() {
            let a = ring[i];
            let b = ring[(i + 1) % ring.len()];
            if a == b {
                continue;
            }
            let edge = if a < b { (a, b) } else { (b, a) };
            *edge_count.entry(edge).or_insert(0) += 1;
        }
    }
    !edge_count.is_empty() && edge_count.values().all(|&count| count == 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    #[test]
    fn test_analyze_cube() {
        let mesh = Primitive::Cube {
            size: Vector3::new(10.0, 10.0, 10.0),
            center: true,
        }
        .to_mesh()
        .unwrap();
        let stats = analyze(&mesh);

        assert!((stats.volume - 1000.0).abs() < 1e-9);
        assert!((stats.surface_area - 600.0).abs() < 1e-9);
        assert!(stats.is_watertight);
        assert_eq!(stats.vertex_count, 8);
        assert_eq!(stats.polygon_count, 6);
    }

    #[test]
    fn test_open_mesh_not_watertight() {
        let mut mesh = Mesh::new_3d();
        mesh.push_polygon(vec![
            nalgebra::Point3::new(0.0, 0.0, 0.0),
            nalgebra::Point3::new(1.0, 0.0, 0.0),
            nalgebra::Point3::new(0.0, 1.0, 0.0),
        ]);
        let stats = analyze(&mesh);
        assert!(!stats.is_watertight);
    }

    #[test]
    fn test_empty_mesh_stats() {
        let stats = analyze(&Mesh::new_3d());
        assert_eq!(stats.volume, 0.0);
        assert_eq!(stats.polygon_count, 0);
    }
}
