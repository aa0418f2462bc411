// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Face and region tessellation

mod cdt;

pub use cdt::Cdt;

use ahash::AHashMap;
use nalgebra::{Matrix4, Point3, Vector3};

use crate::geometry::Mesh;

/// Requested orientation of output triangles for planar regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winding {
    /// Counter-clockwise (normal towards +z).
    Up,
    /// Clockwise (normal towards -z).
    Down,
}

/// Newell's method normal for a (possibly non-planar) ring.
pub fn newell_normal(ring: &[Point3<f64>]) -> Vector3<f64> {
    let mut n = Vector3::zeros();
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[(i + 1) % ring.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

/// Triangulate one face ring, possibly concave, possibly slightly
/// non-planar. Returns index triples into `ring`, wound like the input
/// ring. Degenerate rings yield no triangles and a debug diagnostic.
pub fn triangulate_face(ring: &[Point3<f64>]) -> Vec<[usize; 3]> {
    if ring.len() < 3 {
        return Vec::new();
    }
    if ring.len() == 3 {
        return vec![[0, 1, 2]];
    }

    let normal = newell_normal(ring);
    if normal.norm() == 0.0 {
        log::debug!("skipping degenerate face with zero-area normal");
        return Vec::new();
    }

    // Project onto the dominant-axis plane, using the cyclic coordinate
    // pair so the projected winding keeps the sign of normal·axis
    let abs = normal.map(f64::abs);
    let project: fn(&Point3<f64>) -> [f64; 2] = if abs.x >= abs.y && abs.x >= abs.z {
        |p| [p.y, p.z]
    } else if abs.y >= abs.z {
        |p| [p.z, p.x]
    } else {
        |p| [p.x, p.y]
    };
    let projected: Vec<[f64; 2]> = ring.iter().map(project).collect();

    // Mapping from the triangulator's registered (deduplicated) point
    // indices back to ring indices, mirroring its merge order
    let mut seen: AHashMap<(u64, u64), usize> = AHashMap::new();
    let mut reg_to_ring: Vec<usize> = Vec::new();
    for (ri, p) in projected.iter().enumerate() {
        let key = (p[0].to_bits(), p[1].to_bits());
        seen.entry(key).or_insert_with(|| {
            reg_to_ring.push(ri);
            reg_to_ring.len() - 1
        });
    }

    let mut cdt = Cdt::new();
    cdt.add_outline(&projected);
    let triangles = cdt.build();
    if cdt.duplicate_count() > 0 {
        log::debug!(
            "face ring contained {} duplicate vertices; merged",
            cdt.duplicate_count()
        );
    }

    let flip = signed_area_2d(&projected) < 0.0;
    triangles
        .into_iter()
        .map(|t| {
            let mapped = [reg_to_ring[t[0]], reg_to_ring[t[1]], reg_to_ring[t[2]]];
            if flip {
                [mapped[0], mapped[2], mapped[1]]
            } else {
                mapped
            }
        })
        .collect()
}

fn signed_area_2d(ring: &[[f64; 2]]) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        area += a[0] * b[1] - b[0] * a[1];
    }
    area / 2.0
}

/// Tessellate a 2D region described by outline loops (outer boundaries
/// and holes in any order; nesting is resolved by parity). Produces a
/// triangle mesh with the requested winding; an optional transform is
/// applied to the output coordinates as a post-process.
pub fn tessellate_region(
    outlines: &[Vec<[f64; 2]>],
    winding: Winding,
    post: Option<&Matrix4<f64>>,
) -> Mesh {
    let mut cdt = Cdt::new();
    for outline in outlines {
        cdt.add_outline(outline);
    }
    let triangles = cdt.build();
    if cdt.duplicate_count() > 0 {
        log::debug!(
            "region outlines contained {} duplicate vertices; merged",
            cdt.duplicate_count()
        );
    }

    let mut mesh = if post.is_some() {
        Mesh::new_3d()
    } else {
        Mesh::new_2d()
    };
    for t in triangles {
        let mut corners: Vec<Point3<f64>> = t
            .iter()
            .map(|&i| {
                let [x, y] = cdt.registered_point(i);
                Point3::new(x, y, 0.0)
            })
            .collect();
        if winding == Winding::Down {
            corners.reverse();
        }
        if let Some(m) = post {
            for c in corners.iter_mut() {
                *c = m.transform_point(c);
            }
        }
        mesh.push_polygon(corners);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangulate_quad_face() {
        let ring = vec![
            Point3::new(0.0, 0.0, 5.0),
            Point3::new(2.0, 0.0, 5.0),
            Point3::new(2.0, 2.0, 5.0),
            Point3::new(0.0, 2.0, 5.0),
        ];
        let tris = triangulate_face(&ring);
        assert_eq!(tris.len(), 2);
        // Output triangles preserve the ring's facing (+z here)
        for t in &tris {
            let n = newell_normal(&[ring[t[0]], ring[t[1]], ring[t[2]]]);
            assert!(n.z > 0.0);
        }
    }

    #[test]
    fn test_triangulate_face_down_winding() {
        let ring = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let tris = triangulate_face(&ring);
        assert_eq!(tris.len(), 2);
        for t in &tris {
            let n = newell_normal(&[ring[t[0]], ring[t[1]], ring[t[2]]]);
            assert!(n.z < 0.0);
        }
    }

    #[test]
    fn test_triangulate_vertical_face() {
        // Face in the xz plane exercises the dominant-axis projection
        let ring = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 3.0),
            Point3::new(0.0, 1.0, 3.0),
        ];
        let tris = triangulate_face(&ring);
        assert_eq!(tris.len(), 2);
        for t in &tris {
            let n = newell_normal(&[ring[t[0]], ring[t[1]], ring[t[2]]]);
            assert!(n.y < 0.0);
        }
    }

    #[test]
    fn test_degenerate_face_skipped() {
        let ring = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(triangulate_face(&ring).is_empty());
    }

    #[test]
    fn test_region_winding_and_transform() {
        let square = vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]];

        let up = tessellate_region(&square, Winding::Up, None);
        assert_eq!(up.dimension(), 2);
        let area: f64 = up
            .polygons
            .iter()
            .map(|t| {
                let n = newell_normal(t);
                assert!(n.z > 0.0);
                n.norm() / 2.0
            })
            .sum();
        assert!((area - 1.0).abs() < 1e-12);

        let lift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 7.0));
        let down = tessellate_region(&square, Winding::Down, Some(&lift));
        assert_eq!(down.dimension(), 3);
        for t in &down.polygons {
            assert!(newell_normal(t).z < 0.0);
            assert!(t.iter().all(|p| p.z == 7.0));
        }
    }
}
