// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Conversions between inexact meshes and exact solids

use super::num::{cross3, dot3, EPoint2, EPoint3};
use super::{EPolygon, ESegment, ExactSolid};
use crate::error::{GeometryError, GeometryResult};
use crate::geometry::{Mesh, Polygon};
use crate::tess;
use nalgebra::Point3;
use num_traits::Zero;
use std::collections::BTreeMap;

/// Convert a mesh into an exact solid.
///
/// 3D meshes must be closed 2-manifolds; anything else is malformed
/// input and the offending leaf evaluates to empty geometry upstream.
pub fn mesh_to_solid(mesh: &Mesh) -> GeometryResult<ExactSolid> {
    match mesh.dimension() {
        2 => mesh_to_region(mesh),
        _ => mesh_to_polyhedron(mesh),
    }
}

fn exact_point(p: &Point3<f64>) -> GeometryResult<EPoint3> {
    EPoint3::from_f64(p)
        .ok_or_else(|| GeometryError::malformed("vertex coordinate is NaN or infinite"))
}

fn mesh_to_polyhedron(mesh: &Mesh) -> GeometryResult<ExactSolid> {
    let mut polygons: Vec<EPolygon> = Vec::new();

    for ring in &mesh.polygons {
        if ring.len() < 3 {
            continue;
        }
        // The kernel wants convex polygons; triangulate every face on
        // the way in.
        for tri in tess::triangulate_face(ring) {
            let points = vec![
                exact_point(&ring[tri[0]])?,
                exact_point(&ring[tri[1]])?,
                exact_point(&ring[tri[2]])?,
            ];
            if let Some(poly) = EPolygon::new(points) {
                polygons.push(poly);
            }
        }
    }

    if polygons.is_empty() {
        return Ok(ExactSolid::empty(3));
    }
    if !is_simple(&polygons) {
        return Err(GeometryError::malformed(
            "mesh is not a closed 2-manifold; cannot build an exact solid from it",
        ));
    }
    Ok(ExactSolid::from_polygons(polygons))
}

fn mesh_to_region(mesh: &Mesh) -> GeometryResult<ExactSolid> {
    let outlines: &[Polygon] = if mesh.borders.is_empty() {
        &mesh.polygons
    } else {
        &mesh.borders
    };

    // Orient every loop by nesting parity: outer loops run
    // counter-clockwise, holes clockwise, so the interior is always on
    // a segment's left.
    let mut segments = Vec::new();
    for (i, ring) in outlines.iter().enumerate() {
        if ring.len() < 3 {
            continue;
        }
        let mut depth = 0;
        let probe = &ring[0];
        for (j, other) in outlines.iter().enumerate() {
            if i != j && point_in_ring(probe, other) {
                depth += 1;
            }
        }
        let ccw = signed_area_2d(ring) > 0.0;
        let hole = depth % 2 == 1;
        let reverse = ccw == hole;

        let n = ring.len();
        for k in 0..n {
            let (a, b) = if reverse {
                (&ring[(k + 1) % n], &ring[k])
            } else {
                (&ring[k], &ring[(k + 1) % n])
            };
            let a = EPoint2::from_f64(a.x, a.y)
                .ok_or_else(|| GeometryError::malformed("outline coordinate is NaN or infinite"))?;
            let b = EPoint2::from_f64(b.x, b.y)
                .ok_or_else(|| GeometryError::malformed("outline coordinate is NaN or infinite"))?;
            if let Some(seg) = ESegment::new(a, b) {
                segments.push(seg);
            }
        }
    }
    Ok(ExactSolid::from_segments(segments))
}

fn signed_area_2d(ring: &Polygon) -> f64 {
    let mut area = 0.0;
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[(i + 1) % ring.len()];
        area += a.x * b.y - b.x * a.y;
    }
    area / 2.0
}

fn point_in_ring(p: &Point3<f64>, ring: &Polygon) -> bool {
    let mut inside = false;
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[(i + 1) % ring.len()];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if x > p.x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Convert an exact solid back to a display mesh.
///
/// Requires a simple (2-manifold, properly closed) boundary after
/// T-junction healing; non-simple results are reported as a numerical
/// failure so callers surface a warning instead of silently emitting
/// broken geometry.
pub fn solid_to_mesh(solid: &ExactSolid) -> GeometryResult<Mesh> {
    match solid.dimension() {
        2 => region_to_mesh(solid),
        _ => polyhedron_to_mesh(solid),
    }
}

fn polyhedron_to_mesh(solid: &ExactSolid) -> GeometryResult<Mesh> {
    if solid.is_empty() {
        return Ok(Mesh::new_3d());
    }
    let healed = heal_tjunctions(solid.polygons());
    if !is_simple(&healed) {
        return Err(GeometryError::numerical(
            "boolean result is not a simple solid; discarding it",
        ));
    }

    let mut mesh = Mesh::new_3d();
    for poly in &healed {
        let ring: Polygon = poly.points.iter().map(EPoint3::to_f64).collect();
        if ring.len() == 3 {
            mesh.push_polygon(ring);
        } else {
            for tri in tess::triangulate_face(&ring) {
                mesh.push_polygon(vec![ring[tri[0]], ring[tri[1]], ring[tri[2]]]);
            }
        }
    }
    Ok(mesh)
}

/// Closed outline loops of a 2D region, healed and chained, as float
/// rings (outer loops counter-clockwise, holes clockwise).
pub fn region_outlines(solid: &ExactSolid) -> Vec<Vec<[f64; 2]>> {
    let healed = heal_tjunctions_2d(solid.segments());
    let (loops, dropped) = super::planar::chain_loops(&healed);
    if dropped > 0 {
        log::warn!("region boundary has {dropped} unchainable segments; output may be incomplete");
    }
    loops
        .iter()
        .map(|l| l.iter().map(EPoint2::to_f64).collect())
        .collect()
}

fn region_to_mesh(solid: &ExactSolid) -> GeometryResult<Mesh> {
    if solid.is_empty() {
        return Ok(Mesh::new_2d());
    }
    let outlines = region_outlines(solid);

    let mut mesh = tess::tessellate_region(&outlines, tess::Winding::Up, None);
    for l in &outlines {
        mesh.push_border(l.iter().map(|p| Point3::new(p[0], p[1], 0.0)).collect());
    }
    Ok(mesh)
}

/// Insert vertices that lie exactly in the interior of other polygons'
/// edges, so that edge-to-edge adjacency is restored after BSP splits.
pub fn heal_tjunctions(polygons: &[EPolygon]) -> Vec<EPolygon> {
    let mut vertices: Vec<EPoint3> = polygons
        .iter()
        .flat_map(|p| p.points.iter().cloned())
        .collect();
    vertices.sort();
    vertices.dedup();
    let coarse: Vec<Point3<f64>> = vertices.iter().map(EPoint3::to_f64).collect();

    polygons
        .iter()
        .map(|poly| {
            let n = poly.points.len();
            let mut points = Vec::with_capacity(n);
            for i in 0..n {
                let a = &poly.points[i];
                let b = &poly.points[(i + 1) % n];
                points.push(a.clone());

                let (fa, fb) = (a.to_f64(), b.to_f64());
                let lo = Point3::new(
                    fa.x.min(fb.x) - 1e-9,
                    fa.y.min(fb.y) - 1e-9,
                    fa.z.min(fb.z) - 1e-9,
                );
                let hi = Point3::new(
                    fa.x.max(fb.x) + 1e-9,
                    fa.y.max(fb.y) + 1e-9,
                    fa.z.max(fb.z) + 1e-9,
                );

                let dir = b.sub(a);
                let len_sq = dot3(&dir, &dir);
                let mut on_edge: Vec<(super::num::Scalar, EPoint3)> = Vec::new();
                for (vi, v) in vertices.iter().enumerate() {
                    let c = &coarse[vi];
                    if c.x < lo.x || c.y < lo.y || c.z < lo.z {
                        continue;
                    }
                    if c.x > hi.x || c.y > hi.y || c.z > hi.z {
                        continue;
                    }
                    if v == a || v == b {
                        continue;
                    }
                    let rel = v.sub(a);
                    if !cross3(&dir, &rel).iter().all(Zero::is_zero) {
                        continue;
                    }
                    let t = dot3(&rel, &dir);
                    if t <= super::num::Scalar::zero() || t >= len_sq {
                        continue;
                    }
                    on_edge.push((t, v.clone()));
                }
                on_edge.sort_by(|x, y| x.0.cmp(&y.0));
                points.extend(on_edge.into_iter().map(|(_, v)| v));
            }
            EPolygon {
                points,
                plane: poly.plane.clone(),
            }
        })
        .collect()
}

fn heal_tjunctions_2d(segments: &[ESegment]) -> Vec<ESegment> {
    let mut vertices: Vec<EPoint2> = segments
        .iter()
        .flat_map(|s| [s.a.clone(), s.b.clone()])
        .collect();
    vertices.sort();
    vertices.dedup();

    let mut out = Vec::with_capacity(segments.len());
    for seg in segments {
        let dx = &seg.b.x - &seg.a.x;
        let dy = &seg.b.y - &seg.a.y;
        let len_sq = &dx * &dx + &dy * &dy;
        let mut cuts: Vec<(super::num::Scalar, EPoint2)> = Vec::new();
        for v in &vertices {
            if *v == seg.a || *v == seg.b {
                continue;
            }
            let rx = &v.x - &seg.a.x;
            let ry = &v.y - &seg.a.y;
            if !(&dx * &ry - &dy * &rx).is_zero() {
                continue;
            }
            let t = &rx * &dx + &ry * &dy;
            if t <= super::num::Scalar::zero() || t >= len_sq {
                continue;
            }
            cuts.push((t, v.clone()));
        }
        cuts.sort_by(|x, y| x.0.cmp(&y.0));

        let mut prev = seg.a.clone();
        for (_, v) in cuts {
            if let Some(s) = ESegment::new(prev.clone(), v.clone()) {
                out.push(s);
            }
            prev = v;
        }
        if let Some(s) = ESegment::new(prev, seg.b.clone()) {
            out.push(s);
        }
    }
    out
}

/// 2-manifold test: every directed edge occurs exactly once, and its
/// reversal occurs exactly once.
pub fn is_simple(polygons: &[EPolygon]) -> bool {
    let mut edges: BTreeMap<(&EPoint3, &EPoint3), u32> = BTreeMap::new();
    for poly in polygons {
        let n = poly.points.len();
        for i in 0..n {
            let a = &poly.points[i];
            let b = &poly.points[(i + 1) % n];
            if a == b {
                return false;
            }
            *edges.entry((a, b)).or_insert(0) += 1;
        }
    }
    edges
        .iter()
        .all(|(&(a, b), &count)| count == 1 && edges.get(&(b, a)) == Some(&1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::Vector3;

    fn cube_mesh(size: f64) -> Mesh {
        Primitive::Cube {
            size: Vector3::new(size, size, size),
            center: false,
        }
        .to_mesh()
        .unwrap()
    }

    #[test]
    fn test_cube_roundtrip_volume() {
        let solid = mesh_to_solid(&cube_mesh(10.0)).unwrap();
        assert_eq!(solid.dimension(), 3);
        assert!(!solid.is_empty());

        let back = solid_to_mesh(&solid).unwrap();
        let stats = crate::geometry::analytics::analyze(&back);
        assert!((stats.volume - 1000.0).abs() < 1e-6);
        assert!(stats.is_watertight);
    }

    #[test]
    fn test_open_mesh_rejected() {
        let mut mesh = Mesh::new_3d();
        mesh.push_polygon(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        assert!(mesh_to_solid(&mesh).is_err());
    }

    #[test]
    fn test_is_simple_detects_duplicate_face() {
        let solid = mesh_to_solid(&cube_mesh(1.0)).unwrap();
        let mut polys = solid.polygons().to_vec();
        polys.push(polys[0].clone());
        assert!(!is_simple(&polys));
    }

    #[test]
    fn test_region_conversion_orients_holes() {
        // Square with a hole, both wound counter-clockwise on input;
        // conversion must flip the hole loop.
        let outer = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ];
        let inner = vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
        ];
        let mut mesh = Mesh::new_2d();
        mesh.push_border(outer);
        mesh.push_border(inner);

        let solid = mesh_to_solid(&mesh).unwrap();
        assert_eq!(solid.segments().len(), 8);

        let back = solid_to_mesh(&solid).unwrap();
        let stats = crate::geometry::analytics::analyze(&back);
        // Triangulated area of the annulus: 16 - 4
        assert!((stats.surface_area - 12.0).abs() < 1e-9);
    }
}
