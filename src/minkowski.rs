// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Minkowski sums and convex hulls over evaluated geometry
//!
//! The fast path works on floating-point vertex clouds: decompose each
//! non-convex operand into convex pieces, sum piece vertex sets
//! pairwise, hull each cloud, thin out numerically redundant hull
//! vertices and hull again, then union the per-pair results exactly.
//! Any failure abandons the float path for the current operand pair and
//! reruns it end-to-end in exact arithmetic.

use crate::config::Tolerances;
use crate::decompose::{self, ConvexPiece};
use crate::error::{GeometryError, GeometryResult};
use crate::exact::boolean::{self, BoolOp};
use crate::exact::convert::mesh_to_solid;
use crate::exact::hull::{convex_hull_2d, convex_hull_3};
use crate::exact::num::EPoint3;
use crate::exact::ExactSolid;
use crate::geometry::{Geometry, Mesh};
use nalgebra::Point3;
use rayon::prelude::*;
use std::sync::Arc;

/// One way to compute the Minkowski sum of a single operand pair.
/// Tried in order; the fallback policy is this list.
struct PairStrategy {
    name: &'static str,
    run: fn(&Geometry, &Geometry, &Tolerances) -> GeometryResult<Geometry>,
}

const PAIR_STRATEGIES: &[PairStrategy] = &[
    PairStrategy {
        name: "decomposed float hulls",
        run: run_float_pair,
    },
    PairStrategy {
        name: "exact direct",
        run: run_exact_pair,
    },
];

/// Minkowski sum of two or more operands, folded left to right.
pub fn apply_minkowski(operands: &[Geometry], tol: &Tolerances) -> GeometryResult<Geometry> {
    let mut iter = operands.iter();
    let Some(first) = iter.next() else {
        return Ok(Geometry::empty_mesh());
    };
    let mut current = first.clone();

    for operand in iter {
        let mut result = None;
        for strategy in PAIR_STRATEGIES {
            match (strategy.run)(&current, operand, tol) {
                Ok(geometry) => {
                    result = Some(geometry);
                    break;
                }
                Err(err) => {
                    log::warn!("minkowski via {} failed: {err}", strategy.name);
                }
            }
        }
        current = result.ok_or_else(|| {
            GeometryError::numerical("minkowski failed in every strategy for an operand pair")
        })?;
    }
    Ok(current)
}

/// Convex piece vertex sets of one operand, in floats. Convex meshes
/// skip the exact kernel entirely.
fn float_pieces(operand: &Geometry, tol: &Tolerances) -> GeometryResult<Vec<Vec<Point3<f64>>>> {
    if operand.dimension() != 3 {
        return Err(GeometryError::malformed(
            "minkowski is only defined for 3D operands here",
        ));
    }
    match operand {
        Geometry::Mesh(mesh) => {
            if mesh.is_convex() == Some(true) || decompose::is_weakly_convex_mesh(mesh, tol) {
                log::debug!("minkowski operand is convex; using it as a single piece");
                return Ok(vec![mesh.indexed(tol.grid).0]);
            }
            let solid = mesh_to_solid(mesh)?;
            decomposed_float_pieces(&solid, tol)
        }
        Geometry::Solid(solid) => decomposed_float_pieces(solid, tol),
        Geometry::List(_) => Err(GeometryError::malformed(
            "minkowski cannot operate on geometry groups",
        )),
    }
}

fn decomposed_float_pieces(
    solid: &ExactSolid,
    tol: &Tolerances,
) -> GeometryResult<Vec<Vec<Point3<f64>>>> {
    let pieces = decompose::decompose(solid, tol)?;
    log::debug!("minkowski operand decomposed into {} convex pieces", pieces.len());
    Ok(pieces
        .iter()
        .map(|p| p.vertices.iter().map(EPoint3::to_f64).collect())
        .collect())
}

fn run_float_pair(a: &Geometry, b: &Geometry, tol: &Tolerances) -> GeometryResult<Geometry> {
    let pa = float_pieces(a, tol)?;
    let pb = float_pieces(b, tol)?;

    let pairs: Vec<(usize, usize)> = (0..pa.len())
        .flat_map(|i| (0..pb.len()).map(move |j| (i, j)))
        .collect();

    let parts: Vec<Mesh> = pairs
        .par_iter()
        .filter_map(|&(i, j)| {
            let cloud: Vec<Point3<f64>> = pa[i]
                .iter()
                .flat_map(|p| pb[j].iter().map(move |q| Point3::new(p.x + q.x, p.y + q.y, p.z + q.z)))
                .collect();
            if cloud.len() <= 3 {
                return None;
            }
            hull_with_reduction(&cloud, tol)
        })
        .collect();

    combine_parts(parts)
}

/// First hull, then drop hull vertices that sit collinear with a
/// neighbor or in a locally coplanar cluster, then hull the survivors.
/// The second pass removes near-duplicate vertices that would trip the
/// exact union downstream.
fn hull_with_reduction(cloud: &[Point3<f64>], tol: &Tolerances) -> Option<Mesh> {
    let (points, faces) = float_hull(cloud)?;

    let rings = vertex_rings(points.len(), &faces);
    let mut strict: Vec<Point3<f64>> = Vec::new();
    for (vi, ring) in rings.iter().enumerate() {
        if ring.len() < 3 {
            strict.push(points[vi]);
            continue;
        }
        let p = points[vi];
        let scale = ring
            .iter()
            .map(|&n| (points[n] - p).norm())
            .fold(0.0f64, f64::max)
            .max(1e-30);

        let mut collinear = false;
        'outer: for x in 0..ring.len() {
            for y in x + 1..ring.len() {
                let u = points[ring[x]] - p;
                let v = points[ring[y]] - p;
                if u.cross(&v).norm() < tol.collinear * scale * scale {
                    collinear = true;
                    break 'outer;
                }
            }
        }

        let q = points[ring[0]] - p;
        let coplanar = ring.windows(2).all(|w| {
            let u = points[w[0]] - p;
            let v = points[w[1]] - p;
            q.cross(&u).dot(&v).abs() < tol.coplanar * scale * scale * scale
        });

        if !collinear && !coplanar {
            strict.push(p);
        }
    }

    let (points, faces) = if strict.len() >= 4 {
        float_hull(&strict)?
    } else {
        (points, faces)
    };

    let mut mesh = Mesh::new_3d();
    for f in faces {
        mesh.push_polygon(vec![
            points[f[0] as usize],
            points[f[1] as usize],
            points[f[2] as usize],
        ]);
    }
    mesh.set_convex(true);
    Some(mesh)
}

/// Float convex hull via parry; `None` for clouds without a full
/// 3D affine span (flat clouds contribute no volume and are skipped).
fn float_hull(cloud: &[Point3<f64>]) -> Option<(Vec<Point3<f64>>, Vec<[u32; 3]>)> {
    if cloud.len() < 4 || !has_affine_span_3(cloud) {
        log::debug!("skipping degenerate minkowski point cloud ({} points)", cloud.len());
        return None;
    }
    let input: Vec<Point3<f32>> = cloud
        .iter()
        .map(|p| Point3::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();
    let (points, faces) = parry3d::transformation::convex_hull(&input);
    let points = points
        .iter()
        .map(|p| Point3::new(p.x as f64, p.y as f64, p.z as f64))
        .collect();
    Some((points, faces))
}

/// Angle-based rank test, safely above f32 resolution so the cast to
/// parry's scalar type cannot flatten an accepted cloud.
fn has_affine_span_3(cloud: &[Point3<f64>]) -> bool {
    const SIN_TOL: f64 = 1e-5;
    let scale = cloud
        .iter()
        .flat_map(|p| p.coords.iter())
        .fold(0.0f64, |m, c| m.max(c.abs()))
        .max(1e-30);

    let origin = cloud[0];
    let mut e1: Option<nalgebra::Vector3<f64>> = None;
    let mut e2: Option<nalgebra::Vector3<f64>> = None;
    for p in &cloud[1..] {
        let v = p - origin;
        if let (Some(a), Some(b)) = (&e1, &e2) {
            let n = a.cross(b);
            if n.dot(&v).abs() > SIN_TOL * n.norm() * v.norm().max(1e-30) {
                return true;
            }
        } else if let Some(a) = &e1 {
            if a.cross(&v).norm() > SIN_TOL * a.norm() * v.norm().max(1e-30) {
                e2 = Some(v);
            }
        } else if v.norm() > SIN_TOL * scale {
            e1 = Some(v);
        }
    }
    false
}

/// Ordered neighbor ring of each vertex, walked from the triangle fan.
fn vertex_rings(vertex_count: usize, faces: &[[u32; 3]]) -> Vec<Vec<usize>> {
    let mut successor: Vec<ahash::AHashMap<usize, usize>> = vec![Default::default(); vertex_count];
    for f in faces {
        let v = [f[0] as usize, f[1] as usize, f[2] as usize];
        for i in 0..3 {
            // In triangle (a, b, c), b is followed by c around vertex a
            successor[v[i]].insert(v[(i + 1) % 3], v[(i + 2) % 3]);
        }
    }
    successor
        .iter()
        .map(|next| {
            let Some((&start, _)) = next.iter().next() else {
                return Vec::new();
            };
            let mut ring = vec![start];
            let mut cur = start;
            while let Some(&n) = next.get(&cur) {
                if n == start {
                    break;
                }
                if ring.len() > next.len() {
                    return Vec::new(); // broken fan
                }
                ring.push(n);
                cur = n;
            }
            ring
        })
        .collect()
}

/// Union per-pair hull parts. One part needs no union at all.
fn combine_parts(mut parts: Vec<Mesh>) -> GeometryResult<Geometry> {
    if parts.is_empty() {
        return Ok(Geometry::Solid(Arc::new(ExactSolid::empty(3))));
    }
    if parts.len() == 1 {
        return Ok(Geometry::Mesh(Arc::new(parts.remove(0))));
    }
    log::debug!("minkowski: unioning {} hull parts", parts.len());
    let mut acc: Option<ExactSolid> = None;
    for part in &parts {
        let solid = mesh_to_solid(part)?;
        acc = Some(match acc {
            None => solid,
            Some(current) => boolean::apply(BoolOp::Union, &current, &solid)?,
        });
    }
    Ok(Geometry::Solid(Arc::new(
        acc.unwrap_or_else(|| ExactSolid::empty(3)),
    )))
}

/// The always-correct fallback: the same decompose-and-hull pipeline in
/// exact arithmetic, with no reduction pass and no float clouds.
fn run_exact_pair(a: &Geometry, b: &Geometry, tol: &Tolerances) -> GeometryResult<Geometry> {
    let pa = exact_pieces(a, tol)?;
    let pb = exact_pieces(b, tol)?;

    let mut acc: Option<ExactSolid> = None;
    for piece_a in &pa {
        for piece_b in &pb {
            let mut cloud: Vec<EPoint3> = Vec::with_capacity(
                piece_a.vertices.len() * piece_b.vertices.len(),
            );
            for p in &piece_a.vertices {
                for q in &piece_b.vertices {
                    cloud.push(p.sum(q));
                }
            }
            if cloud.len() <= 3 {
                continue;
            }
            let Some(hull) = convex_hull_3(&cloud) else {
                log::debug!("skipping flat exact minkowski cloud");
                continue;
            };
            let part = ExactSolid::from_polygons(hull.to_polygons());
            acc = Some(match acc {
                None => part,
                Some(current) => boolean::apply(BoolOp::Union, &current, &part)?,
            });
        }
    }
    Ok(Geometry::Solid(Arc::new(
        acc.unwrap_or_else(|| ExactSolid::empty(3)),
    )))
}

fn exact_pieces(operand: &Geometry, tol: &Tolerances) -> GeometryResult<Vec<ConvexPiece>> {
    let solid = match operand {
        Geometry::Mesh(mesh) => mesh_to_solid(mesh)?,
        Geometry::Solid(solid) => solid.as_ref().clone(),
        Geometry::List(_) => {
            return Err(GeometryError::malformed(
                "minkowski cannot operate on geometry groups",
            ))
        }
    };
    if solid.dimension() != 3 {
        return Err(GeometryError::malformed(
            "minkowski is only defined for 3D operands here",
        ));
    }
    decompose::decompose(&solid, tol)
}

/// Convex hull of every child's vertices. 3D children hull in floats
/// (like the fast minkowski path); 2D children hull in the plane.
/// Children whose dimension disagrees with the first are skipped with a
/// warning.
pub fn apply_hull(children: &[Geometry], tol: &Tolerances) -> GeometryResult<Geometry> {
    let dim = children
        .iter()
        .map(Geometry::dimension)
        .find(|&d| d != 0)
        .unwrap_or(3);

    let mut points3: Vec<Point3<f64>> = Vec::new();
    for child in children {
        if child.is_empty() {
            continue;
        }
        if child.dimension() != dim {
            log::warn!("hull does not support mixing 2D and 3D children; skipping one");
            continue;
        }
        match child {
            Geometry::Mesh(mesh) => {
                points3.extend(mesh.indexed(tol.grid).0);
                for border in &mesh.borders {
                    points3.extend(border.iter().copied());
                }
            }
            Geometry::Solid(solid) => {
                for poly in solid.polygons() {
                    points3.extend(poly.points.iter().map(EPoint3::to_f64));
                }
                for seg in solid.segments() {
                    let [x, y] = seg.a.to_f64();
                    points3.push(Point3::new(x, y, 0.0));
                }
            }
            Geometry::List(_) => {
                log::warn!("hull cannot operate on geometry groups; skipping one");
            }
        }
    }

    if dim == 2 {
        let flat: Vec<[f64; 2]> = points3.iter().map(|p| [p.x, p.y]).collect();
        let ring = convex_hull_2d(&flat);
        if ring.len() < 3 {
            return Ok(Geometry::Mesh(Arc::new(Mesh::new_2d())));
        }
        let outline: Vec<Point3<f64>> =
            ring.iter().map(|p| Point3::new(p[0], p[1], 0.0)).collect();
        let mut mesh = Mesh::new_2d();
        mesh.push_polygon(outline.clone());
        mesh.push_border(outline);
        mesh.set_convex(true);
        return Ok(Geometry::Mesh(Arc::new(mesh)));
    }

    if points3.len() <= 3 {
        return Ok(Geometry::Mesh(Arc::new(Mesh::new_3d())));
    }
    let Some((points, faces)) = float_hull(&points3) else {
        return Ok(Geometry::Mesh(Arc::new(Mesh::new_3d())));
    };
    let mut mesh = Mesh::new_3d();
    for f in faces {
        mesh.push_polygon(vec![
            points[f[0] as usize],
            points[f[1] as usize],
            points[f[2] as usize],
        ]);
    }
    mesh.set_convex(true);
    Ok(Geometry::Mesh(Arc::new(mesh)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::convert::solid_to_mesh;
    use crate::geometry::{analytics, Primitive};
    use nalgebra::Vector3;

    fn tolerances() -> Tolerances {
        Tolerances::default()
    }

    fn mesh_geometry(p: Primitive) -> Geometry {
        Geometry::Mesh(Arc::new(p.to_mesh().unwrap()))
    }

    fn result_mesh(g: &Geometry) -> Mesh {
        match g {
            Geometry::Mesh(m) => m.as_ref().clone(),
            Geometry::Solid(s) => solid_to_mesh(s).unwrap(),
            Geometry::List(_) => panic!("unexpected group result"),
        }
    }

    #[test]
    fn test_minkowski_of_two_cubes() {
        let a = mesh_geometry(Primitive::Cube {
            size: Vector3::new(10.0, 10.0, 10.0),
            center: true,
        });
        let b = mesh_geometry(Primitive::Cube {
            size: Vector3::new(2.0, 2.0, 2.0),
            center: true,
        });
        let result = apply_minkowski(&[a, b], &tolerances()).unwrap();
        let mesh = result_mesh(&result);
        let stats = analytics::analyze(&mesh);
        // Two centered cubes sum to a 12-cube
        assert!((stats.volume - 1728.0).abs() < 1e-6);
        assert!(stats.bbox.approx_eq(
            &crate::geometry::BoundingBox::new(
                Point3::new(-6.0, -6.0, -6.0),
                Point3::new(6.0, 6.0, 6.0)
            ),
            1e-9
        ));
    }

    #[test]
    fn test_minkowski_sphere_dilated_by_cube() {
        let sphere_mesh = Primitive::Sphere {
            r: 5.0,
            segments: 12,
        }
        .to_mesh()
        .unwrap();
        let sphere_bbox = sphere_mesh.bounding_box();
        let sphere = Geometry::Mesh(Arc::new(sphere_mesh));
        let cube = mesh_geometry(Primitive::Cube {
            size: Vector3::new(1.0, 1.0, 1.0),
            center: false,
        });
        let result = apply_minkowski(&[sphere, cube], &tolerances()).unwrap();
        let bbox = result.bounding_box();
        // Sphere bbox dilated by the cube extents along +x/+y/+z
        assert!((bbox.min.x - sphere_bbox.min.x).abs() < 1e-4);
        assert!((bbox.min.z - sphere_bbox.min.z).abs() < 1e-4);
        assert!((bbox.max.x - (sphere_bbox.max.x + 1.0)).abs() < 1e-4);
        assert!((bbox.max.z - (sphere_bbox.max.z + 1.0)).abs() < 1e-4);
    }

    #[test]
    fn test_minkowski_single_operand_is_identity() {
        let cube = mesh_geometry(Primitive::Cube {
            size: Vector3::new(3.0, 3.0, 3.0),
            center: false,
        });
        let result = apply_minkowski(std::slice::from_ref(&cube), &tolerances()).unwrap();
        let stats = analytics::analyze(&result_mesh(&result));
        assert!((stats.volume - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_hull_of_two_cubes() {
        let a = mesh_geometry(Primitive::Cube {
            size: Vector3::new(1.0, 1.0, 1.0),
            center: false,
        });
        let mut far = Primitive::Cube {
            size: Vector3::new(1.0, 1.0, 1.0),
            center: false,
        }
        .to_mesh()
        .unwrap();
        far.transform(&nalgebra::Matrix4::new_translation(&Vector3::new(
            10.0, 0.0, 0.0,
        )));
        let b = Geometry::Mesh(Arc::new(far));

        let hull = apply_hull(&[a, b], &tolerances()).unwrap();
        let bbox = hull.bounding_box();
        assert!((bbox.max.x - 11.0).abs() < 1e-9);
        let stats = analytics::analyze(&result_mesh(&hull));
        assert!(stats.volume > 1.0);
    }

    #[test]
    fn test_hull_2d() {
        let c = mesh_geometry(Primitive::Circle {
            r: 2.0,
            segments: 16,
        });
        let hull = apply_hull(&[c], &tolerances()).unwrap();
        assert_eq!(hull.dimension(), 2);
        assert!(!hull.is_empty());
    }
}
