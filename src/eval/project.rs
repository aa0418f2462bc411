// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Projection of 3D solids onto the xy plane

use crate::error::GeometryResult;
use crate::exact::num::{EPoint2, Scalar};
use crate::exact::{boolean, ESegment, ExactSolid};
use num_traits::{Signed, Zero};
use std::cmp::Ordering;

/// Exact cross-section of a solid with the plane z = 0.
///
/// Every boundary polygon crossing the plane contributes one segment,
/// oriented so the section interior stays on its left (direction
/// `z × n` for a face with outward normal `n`). The solid being closed,
/// the segments close into loops.
pub fn projection_cut(solid: &ExactSolid) -> GeometryResult<ExactSolid> {
    let mut segments: Vec<ESegment> = Vec::new();

    for poly in solid.polygons() {
        let sides: Vec<Ordering> = poly
            .points
            .iter()
            .map(|p| {
                if p.z.is_zero() {
                    Ordering::Equal
                } else if p.z.is_positive() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            })
            .collect();
        let has_above = sides.contains(&Ordering::Greater);
        let has_below = sides.contains(&Ordering::Less);

        if !has_above && !has_below {
            // Faces lying exactly in the plane contribute through their
            // neighbors' crossings
            log::debug!("projection: skipping face coplanar with the cut plane");
            continue;
        }
        if !(has_above && has_below) {
            // Touching vertices only; no crossing segment. A vertex or
            // edge exactly in the plane is covered by the adjacent
            // spanning faces.
            continue;
        }

        // Crossing points of the polygon boundary with z = 0
        let n = poly.points.len();
        let mut hits: Vec<EPoint2> = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            let (a, b) = (&poly.points[i], &poly.points[j]);
            match (sides[i], sides[j]) {
                (Ordering::Equal, _) => {
                    hits.push(EPoint2::new(a.x.clone(), a.y.clone()));
                }
                (Ordering::Greater, Ordering::Less) | (Ordering::Less, Ordering::Greater) => {
                    let t = &a.z / (&a.z - &b.z);
                    let p = a.lerp(b, &t);
                    hits.push(EPoint2::new(p.x, p.y));
                }
                _ => {}
            }
        }
        hits.sort();
        hits.dedup();
        if hits.len() != 2 {
            log::debug!(
                "projection: face met the plane in {} points; skipping it",
                hits.len()
            );
            continue;
        }

        // Orient along z × n = (-ny, nx)
        let dir = [-poly.plane.normal[1].clone(), poly.plane.normal[0].clone()];
        let delta = [&hits[1].x - &hits[0].x, &hits[1].y - &hits[0].y];
        let along = &dir[0] * &delta[0] + &dir[1] * &delta[1];
        let (a, b) = if along.is_negative() {
            (hits[1].clone(), hits[0].clone())
        } else {
            (hits[0].clone(), hits[1].clone())
        };
        if let Some(seg) = ESegment::new(a, b) {
            segments.push(seg);
        }
    }

    Ok(ExactSolid::from_segments(segments))
}

/// Orthographic shadow: the union of all boundary faces projected onto
/// the xy plane.
pub fn projection_shadow(solid: &ExactSolid) -> GeometryResult<ExactSolid> {
    let mut acc: Option<ExactSolid> = None;

    for poly in solid.polygons() {
        // Dropping z projects the (convex) face; winding tells us which
        // way it faced
        let flat: Vec<EPoint2> = poly
            .points
            .iter()
            .map(|p| EPoint2::new(p.x.clone(), p.y.clone()))
            .collect();
        let area2 = ring_area2(&flat);
        if area2.is_zero() {
            continue; // edge-on face, no shadow area
        }
        let ordered: Vec<EPoint2> = if area2.is_negative() {
            flat.into_iter().rev().collect()
        } else {
            flat
        };

        let n = ordered.len();
        let mut segments = Vec::with_capacity(n);
        for i in 0..n {
            if let Some(seg) =
                ESegment::new(ordered[i].clone(), ordered[(i + 1) % n].clone())
            {
                segments.push(seg);
            }
        }
        let face_region = ExactSolid::from_segments(segments);

        acc = Some(match acc {
            None => face_region,
            Some(current) => {
                boolean::apply(boolean::BoolOp::Union, &current, &face_region)?
            }
        });
    }

    Ok(acc.unwrap_or_else(|| ExactSolid::empty(2)))
}

/// Twice the signed area of a 2D ring.
fn ring_area2(ring: &[EPoint2]) -> Scalar {
    let mut total = Scalar::zero();
    for i in 0..ring.len() {
        let a = &ring[i];
        let b = &ring[(i + 1) % ring.len()];
        total = total + (&a.x * &b.y - &b.x * &a.y);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::convert::{mesh_to_solid, solid_to_mesh};
    use crate::geometry::{analytics, Primitive};
    use nalgebra::{Matrix4, Vector3};

    fn centered_cube(size: f64) -> ExactSolid {
        mesh_to_solid(
            &Primitive::Cube {
                size: Vector3::new(size, size, size),
                center: true,
            }
            .to_mesh()
            .unwrap(),
        )
        .unwrap()
    }

    fn region_area(region: &ExactSolid) -> f64 {
        analytics::analyze(&solid_to_mesh(region).unwrap()).surface_area
    }

    #[test]
    fn test_cut_through_cube() {
        let cube = centered_cube(4.0);
        let section = projection_cut(&cube).unwrap();
        assert_eq!(section.dimension(), 2);
        assert!((region_area(&section) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_misses_solid() {
        let mut mesh = Primitive::Cube {
            size: Vector3::new(2.0, 2.0, 2.0),
            center: false,
        }
        .to_mesh()
        .unwrap();
        mesh.transform(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0)));
        let solid = mesh_to_solid(&mesh).unwrap();
        let section = projection_cut(&solid).unwrap();
        assert!(section.is_empty());
    }

    #[test]
    fn test_shadow_of_offset_cube() {
        // Shadow area is the footprint regardless of height offset
        let mut mesh = Primitive::Cube {
            size: Vector3::new(3.0, 2.0, 1.0),
            center: false,
        }
        .to_mesh()
        .unwrap();
        mesh.transform(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, 10.0)));
        let solid = mesh_to_solid(&mesh).unwrap();

        let shadow = projection_shadow(&solid).unwrap();
        assert_eq!(shadow.dimension(), 2);
        assert!((region_area(&shadow) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_section_forms_closed_loops() {
        let cube = centered_cube(2.0);
        let section = projection_cut(&cube).unwrap();
        let (loops, dropped) = crate::exact::planar::chain_loops(section.segments());
        assert_eq!(dropped, 0);
        assert_eq!(loops.len(), 1);
    }
}
