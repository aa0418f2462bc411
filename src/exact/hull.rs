// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Convex hulls: exact incremental 3D hull and a planar float hull

use super::bsp::EPolygon;
use super::num::{cross3, orient3d, EPoint3};
use num_traits::Zero;
use std::cmp::Ordering;

/// Convex hull of an exact point set, as hull vertices plus oriented
/// triangular faces (outward normals).
#[derive(Debug, Clone)]
pub struct ExactHull {
    pub points: Vec<EPoint3>,
    pub faces: Vec<[usize; 3]>,
}

impl ExactHull {
    pub fn to_polygons(&self) -> Vec<EPolygon> {
        self.faces
            .iter()
            .filter_map(|f| {
                EPolygon::new(vec![
                    self.points[f[0]].clone(),
                    self.points[f[1]].clone(),
                    self.points[f[2]].clone(),
                ])
            })
            .collect()
    }

    /// The distinct vertices actually used by hull faces.
    pub fn vertices(&self) -> Vec<EPoint3> {
        let mut used: Vec<usize> = self.faces.iter().flatten().copied().collect();
        used.sort_unstable();
        used.dedup();
        used.into_iter().map(|i| self.points[i].clone()).collect()
    }
}

struct Face {
    v: [usize; 3],
    active: bool,
}

/// Incremental 3D convex hull with exact side tests. Returns `None`
/// when the input has no affine span of dimension 3 (fewer than four
/// non-coplanar points).
pub fn convex_hull_3(input: &[EPoint3]) -> Option<ExactHull> {
    let mut points: Vec<EPoint3> = input.to_vec();
    points.sort();
    points.dedup();
    if points.len() < 4 {
        return None;
    }

    let (t0, t1, t2, t3) = initial_tetrahedron(&points)?;

    let mut faces: Vec<Face> = Vec::new();
    let add_face = |faces: &mut Vec<Face>, a: usize, b: usize, c: usize| {
        faces.push(Face {
            v: [a, b, c],
            active: true,
        });
    };

    // Orient the starting tetrahedron so every face has the fourth
    // vertex behind it
    if orient3d(&points[t0], &points[t1], &points[t2], &points[t3]) == Ordering::Greater {
        add_face(&mut faces, t0, t2, t1);
        add_face(&mut faces, t0, t1, t3);
        add_face(&mut faces, t1, t2, t3);
        add_face(&mut faces, t2, t0, t3);
    } else {
        add_face(&mut faces, t0, t1, t2);
        add_face(&mut faces, t0, t3, t1);
        add_face(&mut faces, t1, t3, t2);
        add_face(&mut faces, t2, t3, t0);
    }

    for idx in 0..points.len() {
        if idx == t0 || idx == t1 || idx == t2 || idx == t3 {
            continue;
        }
        let p = points[idx].clone();

        let visible: Vec<usize> = faces
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                f.active
                    && orient3d(&points[f.v[0]], &points[f.v[1]], &points[f.v[2]], &p)
                        == Ordering::Greater
            })
            .map(|(i, _)| i)
            .collect();
        if visible.is_empty() {
            continue; // inside or on the hull surface
        }

        // Horizon: directed edges of visible faces whose reversal is not
        // an edge of another visible face
        let mut horizon: Vec<(usize, usize)> = Vec::new();
        for &fi in &visible {
            let v = faces[fi].v;
            for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
                let shared = visible.iter().any(|&other| {
                    if other == fi {
                        return false;
                    }
                    let o = faces[other].v;
                    [(o[0], o[1]), (o[1], o[2]), (o[2], o[0])].contains(&(b, a))
                });
                if !shared {
                    horizon.push((a, b));
                }
            }
        }

        for &fi in &visible {
            faces[fi].active = false;
        }
        for (a, b) in horizon {
            add_face(&mut faces, a, b, idx);
        }
    }

    let hull_faces: Vec<[usize; 3]> = faces.iter().filter(|f| f.active).map(|f| f.v).collect();
    if hull_faces.is_empty() {
        return None;
    }
    Some(ExactHull {
        points,
        faces: hull_faces,
    })
}

/// First four points with full affine span: lexicographic extremes for
/// the edge, then the first non-collinear and non-coplanar points.
fn initial_tetrahedron(points: &[EPoint3]) -> Option<(usize, usize, usize, usize)> {
    let t0 = 0;
    let t1 = points.len() - 1; // sorted: lexicographic min and max differ
    if points[t0] == points[t1] {
        return None;
    }

    let edge = points[t1].sub(&points[t0]);
    let t2 = points.iter().position(|p| {
        let c = cross3(&edge, &p.sub(&points[t0]));
        !c.iter().all(Zero::is_zero)
    })?;

    let t3 = points.iter().position(|p| {
        orient3d(&points[t0], &points[t1], &points[t2], p) != Ordering::Equal
    })?;

    Some((t0, t1, t2, t3))
}

/// Planar convex hull (Andrew's monotone chain) over float points,
/// returned in counter-clockwise order.
pub fn convex_hull_2d(input: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut pts: Vec<[f64; 2]> = input.to_vec();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: &[f64; 2], a: &[f64; 2], b: &[f64; 2]| -> f64 {
        (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
    };

    let mut lower: Vec<[f64; 2]> = Vec::new();
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<[f64; 2]> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn pt(x: f64, y: f64, z: f64) -> EPoint3 {
        EPoint3::from_f64(&Point3::new(x, y, z)).unwrap()
    }

    #[test]
    fn test_hull_of_cube_corners() {
        let mut pts = Vec::new();
        for x in [0.0, 1.0] {
            for y in [0.0, 1.0] {
                for z in [0.0, 1.0] {
                    pts.push(pt(x, y, z));
                }
            }
        }
        // An interior point must not appear as a hull vertex
        pts.push(pt(0.5, 0.5, 0.5));

        let hull = convex_hull_3(&pts).unwrap();
        assert_eq!(hull.vertices().len(), 8);
        // Every face keeps all points behind or on it
        for f in &hull.faces {
            for p in &pts {
                assert_ne!(
                    orient3d(
                        &hull.points[f[0]],
                        &hull.points[f[1]],
                        &hull.points[f[2]],
                        p
                    ),
                    Ordering::Greater
                );
            }
        }
    }

    #[test]
    fn test_hull_rejects_coplanar_cloud() {
        let pts = vec![
            pt(0.0, 0.0, 0.0),
            pt(1.0, 0.0, 0.0),
            pt(0.0, 1.0, 0.0),
            pt(1.0, 1.0, 0.0),
            pt(0.5, 0.5, 0.0),
        ];
        assert!(convex_hull_3(&pts).is_none());
    }

    #[test]
    fn test_hull_2d_square() {
        let pts = vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.5, 0.5],
        ];
        let hull = convex_hull_2d(&pts);
        assert_eq!(hull.len(), 4);
    }
}
