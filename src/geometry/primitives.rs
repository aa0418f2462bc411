// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Geometric primitive generators

use super::{Mesh, Polygon};
use crate::error::{GeometryError, GeometryResult};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Geometric primitives. Parameters arrive pre-resolved from the
/// front-end (fragment counts already computed from $fn/$fa/$fs).
#[derive(Debug, Clone)]
pub enum Primitive {
    Cube {
        size: Vector3<f64>,
        center: bool,
    },
    Sphere {
        r: f64,
        segments: u32,
    },
    Cylinder {
        h: f64,
        r1: f64,
        r2: f64,
        center: bool,
        segments: u32,
    },
    Polyhedron {
        points: Vec<Point3<f64>>,
        faces: Vec<Vec<usize>>,
        convexity: u32,
    },
    Square {
        size: [f64; 2],
        center: bool,
    },
    Circle {
        r: f64,
        segments: u32,
    },
    Polygon {
        points: Vec<[f64; 2]>,
        paths: Vec<Vec<usize>>,
        convexity: u32,
    },
}

impl Primitive {
    pub fn to_mesh(&self) -> GeometryResult<Mesh> {
        match self {
            Self::Cube { size, center } => generate_cube(*size, *center),
            Self::Sphere { r, segments } => generate_sphere(*r, *segments),
            Self::Cylinder {
                h,
                r1,
                r2,
                center,
                segments,
            } => generate_cylinder(*h, *r1, *r2, *center, *segments),
            Self::Polyhedron {
                points,
                faces,
                convexity,
            } => generate_polyhedron(points, faces, *convexity),
            Self::Square { size, center } => generate_square(*size, *center),
            Self::Circle { r, segments } => generate_circle(*r, *segments),
            Self::Polygon {
                points,
                paths,
                convexity,
            } => generate_polygon(points, paths, *convexity),
        }
    }
}

fn generate_cube(size: Vector3<f64>, center: bool) -> GeometryResult<Mesh> {
    if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) {
        return Err(GeometryError::malformed(format!(
            "cube requires positive dimensions, got [{}, {}, {}]",
            size.x, size.y, size.z
        )));
    }

    let (x0, x1, y0, y1, z0, z1) = if center {
        (
            -size.x / 2.0,
            size.x / 2.0,
            -size.y / 2.0,
            size.y / 2.0,
            -size.z / 2.0,
            size.z / 2.0,
        )
    } else {
        (0.0, size.x, 0.0, size.y, 0.0, size.z)
    };

    let corners = [
        Point3::new(x0, y0, z0),
        Point3::new(x1, y0, z0),
        Point3::new(x1, y1, z0),
        Point3::new(x0, y1, z0),
        Point3::new(x0, y0, z1),
        Point3::new(x1, y0, z1),
        Point3::new(x1, y1, z1),
        Point3::new(x0, y1, z1),
    ];

    // One quad per face, wound counter-clockwise seen from outside
    let faces: [[usize; 4]; 6] = [
        [4, 5, 6, 7], // top (z+)
        [3, 2, 1, 0], // bottom (z-)
        [0, 1, 5, 4], // front (y-)
        [2, 3, 7, 6], // back (y+)
        [1, 2, 6, 5], // right (x+)
        [3, 0, 4, 7], // left (x-)
    ];

    let mut mesh = Mesh::new_3d();
    for face in faces {
        mesh.push_polygon(face.iter().map(|&i| corners[i]).collect());
    }
    mesh.set_convex(true);
    Ok(mesh)
}

fn generate_sphere(r: f64, segments: u32) -> GeometryResult<Mesh> {
    if r <= 0.0 {
        return Err(GeometryError::malformed(format!(
            "sphere requires a positive radius, got {r}"
        )));
    }
    let segments = segments.max(3);
    let num_rings = (segments / 2).max(2);

    // Latitude rings offset by half a step so poles are polygon caps,
    // not degenerate vertices.
    let ring = |i: u32| -> Polygon {
        let phi = PI * (i as f64 + 0.5) / num_rings as f64;
        let z = r * phi.cos();
        let rr = r * phi.sin();
        (0..segments)
            .map(|j| {
                let theta = 2.0 * PI * j as f64 / segments as f64;
                Point3::new(rr * theta.cos(), rr * theta.sin(), z)
            })
            .collect()
    };

    let rings: Vec<Polygon> = (0..num_rings).map(ring).collect();

    let mut mesh = Mesh::new_3d();
    // Top cap: first ring seen from +z is counter-clockwise already
    mesh.push_polygon(rings[0].clone());
    for w in rings.windows(2) {
        let (upper, lower) = (&w[0], &w[1]);
        for j in 0..segments as usize {
            let k = (j + 1) % segments as usize;
            mesh.push_polygon(vec![upper[j], lower[j], lower[k], upper[k]]);
        }
    }
    let mut bottom = rings[num_rings as usize - 1].clone();
    bottom.reverse();
    mesh.push_polygon(bottom);
    mesh.set_convex(true);
    Ok(mesh)
}

fn generate_cylinder(
    h: f64,
    r1: f64,
    r2: f64,
    center: bool,
    segments: u32,
) -> GeometryResult<Mesh> {
    if h <= 0.0 || r1 < 0.0 || r2 < 0.0 || (r1 == 0.0 && r2 == 0.0) {
        return Err(GeometryError::malformed(format!(
            "cylinder requires positive height and a non-zero radius, got h={h}, r1={r1}, r2={r2}"
        )));
    }
    let segments = segments.max(3);
    let (z0, z1) = if center { (-h / 2.0, h / 2.0) } else { (0.0, h) };

    let circle = |r: f64, z: f64| -> Polygon {
        (0..segments)
            .map(|j| {
                let theta = 2.0 * PI * j as f64 / segments as f64;
                Point3::new(r * theta.cos(), r * theta.sin(), z)
            })
            .collect()
    };

    let mut mesh = Mesh::new_3d();
    let bottom = circle(r1, z0);
    let top = circle(r2, z1);

    for j in 0..segments as usize {
        let k = (j + 1) % segments as usize;
        match (r1 > 0.0, r2 > 0.0) {
            (true, true) => {
                mesh.push_polygon(vec![top[j], bottom[j], bottom[k], top[k]]);
            }
            (true, false) => {
                // Apex at the top: side collapses to triangles
                mesh.push_polygon(vec![Point3::new(0.0, 0.0, z1), bottom[j], bottom[k]]);
            }
            (false, true) => {
                mesh.push_polygon(vec![top[j], Point3::new(0.0, 0.0, z0), top[k]]);
            }
            (false, false) => unreachable!(),
        }
    }

    if r1 > 0.0 {
        let mut cap = bottom;
        cap.reverse();
        mesh.push_polygon(cap);
    }
    if r2 > 0.0 {
        mesh.push_polygon(top);
    }
    mesh.set_convex(true);
    Ok(mesh)
}

fn generate_polyhedron(
    points: &[Point3<f64>],
    faces: &[Vec<usize>],
    convexity: u32,
) -> GeometryResult<Mesh> {
    let mut mesh = Mesh::new_3d();
    mesh.convexity = convexity.max(1);
    for (fi, face) in faces.iter().enumerate() {
        if face.len() < 3 {
            return Err(GeometryError::malformed(format!(
                "polyhedron face {fi} has fewer than 3 vertices"
            )));
        }
        let mut poly = Polygon::with_capacity(face.len());
        for &idx in face {
            let p = points.get(idx).ok_or_else(|| {
                GeometryError::malformed(format!(
                    "polyhedron face {fi} references point {idx}, but only {} points given",
                    points.len()
                ))
            })?;
            poly.push(*p);
        }
        mesh.push_polygon(poly);
    }
    Ok(mesh)
}

fn generate_square(size: [f64; 2], center: bool) -> GeometryResult<Mesh> {
    if !(size[0] > 0.0 && size[1] > 0.0) {
        return Err(GeometryError::malformed(format!(
            "square requires positive dimensions, got [{}, {}]",
            size[0], size[1]
        )));
    }
    let (x0, x1, y0, y1) = if center {
        (-size[0] / 2.0, size[0] / 2.0, -size[1] / 2.0, size[1] / 2.0)
    } else {
        (0.0, size[0], 0.0, size[1])
    };
    let outline = vec![
        Point3::new(x0, y0, 0.0),
        Point3::new(x1, y0, 0.0),
        Point3::new(x1, y1, 0.0),
        Point3::new(x0, y1, 0.0),
    ];
    let mut mesh = Mesh::new_2d();
    mesh.push_polygon(outline.clone());
    mesh.push_border(outline);
    mesh.set_convex(true);
    Ok(mesh)
}

fn generate_circle(r: f64, segments: u32) -> GeometryResult<Mesh> {
    if r <= 0.0 {
        return Err(GeometryError::malformed(format!(
            "circle requires a positive radius, got {r}"
        )));
    }
    let segments = segments.max(3);
    let outline: Polygon = (0..segments)
        .map(|j| {
            let theta = 2.0 * PI * j as f64 / segments as f64;
            Point3::new(r * theta.cos(), r * theta.sin(), 0.0)
        })
        .collect();
    let mut mesh = Mesh::new_2d();
    mesh.push_polygon(outline.clone());
    mesh.push_border(outline);
    mesh.set_convex(true);
    Ok(mesh)
}

fn generate_polygon(
    points: &[[f64; 2]],
    paths: &[Vec<usize>],
    convexity: u32,
) -> GeometryResult<Mesh> {
    if points.len() < 3 {
        return Err(GeometryError::malformed(
            "polygon requires at least 3 points",
        ));
    }
    let mut mesh = Mesh::new_2d();
    mesh.convexity = convexity.max(1);

    // An empty path list means one implicit path over all points in order
    let implicit;
    let paths: &[Vec<usize>] = if paths.is_empty() {
        implicit = vec![(0..points.len()).collect::<Vec<_>>()];
        &implicit
    } else {
        paths
    };

    for (pi, path) in paths.iter().enumerate() {
        if path.len() < 3 {
            return Err(GeometryError::malformed(format!(
                "polygon path {pi} has fewer than 3 vertices"
            )));
        }
        let mut outline = Polygon::with_capacity(path.len());
        for &idx in path {
            let p = points.get(idx).ok_or_else(|| {
                GeometryError::malformed(format!(
                    "polygon path {pi} references point {idx}, but only {} points given",
                    points.len()
                ))
            })?;
            outline.push(Point3::new(p[0], p[1], 0.0));
        }
        mesh.push_polygon(outline.clone());
        mesh.push_border(outline);
    }
    Ok(mesh)
}
