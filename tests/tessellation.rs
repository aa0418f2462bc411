// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Tessellator area-conservation properties

use approx::assert_relative_eq;
use csgforge::geometry::analytics;
use csgforge::tess::{tessellate_region, triangulate_face, Winding};
use csgforge::{CsgNode, CsgOp, Primitive};
use nalgebra::Point3;

fn triangle_area_2d(t: &[Point3<f64>]) -> f64 {
    ((t[1].x - t[0].x) * (t[2].y - t[0].y) - (t[1].y - t[0].y) * (t[2].x - t[0].x)) / 2.0
}

#[test]
fn test_unit_square_area_is_exact() {
    let square = vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]];
    let mesh = tessellate_region(&square, Winding::Up, None);
    let area: f64 = mesh.polygons.iter().map(|t| triangle_area_2d(t)).sum();
    assert_eq!(area, 1.0);
}

#[test]
fn test_degenerate_polygon_yields_zero_triangles() {
    let flat = vec![vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]]];
    let mesh = tessellate_region(&flat, Winding::Up, None);
    assert_eq!(mesh.polygon_count(), 0);
}

#[test]
fn test_hole_area_subtracted() {
    let outlines = vec![
        vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
        vec![[2.0, 2.0], [8.0, 2.0], [8.0, 8.0], [2.0, 8.0]],
    ];
    let mesh = tessellate_region(&outlines, Winding::Up, None);
    let area: f64 = mesh.polygons.iter().map(|t| triangle_area_2d(t)).sum();
    assert_relative_eq!(area, 64.0, epsilon = 1e-12);
}

#[test]
fn test_nested_island_counts_again() {
    // Ring with an island inside the hole: 100 - 36 + 4
    let outlines = vec![
        vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
        vec![[2.0, 2.0], [8.0, 2.0], [8.0, 8.0], [2.0, 8.0]],
        vec![[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0]],
    ];
    let mesh = tessellate_region(&outlines, Winding::Up, None);
    let area: f64 = mesh.polygons.iter().map(|t| triangle_area_2d(t)).sum();
    assert!((area - 68.0).abs() < 1e-12);
}

#[test]
fn test_concave_face_triangulation_covers_face() {
    // Concave hexagon ring in 3D (an L seen from above, lifted to z=2)
    let ring = vec![
        Point3::new(0.0, 0.0, 2.0),
        Point3::new(4.0, 0.0, 2.0),
        Point3::new(4.0, 2.0, 2.0),
        Point3::new(2.0, 2.0, 2.0),
        Point3::new(2.0, 4.0, 2.0),
        Point3::new(0.0, 4.0, 2.0),
    ];
    let tris = triangulate_face(&ring);
    let area: f64 = tris
        .iter()
        .map(|t| {
            let tri = [ring[t[0]], ring[t[1]], ring[t[2]]];
            triangle_area_2d(&tri)
        })
        .sum();
    assert!((area - 12.0).abs() < 1e-12);
}

#[test]
fn test_circle_tessellation_through_evaluator() {
    let node = CsgNode::new(CsgOp::Primitive(Primitive::Circle {
        r: 10.0,
        segments: 64,
    }));
    let mesh = csgforge::render_once(&node);
    // Inscribed 64-gon area
    let expected = 0.5 * 64.0 * 100.0 * (2.0 * std::f64::consts::PI / 64.0).sin();
    let stats = analytics::analyze(&mesh);
    assert_relative_eq!(stats.surface_area, expected, epsilon = 1e-6);
    assert_eq!(mesh.dimension(), 2);
}
