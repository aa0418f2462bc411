// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Linear and rotational extrusion of 2D regions

use crate::error::{GeometryError, GeometryResult};
use crate::exact::convert::region_outlines;
use crate::exact::ExactSolid;
use crate::geometry::Mesh;
use crate::tess::{self, Winding};
use crate::tree::{LinearExtrudeSpec, RotateExtrudeSpec};
use nalgebra::{Matrix4, Point3, Vector3};

/// Extrude a 2D region along +z, with optional twist and top scaling.
pub fn linear_extrude(region: &ExactSolid, spec: &LinearExtrudeSpec) -> GeometryResult<Mesh> {
    if spec.height <= 0.0 || !spec.height.is_finite() {
        return Err(GeometryError::malformed(format!(
            "linear_extrude requires a positive height, got {}",
            spec.height
        )));
    }
    if region.is_empty() {
        return Ok(Mesh::new_3d());
    }
    let outlines = region_outlines(region);
    if outlines.is_empty() {
        return Ok(Mesh::new_3d());
    }

    let z0 = if spec.center { -spec.height / 2.0 } else { 0.0 };
    let slices = spec.slices.max(1);

    // Cross-section placement at height fraction t: scale, then twist,
    // then lift. Positive twist turns clockwise seen from above.
    let slice_point = |p: [f64; 2], t: f64| -> Point3<f64> {
        let sx = 1.0 + (spec.scale[0] - 1.0) * t;
        let sy = 1.0 + (spec.scale[1] - 1.0) * t;
        let angle = (-spec.twist * t).to_radians();
        let (x, y) = (p[0] * sx, p[1] * sy);
        Point3::new(
            x * angle.cos() - y * angle.sin(),
            x * angle.sin() + y * angle.cos(),
            z0 + spec.height * t,
        )
    };

    let mut mesh = Mesh::new_3d();

    // Side walls, slice by slice
    for s in 0..slices {
        let t0 = s as f64 / slices as f64;
        let t1 = (s + 1) as f64 / slices as f64;
        for outline in &outlines {
            let n = outline.len();
            for i in 0..n {
                let (p, q) = (outline[i], outline[(i + 1) % n]);
                push_wall(
                    &mut mesh,
                    [
                        slice_point(p, t0),
                        slice_point(q, t0),
                        slice_point(q, t1),
                        slice_point(p, t1),
                    ],
                );
            }
        }
    }

    // Bottom cap faces down at t = 0
    let bottom = Matrix4::new_translation(&Vector3::new(0.0, 0.0, z0));
    mesh.merge(&tess::tessellate_region(&outlines, Winding::Down, Some(&bottom)));

    // Top cap: tessellate the transformed top cross-section
    let top_scaled = spec.scale[0] != 0.0 && spec.scale[1] != 0.0;
    if top_scaled {
        let top: Vec<Vec<[f64; 2]>> = outlines
            .iter()
            .map(|outline| {
                outline
                    .iter()
                    .map(|&p| {
                        let p3 = slice_point(p, 1.0);
                        [p3.x, p3.y]
                    })
                    .collect()
            })
            .collect();
        let lift = Matrix4::new_translation(&Vector3::new(0.0, 0.0, z0 + spec.height));
        mesh.merge(&tess::tessellate_region(&top, Winding::Up, Some(&lift)));
    }

    Ok(mesh)
}

/// Revolve a 2D region around the z axis. The region lives in the
/// xy plane with x as radial distance; points must not cross x < 0.
pub fn rotate_extrude(region: &ExactSolid, spec: &RotateExtrudeSpec) -> GeometryResult<Mesh> {
    let angle = spec.angle.clamp(0.0, 360.0);
    if angle <= 0.0 || !spec.angle.is_finite() {
        return Err(GeometryError::malformed(format!(
            "rotate_extrude requires an angle in (0, 360], got {}",
            spec.angle
        )));
    }
    if region.is_empty() {
        return Ok(Mesh::new_3d());
    }
    let outlines = region_outlines(region);
    for outline in &outlines {
        if outline.iter().any(|p| p[0] < -1e-9) {
            return Err(GeometryError::malformed(
                "rotate_extrude requires all profile points at x >= 0",
            ));
        }
    }

    let segments = spec.segments.max(3);
    let closed = angle >= 360.0;

    // One shared angle table so wrap-around seams reuse identical
    // coordinates and the result stays watertight
    let steps = segments as usize;
    let table: Vec<(f64, f64)> = (0..=steps)
        .map(|j| {
            let theta = (angle * j as f64 / steps as f64).to_radians();
            (theta.cos(), theta.sin())
        })
        .collect();
    let revolve = |p: [f64; 2], j: usize| -> Point3<f64> {
        let j = if closed && j == steps { 0 } else { j };
        let (c, s) = table[j];
        Point3::new(p[0] * c, p[0] * s, p[1])
    };

    let mut mesh = Mesh::new_3d();
    for outline in &outlines {
        let n = outline.len();
        for i in 0..n {
            let (p, q) = (outline[i], outline[(i + 1) % n]);
            for j in 0..steps {
                push_wall(
                    &mut mesh,
                    [
                        revolve(p, j),
                        revolve(p, j + 1),
                        revolve(q, j + 1),
                        revolve(q, j),
                    ],
                );
            }
        }
    }

    if !closed {
        // Flat caps at the start and end of the sweep
        let start = Matrix4::from_columns(&[
            Vector3::new(1.0, 0.0, 0.0).to_homogeneous(),
            Vector3::new(0.0, 0.0, 1.0).to_homogeneous(),
            Vector3::new(0.0, -1.0, 0.0).to_homogeneous(),
            Point3::new(0.0, 0.0, 0.0).to_homogeneous(),
        ]);
        mesh.merge(&tess::tessellate_region(&outlines, Winding::Up, Some(&start)));

        // Reuse the table entry so the cap seam matches the last wall
        // ring bit-for-bit
        let (c, s) = table[steps];
        let end = Matrix4::from_columns(&[
            Vector3::new(c, s, 0.0).to_homogeneous(),
            Vector3::new(0.0, 0.0, 1.0).to_homogeneous(),
            Vector3::new(s, -c, 0.0).to_homogeneous(),
            Point3::new(0.0, 0.0, 0.0).to_homogeneous(),
        ]);
        mesh.merge(&tess::tessellate_region(&outlines, Winding::Down, Some(&end)));
    }

    Ok(mesh)
}

/// Append a wall quad, dropping repeated corners (profile points on the
/// rotation axis, or a fully collapsed top slice).
fn push_wall(mesh: &mut Mesh, corners: [Point3<f64>; 4]) {
    let mut ring: Vec<Point3<f64>> = Vec::with_capacity(4);
    for c in corners {
        if ring.last() != Some(&c) {
            ring.push(c);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() >= 3 {
        mesh.push_polygon(ring);
    }
}
