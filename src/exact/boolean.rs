// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Boolean combination of exact solids

use super::{bsp, convert, planar, ExactSolid};
use crate::error::{GeometryError, GeometryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    Union,
    Difference,
    Intersection,
}

impl BoolOp {
    pub fn name(&self) -> &'static str {
        match self {
            BoolOp::Union => "union",
            BoolOp::Difference => "difference",
            BoolOp::Intersection => "intersection",
        }
    }
}

/// One entry of the fallback chain: a named way to attempt the
/// operation. Strategies are tried in order; the retry policy is this
/// list, not control flow.
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(BoolOp, &ExactSolid, &ExactSolid) -> GeometryResult<ExactSolid>,
}

/// Direct clipping first; if the kernel trips on degenerate topology,
/// re-mesh both operands through grid snapping and retry once.
pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "direct",
        run: run_direct,
    },
    Strategy {
        name: "renormalized",
        run: run_renormalized,
    },
];

/// Apply `op` to two solids of the same dimension.
///
/// Empty operands follow set-algebra identities: `A ∪ ∅ = A`,
/// `A ∩ ∅ = ∅`, `A − ∅ = A`, `∅ − A = ∅`. Both strategies failing is a
/// numerical failure the caller converts to an explicit empty result
/// plus a warning.
pub fn apply(op: BoolOp, a: &ExactSolid, b: &ExactSolid) -> GeometryResult<ExactSolid> {
    // Empty-operand identities come before the dimension check, so an
    // empty operand of the wrong dimension cannot poison a fold
    if b.is_empty() {
        return match op {
            BoolOp::Union | BoolOp::Difference => Ok(a.clone()),
            BoolOp::Intersection => Ok(ExactSolid::empty(a.dimension())),
        };
    }
    if a.is_empty() {
        return match op {
            BoolOp::Union => Ok(b.clone()),
            BoolOp::Difference | BoolOp::Intersection => Ok(ExactSolid::empty(b.dimension())),
        };
    }
    if a.dimension() != b.dimension() {
        return Err(GeometryError::malformed(format!(
            "cannot combine a {}D solid with a {}D solid",
            a.dimension(),
            b.dimension()
        )));
    }

    let mut last_err = None;
    for strategy in STRATEGIES {
        match (strategy.run)(op, a, b) {
            Ok(result) => return Ok(result),
            Err(err) => {
                log::warn!(
                    "{} via {} strategy failed: {err}",
                    op.name(),
                    strategy.name
                );
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        GeometryError::numerical(format!("no strategy available for {}", op.name()))
    }))
}

fn run_direct(op: BoolOp, a: &ExactSolid, b: &ExactSolid) -> GeometryResult<ExactSolid> {
    let result = if a.dimension() == 2 {
        let (sa, sb) = (a.segments().to_vec(), b.segments().to_vec());
        let segs = match op {
            BoolOp::Union => planar::union(sa, sb),
            BoolOp::Difference => planar::difference(sa, sb),
            BoolOp::Intersection => planar::intersection(sa, sb),
        };
        ExactSolid::from_segments(segs)
    } else {
        let (pa, pb) = (a.polygons().to_vec(), b.polygons().to_vec());
        let polys = match op {
            BoolOp::Union => bsp::union(pa, pb),
            BoolOp::Difference => bsp::difference(pa, pb),
            BoolOp::Intersection => bsp::intersection(pa, pb),
        };
        ExactSolid::from_polygons(polys)
    };

    // A union of two non-empty solids can never vanish; treat that as
    // the kernel having eaten the boundary.
    if op == BoolOp::Union && result.is_empty() {
        return Err(GeometryError::numerical(
            "union of non-empty solids produced an empty boundary",
        ));
    }
    Ok(result)
}

/// Re-mesh both operands (tessellate, snap vertices to the grid,
/// rebuild the exact boundary) before retrying the direct strategy.
/// This clears slivers and near-degenerate faces left by earlier
/// operations.
fn run_renormalized(op: BoolOp, a: &ExactSolid, b: &ExactSolid) -> GeometryResult<ExactSolid> {
    let a = renormalize(a)?;
    let b = renormalize(b)?;
    run_direct(op, &a, &b)
}

fn renormalize(solid: &ExactSolid) -> GeometryResult<ExactSolid> {
    let mesh = convert::solid_to_mesh(solid)?;
    let grid_res = crate::config::Tolerances::default().grid;
    let (points, rings) = mesh.indexed(grid_res);

    let mut snapped = match solid.dimension() {
        2 => crate::geometry::Mesh::new_2d(),
        _ => crate::geometry::Mesh::new_3d(),
    };
    for ring in rings {
        let mut compact: Vec<usize> = Vec::with_capacity(ring.len());
        for idx in ring {
            if compact.last() != Some(&idx) {
                compact.push(idx);
            }
        }
        while compact.len() > 1 && compact.first() == compact.last() {
            compact.pop();
        }
        if compact.len() >= 3 {
            snapped.push_polygon(compact.into_iter().map(|i| points[i]).collect());
        }
    }
    for border in &mesh.borders {
        snapped.push_border(border.clone());
    }
    convert::mesh_to_solid(&snapped)
}
