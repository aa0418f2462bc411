// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Convex decomposition of exact solids
//!
//! The common case of already-convex geometry is short-circuited by a
//! weak-convexity test (dihedral reflex check plus a single-shell flood
//! fill). Everything else goes through a BSP partition of space into
//! convex cells, keeping inside cells and rebuilding each as the convex
//! hull of its corner vertices.

use crate::config::Tolerances;
use crate::error::{GeometryError, GeometryResult};
use crate::exact::hull::{convex_hull_3, ExactHull};
use crate::exact::num::{intersect_planes, EPlane, EPoint3};
use crate::exact::{EPolygon, ExactSolid};
use crate::geometry::Mesh;
use ahash::AHashMap;
use num_traits::Signed;
use std::collections::VecDeque;

/// One convex polyhedron from a decomposition.
#[derive(Debug, Clone)]
pub struct ConvexPiece {
    pub vertices: Vec<EPoint3>,
    pub polygons: Vec<EPolygon>,
}

impl ConvexPiece {
    fn from_hull(hull: &ExactHull) -> Self {
        Self {
            vertices: hull.vertices(),
            polygons: hull.to_polygons(),
        }
    }

    fn from_boundary(polygons: &[EPolygon]) -> Self {
        let mut vertices: Vec<EPoint3> = polygons
            .iter()
            .flat_map(|p| p.points.iter().cloned())
            .collect();
        vertices.sort();
        vertices.dedup();
        Self {
            vertices,
            polygons: polygons.to_vec(),
        }
    }
}

/// Weak convexity over an indexed polygon soup: no edge may form a
/// reflex dihedral beyond the tolerance, and all faces must belong to
/// one connected shell.
pub fn is_weakly_convex_rings(
    points: &[nalgebra::Point3<f64>],
    rings: &[Vec<usize>],
    tol: &Tolerances,
) -> bool {
    if rings.is_empty() {
        return false;
    }

    // Directed edge -> vertex following the edge in its face
    let mut edge_next: AHashMap<(usize, usize), usize> = AHashMap::new();
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            let u = ring[i];
            let v = ring[(i + 1) % n];
            let w = ring[(i + 2) % n];
            if edge_next.insert((u, v), w).is_some() {
                return false; // non-manifold edge
            }
        }
    }

    for (&(u, v), &w) in &edge_next {
        // Opposite halfedge and the vertex beyond it
        let Some(&x) = edge_next.get(&(v, u)) else {
            return false; // open boundary
        };
        let (pu, pv, pw) = (&points[u], &points[v], &points[w]);
        let n = (pv - pu).cross(&(pw - pu));
        let n_len_sq = n.norm_squared();
        if n_len_sq == 0.0 {
            continue;
        }
        let d = n.dot(&(points[x] - pu));
        // Reflex edge: the far vertex pokes out past the face plane
        if d > 0.0 && d * d / n_len_sq > tol.reflex_sq {
            return false;
        }
    }

    // Single shell: every face reachable across shared edges
    let mut edge_faces: AHashMap<(usize, usize), Vec<usize>> = AHashMap::new();
    for (fi, ring) in rings.iter().enumerate() {
        let n = ring.len();
        for i in 0..n {
            let (u, v) = (ring[i], ring[(i + 1) % n]);
            let key = if u < v { (u, v) } else { (v, u) };
            edge_faces.entry(key).or_default().push(fi);
        }
    }
    let mut visited = vec![false; rings.len()];
    let mut queue = VecDeque::from([0usize]);
    visited[0] = true;
    let mut reached = 1;
    while let Some(fi) = queue.pop_front() {
        let ring = &rings[fi];
        let n = ring.len();
        for i in 0..n {
            let (u, v) = (ring[i], ring[(i + 1) % n]);
            let key = if u < v { (u, v) } else { (v, u) };
            for &other in &edge_faces[&key] {
                if !visited[other] {
                    visited[other] = true;
                    reached += 1;
                    queue.push_back(other);
                }
            }
        }
    }
    reached == rings.len()
}

/// Weak convexity of a display mesh.
pub fn is_weakly_convex_mesh(mesh: &Mesh, tol: &Tolerances) -> bool {
    let (points, rings) = mesh.indexed(tol.grid);
    is_weakly_convex_rings(&points, &rings, tol)
}

/// Weak convexity of an exact solid's boundary.
pub fn is_weakly_convex_solid(solid: &ExactSolid, tol: &Tolerances) -> bool {
    let mut grid = crate::geometry::VertexGrid::new(tol.grid);
    let rings: Vec<Vec<usize>> = solid
        .polygons()
        .iter()
        .map(|poly| poly.points.iter().map(|p| grid.align(&p.to_f64())).collect())
        .collect();
    is_weakly_convex_rings(grid.points(), &rings, tol)
}

/// Split a 3D solid into convex pieces.
///
/// Already-convex solids come back as themselves in a single piece. The
/// decomposition otherwise partitions space with the solid's own face
/// planes, discards outside volumes (the first enumerated volume is the
/// unbounded outer cell and is always skipped), and hulls each inside
/// volume's corner vertices into a clean convex polyhedron.
pub fn decompose(solid: &ExactSolid, tol: &Tolerances) -> GeometryResult<Vec<ConvexPiece>> {
    if solid.dimension() != 3 {
        return Err(GeometryError::malformed(
            "convex decomposition requires a 3D solid",
        ));
    }
    if solid.is_empty() {
        return Ok(Vec::new());
    }
    if is_weakly_convex_solid(solid, tol) {
        return Ok(vec![ConvexPiece::from_boundary(solid.polygons())]);
    }

    let tree = SolidBsp::build(solid.polygons().to_vec()).ok_or_else(|| {
        GeometryError::numerical("could not build a space partition from the boundary")
    })?;

    let bounds = enclosure_planes(solid)
        .ok_or_else(|| GeometryError::numerical("solid has non-finite bounds"))?;
    let mut pieces = Vec::new();
    // Volume 0 is the unbounded outside cell
    for volume in tree.volumes().into_iter().skip(1) {
        if !volume.inside {
            continue;
        }
        let vertices = cell_vertices(&volume.halfspaces, &bounds);
        if vertices.len() < 4 {
            log::debug!(
                "skipping degenerate decomposition cell with {} vertices",
                vertices.len()
            );
            continue;
        }
        match convex_hull_3(&vertices) {
            Some(hull) => pieces.push(ConvexPiece::from_hull(&hull)),
            None => log::debug!("skipping flat decomposition cell"),
        }
    }
    if pieces.is_empty() {
        return Err(GeometryError::numerical(
            "decomposition produced no inside volumes",
        ));
    }
    Ok(pieces)
}

/// Solid-space BSP: every leaf is a convex cell that is entirely inside
/// or outside the solid.
enum SolidBsp {
    Node {
        plane: EPlane,
        front: Box<SolidBsp>,
        back: Box<SolidBsp>,
    },
    In,
    Out,
}

/// Halfspace along a cell path: the plane plus which side the cell is
/// on (`true` = front).
type Halfspace = (EPlane, bool);

struct Volume {
    inside: bool,
    halfspaces: Vec<Halfspace>,
}

impl SolidBsp {
    fn build(polygons: Vec<EPolygon>) -> Option<Self> {
        if polygons.is_empty() {
            return None;
        }
        Some(Self::build_inner(polygons))
    }

    fn build_inner(polygons: Vec<EPolygon>) -> Self {
        let plane = polygons[0].plane.clone();
        let mut front_polys = Vec::new();
        let mut back_polys = Vec::new();
        let mut coplanar = Vec::new();
        for poly in &polygons {
            crate::exact::split_for_partition(
                &plane,
                poly,
                &mut coplanar,
                &mut front_polys,
                &mut back_polys,
            );
        }

        // Outward normals: empty front side is outside the solid, empty
        // back side is inside
        let front = if front_polys.is_empty() {
            Box::new(SolidBsp::Out)
        } else {
            Box::new(Self::build_inner(front_polys))
        };
        let back = if back_polys.is_empty() {
            Box::new(SolidBsp::In)
        } else {
            Box::new(Self::build_inner(back_polys))
        };
        SolidBsp::Node { plane, front, back }
    }

    /// Enumerate leaf cells, front-first, so the unbounded outer cell
    /// comes out at index 0.
    fn volumes(&self) -> Vec<Volume> {
        let mut result = Vec::new();
        let mut stack: Vec<(&SolidBsp, Vec<Halfspace>)> = vec![(self, Vec::new())];
        while let Some((node, path)) = stack.pop() {
            match node {
                SolidBsp::In => result.push(Volume {
                    inside: true,
                    halfspaces: path,
                }),
                SolidBsp::Out => result.push(Volume {
                    inside: false,
                    halfspaces: path,
                }),
                SolidBsp::Node { plane, front, back } => {
                    let mut front_path = path.clone();
                    front_path.push((plane.clone(), true));
                    let mut back_path = path;
                    back_path.push((plane.clone(), false));
                    // Reverse push order: front is explored first
                    stack.push((back, back_path));
                    stack.push((front, front_path));
                }
            }
        }
        result
    }
}

/// Six axis-aligned planes enclosing the solid, inflated so no cell
/// corner lands exactly on them. `None` for non-finite bounds.
fn enclosure_planes(solid: &ExactSolid) -> Option<Vec<Halfspace>> {
    use crate::exact::num::{scalar_from_f64, Scalar};
    use num_traits::{One, Zero};

    let bbox = solid.bounding_box();
    let pad = 1.0 + bbox.size().norm();
    let lo = bbox.min - nalgebra::Vector3::repeat(pad);
    let hi = bbox.max + nalgebra::Vector3::repeat(pad);

    let axis_plane = |axis: usize, value: f64| -> Option<EPlane> {
        let mut normal = [Scalar::zero(), Scalar::zero(), Scalar::zero()];
        normal[axis] = Scalar::one();
        Some(EPlane::new(normal, scalar_from_f64(value)?))
    };

    // Cells keep the back side of the hi planes and the front side of
    // the lo planes
    Some(vec![
        (axis_plane(0, lo.x)?, true),
        (axis_plane(1, lo.y)?, true),
        (axis_plane(2, lo.z)?, true),
        (axis_plane(0, hi.x)?, false),
        (axis_plane(1, hi.y)?, false),
        (axis_plane(2, hi.z)?, false),
    ])
}

/// Corner vertices of the convex cell carved by `halfspaces` within the
/// enclosure: all triple-plane intersection points that satisfy every
/// halfspace.
fn cell_vertices(halfspaces: &[Halfspace], bounds: &[Halfspace]) -> Vec<EPoint3> {
    let all: Vec<&Halfspace> = halfspaces.iter().chain(bounds.iter()).collect();
    let mut vertices = Vec::new();
    for i in 0..all.len() {
        for j in i + 1..all.len() {
            for k in j + 1..all.len() {
                let Some(p) = intersect_planes(&all[i].0, &all[j].0, &all[k].0) else {
                    continue;
                };
                let ok = all.iter().all(|(plane, front)| {
                    let v = plane.eval(&p);
                    if *front {
                        !v.is_negative()
                    } else {
                        !v.is_positive()
                    }
                });
                if ok {
                    vertices.push(p);
                }
            }
        }
    }
    vertices.sort();
    vertices.dedup();
    vertices
}
