// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Exact BSP clipping for 3D boundary polygons

use super::num::{EPlane, EPoint3, Scalar};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Convex boundary polygon with its exact supporting plane. The kernel
/// only ever constructs convex polygons (input faces are triangulated
/// before entering the kernel, and plane splits preserve convexity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EPolygon {
    pub points: Vec<EPoint3>,
    pub plane: EPlane,
}

impl EPolygon {
    /// Build a polygon, deriving the plane from the first non-degenerate
    /// vertex triple. `None` when all vertices are collinear.
    pub fn new(points: Vec<EPoint3>) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let mut plane = None;
        for i in 1..points.len() - 1 {
            if let Some(p) = EPlane::from_points(&points[0], &points[i], &points[i + 1]) {
                plane = Some(p);
                break;
            }
        }
        plane.map(|plane| Self { points, plane })
    }

    pub fn flip(&mut self) {
        self.points.reverse();
        self.plane = self.plane.flipped();
    }
}

/// Distribute `polygon` across `plane`.
///
/// Coplanar polygons go to the coplanar bucket matching their facing;
/// spanning polygons are split exactly, with intersection vertices
/// interpolated at the rational crossing parameter.
fn split_polygon(
    plane: &EPlane,
    polygon: &EPolygon,
    coplanar_front: &mut Vec<EPolygon>,
    coplanar_back: &mut Vec<EPolygon>,
    front: &mut Vec<EPolygon>,
    back: &mut Vec<EPolygon>,
) {
    let sides: Vec<Ordering> = polygon.points.iter().map(|p| plane.side(p)).collect();
    let has_front = sides.contains(&Ordering::Greater);
    let has_back = sides.contains(&Ordering::Less);

    match (has_front, has_back) {
        (false, false) => {
            // Entirely on the plane: bucket by facing
            let dot = super::num::dot3(&plane.normal, &polygon.plane.normal);
            if dot.is_zero() || dot > Scalar::zero() {
                coplanar_front.push(polygon.clone());
            } else {
                coplanar_back.push(polygon.clone());
            }
        }
        (true, false) => front.push(polygon.clone()),
        (false, true) => back.push(polygon.clone()),
        (true, true) => {
            let mut f: Vec<EPoint3> = Vec::new();
            let mut b: Vec<EPoint3> = Vec::new();
            let n = polygon.points.len();
            for i in 0..n {
                let j = (i + 1) % n;
                let (vi, vj) = (&polygon.points[i], &polygon.points[j]);
                match sides[i] {
                    Ordering::Greater => f.push(vi.clone()),
                    Ordering::Less => b.push(vi.clone()),
                    Ordering::Equal => {
                        f.push(vi.clone());
                        b.push(vi.clone());
                    }
                }
                if (sides[i] == Ordering::Greater && sides[j] == Ordering::Less)
                    || (sides[i] == Ordering::Less && sides[j] == Ordering::Greater)
                {
                    let di = plane.eval(vi);
                    let dj = plane.eval(vj);
                    // di and dj have opposite signs, so the denominator
                    // is nonzero and t lies strictly inside (0, 1)
                    let t = &di / (&di - &dj);
                    let v = vi.lerp(vj, &t);
                    f.push(v.clone());
                    b.push(v);
                }
            }
            if f.len() >= 3 {
                front.push(EPolygon {
                    points: f,
                    plane: polygon.plane.clone(),
                });
            }
            if b.len() >= 3 {
                back.push(EPolygon {
                    points: b,
                    plane: polygon.plane.clone(),
                });
            }
        }
    }
}

/// Split variant for space partitioning: both coplanar buckets land in
/// one list, which partition builders absorb at the node.
pub fn split_for_partition(
    plane: &EPlane,
    polygon: &EPolygon,
    coplanar: &mut Vec<EPolygon>,
    front: &mut Vec<EPolygon>,
    back: &mut Vec<EPolygon>,
) {
    let mut coplanar_back = Vec::new();
    split_polygon(plane, polygon, coplanar, &mut coplanar_back, front, back);
    coplanar.append(&mut coplanar_back);
}

/// BSP node over boundary polygons, in the classic clip-and-merge form.
#[derive(Debug, Default)]
pub struct BspNode {
    plane: Option<EPlane>,
    front: Option<Box<BspNode>>,
    back: Option<Box<BspNode>>,
    polygons: Vec<EPolygon>,
}

impl BspNode {
    pub fn new(polygons: Vec<EPolygon>) -> Self {
        let mut node = Self::default();
        node.build(polygons);
        node
    }

    /// Insert polygons, splitting them down the existing tree. The node
    /// plane comes from each batch's first polygon.
    pub fn build(&mut self, polygons: Vec<EPolygon>) {
        if polygons.is_empty() {
            return;
        }
        if self.plane.is_none() {
            self.plane = Some(polygons[0].plane.clone());
        }
        let plane = self.plane.clone().expect("plane set above");

        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front_polys = Vec::new();
        let mut back_polys = Vec::new();
        for poly in &polygons {
            split_polygon(
                &plane,
                poly,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front_polys,
                &mut back_polys,
            );
        }
        self.polygons.append(&mut coplanar_front);
        self.polygons.append(&mut coplanar_back);

        if !front_polys.is_empty() {
            self.front
                .get_or_insert_with(|| Box::new(BspNode::default()))
                .build(front_polys);
        }
        if !back_polys.is_empty() {
            self.back
                .get_or_insert_with(|| Box::new(BspNode::default()))
                .build(back_polys);
        }
    }

    /// Swap solid and empty space.
    pub fn invert(&mut self) {
        for poly in &mut self.polygons {
            poly.flip();
        }
        if let Some(plane) = &mut self.plane {
            *plane = plane.flipped();
        }
        std::mem::swap(&mut self.front, &mut self.back);
        if let Some(front) = &mut self.front {
            front.invert();
        }
        if let Some(back) = &mut self.back {
            back.invert();
        }
    }

    /// Remove the parts of `polygons` inside this tree's solid.
    pub fn clip_polygons(&self, polygons: &[EPolygon]) -> Vec<EPolygon> {
        let Some(plane) = &self.plane else {
            return polygons.to_vec();
        };

        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for poly in polygons {
            split_polygon(
                plane,
                poly,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        // Coplanar polygons travel with the side their facing selects
        front.append(&mut coplanar_front);
        back.append(&mut coplanar_back);

        let front = match &self.front {
            Some(node) => node.clip_polygons(&front),
            None => front,
        };
        let mut result = front;
        if let Some(node) = &self.back {
            result.extend(node.clip_polygons(&back));
        }
        // With no back subtree, back polygons are inside the solid and
        // are discarded.
        result
    }

    /// Clip every polygon in this tree against `other`.
    pub fn clip_to(&mut self, other: &BspNode) {
        self.polygons = other.clip_polygons(&self.polygons);
        if let Some(front) = &mut self.front {
            front.clip_to(other);
        }
        if let Some(back) = &mut self.back {
            back.clip_to(other);
        }
    }

    pub fn all_polygons(&self) -> Vec<EPolygon> {
        let mut result = self.polygons.clone();
        if let Some(front) = &self.front {
            result.extend(front.all_polygons());
        }
        if let Some(back) = &self.back {
            result.extend(back.all_polygons());
        }
        result
    }
}

/// `A ∪ B` over boundary polygon sets.
pub fn union(a_polys: Vec<EPolygon>, b_polys: Vec<EPolygon>) -> Vec<EPolygon> {
    let mut a = BspNode::new(a_polys);
    let mut b = BspNode::new(b_polys);
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    a.all_polygons()
}

/// `A − B`.
pub fn difference(a_polys: Vec<EPolygon>, b_polys: Vec<EPolygon>) -> Vec<EPolygon> {
    let mut a = BspNode::new(a_polys);
    let mut b = BspNode::new(b_polys);
    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_polygons());
    a.invert();
    a.all_polygons()
}

/// `A ∩ B`.
pub fn intersection(a_polys: Vec<EPolygon>, b_polys: Vec<EPolygon>) -> Vec<EPolygon> {
    let mut a = BspNode::new(a_polys);
    let mut b = BspNode::new(b_polys);
    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.all_polygons());
    a.invert();
    a.all_polygons()
}
