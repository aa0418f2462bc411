// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Exact rational points, planes and predicates
//!
//! All boolean-kernel decisions are made on `BigRational` coordinates so
//! sign tests are exact: a point is on a plane, in front of it, or behind
//! it, with no epsilon band. Conversions to `f64` happen only at the mesh
//! boundary.

use nalgebra::Point3;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub type Scalar = BigRational;

/// Exact conversion from a finite float. NaN and infinities have no
/// rational value and are rejected by the callers as malformed input.
pub fn scalar_from_f64(v: f64) -> Option<Scalar> {
    BigRational::from_float(v)
}

pub fn scalar_to_f64(v: &Scalar) -> f64 {
    v.to_f64().unwrap_or(0.0)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EPoint3 {
    pub x: Scalar,
    pub y: Scalar,
    pub z: Scalar,
}

impl EPoint3 {
    pub fn new(x: Scalar, y: Scalar, z: Scalar) -> Self {
        Self { x, y, z }
    }

    pub fn from_f64(p: &Point3<f64>) -> Option<Self> {
        Some(Self {
            x: scalar_from_f64(p.x)?,
            y: scalar_from_f64(p.y)?,
            z: scalar_from_f64(p.z)?,
        })
    }

    pub fn to_f64(&self) -> Point3<f64> {
        Point3::new(
            scalar_to_f64(&self.x),
            scalar_to_f64(&self.y),
            scalar_to_f64(&self.z),
        )
    }

    pub fn sub(&self, other: &EPoint3) -> [Scalar; 3] {
        [
            &self.x - &other.x,
            &self.y - &other.y,
            &self.z - &other.z,
        ]
    }

    /// Componentwise sum of two points, the Minkowski point operation.
    pub fn sum(&self, other: &EPoint3) -> EPoint3 {
        EPoint3 {
            x: &self.x + &other.x,
            y: &self.y + &other.y,
            z: &self.z + &other.z,
        }
    }

    /// Linear interpolation `self + t * (other - self)` with exact `t`.
    pub fn lerp(&self, other: &EPoint3, t: &Scalar) -> EPoint3 {
        EPoint3 {
            x: &self.x + t * (&other.x - &self.x),
            y: &self.y + t * (&other.y - &self.y),
            z: &self.z + t * (&other.z - &self.z),
        }
    }
}

pub fn dot3(a: &[Scalar; 3], b: &[Scalar; 3]) -> Scalar {
    &a[0] * &b[0] + &a[1] * &b[1] + &a[2] * &b[2]
}

pub fn cross3(a: &[Scalar; 3], b: &[Scalar; 3]) -> [Scalar; 3] {
    [
        &a[1] * &b[2] - &a[2] * &b[1],
        &a[2] * &b[0] - &a[0] * &b[2],
        &a[0] * &b[1] - &a[1] * &b[0],
    ]
}

/// Plane `n · p = w` with an exact, unnormalized normal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EPlane {
    pub normal: [Scalar; 3],
    pub w: Scalar,
}

impl EPlane {
    pub fn new(normal: [Scalar; 3], w: Scalar) -> Self {
        Self { normal, w }
    }

    /// Plane through three points; `None` if they are collinear.
    pub fn from_points(a: &EPoint3, b: &EPoint3, c: &EPoint3) -> Option<Self> {
        let normal = cross3(&b.sub(a), &c.sub(a));
        if normal.iter().all(Zero::is_zero) {
            return None;
        }
        let w = dot3(&normal, &[a.x.clone(), a.y.clone(), a.z.clone()]);
        Some(Self { normal, w })
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: [
                -self.normal[0].clone(),
                -self.normal[1].clone(),
                -self.normal[2].clone(),
            ],
            w: -self.w.clone(),
        }
    }

    /// Exact signed evaluation `n · p - w`.
    pub fn eval(&self, p: &EPoint3) -> Scalar {
        &self.normal[0] * &p.x + &self.normal[1] * &p.y + &self.normal[2] * &p.z - &self.w
    }

    /// Which side of the plane `p` lies on: `Greater` is the front
    /// (normal) side, `Equal` is exactly on the plane.
    pub fn side(&self, p: &EPoint3) -> Ordering {
        let v = self.eval(p);
        if v.is_zero() {
            Ordering::Equal
        } else if v.is_positive() {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }
}

/// Exact orientation of `d` relative to the plane through `a`, `b`, `c`:
/// `Greater` when `d` is on the front (counter-clockwise normal) side.
pub fn orient3d(a: &EPoint3, b: &EPoint3, c: &EPoint3, d: &EPoint3) -> Ordering {
    let n = cross3(&b.sub(a), &c.sub(a));
    let v = dot3(&n, &d.sub(a));
    if v.is_zero() {
        Ordering::Equal
    } else if v.is_positive() {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

/// Intersection point of three planes, `None` when they do not meet in a
/// single point (parallel or degenerate configurations).
pub fn intersect_planes(p0: &EPlane, p1: &EPlane, p2: &EPlane) -> Option<EPoint3> {
    let m = [&p0.normal, &p1.normal, &p2.normal];
    let det = &m[0][0] * (&m[1][1] * &m[2][2] - &m[1][2] * &m[2][1])
        - &m[0][1] * (&m[1][0] * &m[2][2] - &m[1][2] * &m[2][0])
        + &m[0][2] * (&m[1][0] * &m[2][1] - &m[1][1] * &m[2][0]);
    if det.is_zero() {
        return None;
    }
    let b = [&p0.w, &p1.w, &p2.w];

    // Cramer's rule, one column replaced per coordinate
    let det_for = |col: usize| -> Scalar {
        let get = |r: usize, c: usize| -> Scalar {
            if c == col {
                b[r].clone()
            } else {
                m[r][c].clone()
            }
        };
        get(0, 0) * (get(1, 1) * get(2, 2) - get(1, 2) * get(2, 1))
            - get(0, 1) * (get(1, 0) * get(2, 2) - get(1, 2) * get(2, 0))
            + get(0, 2) * (get(1, 0) * get(2, 1) - get(1, 1) * get(2, 0))
    };

    Some(EPoint3 {
        x: det_for(0) / &det,
        y: det_for(1) / &det,
        z: det_for(2) / &det,
    })
}

// ---------------------------------------------------------------------------
// 2D
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EPoint2 {
    pub x: Scalar,
    pub y: Scalar,
}

impl EPoint2 {
    pub fn new(x: Scalar, y: Scalar) -> Self {
        Self { x, y }
    }

    pub fn from_f64(x: f64, y: f64) -> Option<Self> {
        Some(Self {
            x: scalar_from_f64(x)?,
            y: scalar_from_f64(y)?,
        })
    }

    pub fn to_f64(&self) -> [f64; 2] {
        [scalar_to_f64(&self.x), scalar_to_f64(&self.y)]
    }

    pub fn lerp(&self, other: &EPoint2, t: &Scalar) -> EPoint2 {
        EPoint2 {
            x: &self.x + t * (&other.x - &self.x),
            y: &self.y + t * (&other.y - &self.y),
        }
    }
}

/// Oriented line `n · p = w`; the front side is to the left of the
/// direction the defining segment runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ELine {
    pub normal: [Scalar; 2],
    pub w: Scalar,
}

impl ELine {
    /// Line through `a` and `b` with the interior-left normal
    /// `(-dy, dx)`; `None` for a zero-length segment.
    pub fn from_points(a: &EPoint2, b: &EPoint2) -> Option<Self> {
        let dx = &b.x - &a.x;
        let dy = &b.y - &a.y;
        if dx.is_zero() && dy.is_zero() {
            return None;
        }
        let normal = [-dy, dx];
        let w = &normal[0] * &a.x + &normal[1] * &a.y;
        Some(Self { normal, w })
    }

    pub fn flipped(&self) -> Self {
        Self {
            normal: [-self.normal[0].clone(), -self.normal[1].clone()],
            w: -self.w.clone(),
        }
    }

    pub fn eval(&self, p: &EPoint2) -> Scalar {
        &self.normal[0] * &p.x + &self.normal[1] * &p.y - &self.w
    }

    pub fn side(&self, p: &EPoint2) -> Ordering {
        let v = self.eval(p);
        if v.is_zero() {
            Ordering::Equal
        } else if v.is_positive() {
            Ordering::Greater
        } else {
            Ordering::Less
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64, z: f64) -> EPoint3 {
        EPoint3::from_f64(&Point3::new(x, y, z)).unwrap()
    }

    #[test]
    fn test_plane_sides() {
        let plane = EPlane::from_points(
            &pt(0.0, 0.0, 0.0),
            &pt(1.0, 0.0, 0.0),
            &pt(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert_eq!(plane.side(&pt(0.0, 0.0, 1.0)), Ordering::Greater);
        assert_eq!(plane.side(&pt(0.0, 0.0, -1.0)), Ordering::Less);
        assert_eq!(plane.side(&pt(0.5, 0.5, 0.0)), Ordering::Equal);
    }

    #[test]
    fn test_collinear_points_have_no_plane() {
        assert!(EPlane::from_points(
            &pt(0.0, 0.0, 0.0),
            &pt(1.0, 1.0, 1.0),
            &pt(2.0, 2.0, 2.0),
        )
        .is_none());
    }

    #[test]
    fn test_three_plane_intersection() {
        let px = EPlane::from_points(
            &pt(2.0, 0.0, 0.0),
            &pt(2.0, 1.0, 0.0),
            &pt(2.0, 0.0, 1.0),
        )
        .unwrap();
        let py = EPlane::from_points(
            &pt(0.0, 3.0, 0.0),
            &pt(0.0, 3.0, 1.0),
            &pt(1.0, 3.0, 0.0),
        )
        .unwrap();
        let pz = EPlane::from_points(
            &pt(0.0, 0.0, 5.0),
            &pt(1.0, 0.0, 5.0),
            &pt(0.0, 1.0, 5.0),
        )
        .unwrap();
        let p = intersect_planes(&px, &py, &pz).unwrap();
        assert_eq!(p, pt(2.0, 3.0, 5.0));
    }

    #[test]
    fn test_exact_lerp_no_drift() {
        use num_traits::One;
        let a = pt(0.0, 0.0, 0.0);
        let b = pt(1.0, 0.0, 0.0);
        let half = Scalar::one() / (Scalar::one() + Scalar::one());
        let mid = a.lerp(&b, &half);
        assert_eq!(mid.to_f64().x, 0.5);
    }

    #[test]
    fn test_line_side_convention() {
        // Segment along +x: interior-left means +y is the front side
        let a = EPoint2::from_f64(0.0, 0.0).unwrap();
        let b = EPoint2::from_f64(1.0, 0.0).unwrap();
        let line = ELine::from_points(&a, &b).unwrap();
        assert_eq!(
            line.side(&EPoint2::from_f64(0.5, 1.0).unwrap()),
            Ordering::Greater
        );
    }
}
