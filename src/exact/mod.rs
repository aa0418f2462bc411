// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Exact-arithmetic boundary representation and boolean kernel

pub mod boolean;
mod bsp;
pub mod convert;
pub mod hull;
pub mod num;
pub mod planar;

pub use bsp::{split_for_partition, EPolygon};
pub use planar::ESegment;

use crate::error::{GeometryError, GeometryResult};
use crate::geometry::BoundingBox;
use nalgebra::Matrix4;
use num::{scalar_from_f64, EPoint2, EPoint3, Scalar};
use serde::{Deserialize, Serialize};

/// Boundary storage for the two supported dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Boundary {
    /// 3D: oriented convex polygons with exact supporting planes.
    Polygons(Vec<EPolygon>),
    /// 2D: oriented segments, interior to the left.
    Segments(Vec<ESegment>),
}

/// Exact polyhedral (or polygonal) point set.
///
/// Coordinates are arbitrary-precision rationals, so side-of-plane
/// decisions during boolean combination are exact and the representation
/// is closed under union, intersection and difference. Values are
/// immutable once shared; transformation produces a new solid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactSolid {
    boundary: Boundary,
}

impl ExactSolid {
    pub fn empty(dim: u32) -> Self {
        match dim {
            2 => Self {
                boundary: Boundary::Segments(Vec::new()),
            },
            _ => Self {
                boundary: Boundary::Polygons(Vec::new()),
            },
        }
    }

    pub fn from_polygons(polygons: Vec<EPolygon>) -> Self {
        Self {
            boundary: Boundary::Polygons(polygons),
        }
    }

    pub fn from_segments(segments: Vec<ESegment>) -> Self {
        Self {
            boundary: Boundary::Segments(segments),
        }
    }

    pub fn dimension(&self) -> u32 {
        match &self.boundary {
            Boundary::Polygons(_) => 3,
            Boundary::Segments(_) => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.boundary {
            Boundary::Polygons(p) => p.is_empty(),
            Boundary::Segments(s) => s.is_empty(),
        }
    }

    pub fn polygons(&self) -> &[EPolygon] {
        match &self.boundary {
            Boundary::Polygons(p) => p,
            Boundary::Segments(_) => &[],
        }
    }

    pub fn segments(&self) -> &[ESegment] {
        match &self.boundary {
            Boundary::Segments(s) => s,
            Boundary::Polygons(_) => &[],
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        match &self.boundary {
            Boundary::Polygons(polys) => {
                for poly in polys {
                    for p in &poly.points {
                        bbox.expand_to_include(&p.to_f64());
                    }
                }
            }
            Boundary::Segments(segs) => {
                for seg in segs {
                    let [x, y] = seg.a.to_f64();
                    bbox.expand_to_include(&nalgebra::Point3::new(x, y, 0.0));
                    let [x, y] = seg.b.to_f64();
                    bbox.expand_to_include(&nalgebra::Point3::new(x, y, 0.0));
                }
            }
        }
        bbox
    }

    /// Approximate heap footprint, used as the cache cost. Rational
    /// coordinates are costed by their actual digit storage.
    pub fn memory_size(&self) -> usize {
        fn scalar_size(s: &Scalar) -> usize {
            ((s.numer().bits() + s.denom().bits()) / 8 + 16) as usize
        }
        let base = std::mem::size_of::<Self>();
        match &self.boundary {
            Boundary::Polygons(polys) => {
                base + polys
                    .iter()
                    .map(|poly| {
                        poly.points
                            .iter()
                            .map(|p| {
                                scalar_size(&p.x) + scalar_size(&p.y) + scalar_size(&p.z)
                            })
                            .sum::<usize>()
                            + poly.plane.normal.iter().map(scalar_size).sum::<usize>()
                            + scalar_size(&poly.plane.w)
                    })
                    .sum::<usize>()
            }
            Boundary::Segments(segs) => {
                base + segs
                    .iter()
                    .map(|seg| {
                        scalar_size(&seg.a.x)
                            + scalar_size(&seg.a.y)
                            + scalar_size(&seg.b.x)
                            + scalar_size(&seg.b.y)
                    })
                    .sum::<usize>()
            }
        }
    }

    /// Apply an affine transform, producing a new solid. Matrices with
    /// NaN or infinite entries are rejected as malformed.
    pub fn transform(&self, matrix: &Matrix4<f64>) -> GeometryResult<ExactSolid> {
        let m: Vec<Scalar> = matrix
            .iter()
            .map(|&v| scalar_from_f64(v))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                GeometryError::malformed("transformation matrix contains NaN or infinity")
            })?;
        // nalgebra stores column-major: m[col * 4 + row]
        let at = |r: usize, c: usize| -> &Scalar { &m[c * 4 + r] };

        let det3 = {
            let linear = matrix.fixed_view::<3, 3>(0, 0).into_owned();
            linear.determinant()
        };

        match &self.boundary {
            Boundary::Polygons(polys) => {
                let mut out = Vec::with_capacity(polys.len());
                for poly in polys {
                    let mut points: Vec<EPoint3> = poly
                        .points
                        .iter()
                        .map(|p| EPoint3 {
                            x: at(0, 0) * &p.x + at(0, 1) * &p.y + at(0, 2) * &p.z + at(0, 3),
                            y: at(1, 0) * &p.x + at(1, 1) * &p.y + at(1, 2) * &p.z + at(1, 3),
                            z: at(2, 0) * &p.x + at(2, 1) * &p.y + at(2, 2) * &p.z + at(2, 3),
                        })
                        .collect();
                    if det3 < 0.0 {
                        points.reverse();
                    }
                    // Degenerate images of polygons (flattened by a
                    // singular matrix) are dropped
                    if let Some(p) = EPolygon::new(points) {
                        out.push(p);
                    }
                }
                Ok(ExactSolid::from_polygons(out))
            }
            Boundary::Segments(segs) => {
                let map2 = |p: &EPoint2| -> EPoint2 {
                    EPoint2 {
                        x: at(0, 0) * &p.x + at(0, 1) * &p.y + at(0, 3),
                        y: at(1, 0) * &p.x + at(1, 1) * &p.y + at(1, 3),
                    }
                };
                let mut out = Vec::with_capacity(segs.len());
                for seg in segs {
                    let (mut a, mut b) = (map2(&seg.a), map2(&seg.b));
                    if det3 < 0.0 {
                        std::mem::swap(&mut a, &mut b);
                    }
                    if let Some(s) = ESegment::new(a, b) {
                        out.push(s);
                    }
                }
                Ok(ExactSolid::from_segments(out))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn unit_square_solid() -> ExactSolid {
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let segs = (0..4)
            .map(|i| {
                let (ax, ay) = corners[i];
                let (bx, by) = corners[(i + 1) % 4];
                ESegment::new(
                    EPoint2::from_f64(ax, ay).unwrap(),
                    EPoint2::from_f64(bx, by).unwrap(),
                )
                .unwrap()
            })
            .collect();
        ExactSolid::from_segments(segs)
    }

    #[test]
    fn test_empty_solids() {
        assert!(ExactSolid::empty(3).is_empty());
        assert_eq!(ExactSolid::empty(3).dimension(), 3);
        assert_eq!(ExactSolid::empty(2).dimension(), 2);
    }

    #[test]
    fn test_transform_translates_bbox() {
        let solid = unit_square_solid();
        let moved = solid
            .transform(&Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)))
            .unwrap();
        let bbox = moved.bounding_box();
        assert_eq!(bbox.min, Point3::new(5.0, 0.0, 0.0));
        assert_eq!(bbox.max, Point3::new(6.0, 1.0, 0.0));
    }

    #[test]
    fn test_transform_rejects_nan() {
        let solid = unit_square_solid();
        let mut bad = Matrix4::identity();
        bad[(0, 3)] = f64::NAN;
        assert!(solid.transform(&bad).is_err());
    }

    #[test]
    fn test_memory_size_grows_with_content() {
        let empty = ExactSolid::empty(2);
        let square = unit_square_solid();
        assert!(square.memory_size() > empty.memory_size());
    }
}
