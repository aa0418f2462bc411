// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Structural fingerprints for cache keys
//!
//! A fingerprint digests a node's operator kind, its parameters (float
//! bits, not display forms) and its children's fingerprints, so two
//! structurally identical subtrees share one cache entry wherever they
//! appear. The declared child order is part of the digest: evaluation
//! folds left to right, so order is semantic.

use super::{CsgNode, CsgOp};
use crate::geometry::Primitive;
use sha2::{Digest, Sha256};

/// Stable textual cache key for a subtree.
pub fn fingerprint(node: &CsgNode) -> String {
    let mut hasher = Sha256::new();
    hash_node(node, &mut hasher);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(2 + digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn hash_node(node: &CsgNode, hasher: &mut Sha256) {
    hash_op(&node.op, hasher);
    hasher.update([node.background as u8]);
    hasher.update((node.children.len() as u64).to_le_bytes());
    for child in &node.children {
        // Children contribute their own finished fingerprints, making
        // the hash structural rather than positional
        hasher.update(fingerprint(child).as_bytes());
    }
}

fn f64_bits(hasher: &mut Sha256, values: &[f64]) {
    for v in values {
        hasher.update(v.to_bits().to_le_bytes());
    }
}

fn hash_op(op: &CsgOp, hasher: &mut Sha256) {
    match op {
        CsgOp::Union => hasher.update(b"union"),
        CsgOp::Difference => hasher.update(b"difference"),
        CsgOp::Intersection => hasher.update(b"intersection"),
        CsgOp::Minkowski => hasher.update(b"minkowski"),
        CsgOp::Hull => hasher.update(b"hull"),
        CsgOp::LinearExtrude(spec) => {
            hasher.update(b"linear_extrude");
            f64_bits(
                hasher,
                &[spec.height, spec.twist, spec.scale[0], spec.scale[1]],
            );
            hasher.update(spec.slices.to_le_bytes());
            hasher.update([spec.center as u8]);
        }
        CsgOp::RotateExtrude(spec) => {
            hasher.update(b"rotate_extrude");
            f64_bits(hasher, &[spec.angle]);
            hasher.update(spec.segments.to_le_bytes());
        }
        CsgOp::Projection { cut } => {
            hasher.update(b"projection");
            hasher.update([*cut as u8]);
        }
        CsgOp::Render { convexity } => {
            hasher.update(b"render");
            hasher.update(convexity.to_le_bytes());
        }
        CsgOp::Transform(matrix) => {
            hasher.update(b"transform");
            for v in matrix.iter() {
                hasher.update(v.to_bits().to_le_bytes());
            }
        }
        CsgOp::Primitive(primitive) => hash_primitive(primitive, hasher),
        CsgOp::Import { path, convexity } => {
            hasher.update(b"import");
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(convexity.to_le_bytes());
        }
    }
}

fn hash_primitive(primitive: &Primitive, hasher: &mut Sha256) {
    match primitive {
        Primitive::Cube { size, center } => {
            hasher.update(b"cube");
            f64_bits(hasher, &[size.x, size.y, size.z]);
            hasher.update([*center as u8]);
        }
        Primitive::Sphere { r, segments } => {
            hasher.update(b"sphere");
            f64_bits(hasher, &[*r]);
            hasher.update(segments.to_le_bytes());
        }
        Primitive::Cylinder {
            h,
            r1,
            r2,
            center,
            segments,
        } => {
            hasher.update(b"cylinder");
            f64_bits(hasher, &[*h, *r1, *r2]);
            hasher.update([*center as u8]);
            hasher.update(segments.to_le_bytes());
        }
        Primitive::Polyhedron {
            points,
            faces,
            convexity,
        } => {
            hasher.update(b"polyhedron");
            for p in points {
                f64_bits(hasher, &[p.x, p.y, p.z]);
            }
            for face in faces {
                hasher.update((face.len() as u64).to_le_bytes());
                for &idx in face {
                    hasher.update((idx as u64).to_le_bytes());
                }
            }
            hasher.update(convexity.to_le_bytes());
        }
        Primitive::Square { size, center } => {
            hasher.update(b"square");
            f64_bits(hasher, size);
            hasher.update([*center as u8]);
        }
        Primitive::Circle { r, segments } => {
            hasher.update(b"circle");
            f64_bits(hasher, &[*r]);
            hasher.update(segments.to_le_bytes());
        }
        Primitive::Polygon {
            points,
            paths,
            convexity,
        } => {
            hasher.update(b"polygon");
            for p in points {
                f64_bits(hasher, p);
            }
            for path in paths {
                hasher.update((path.len() as u64).to_le_bytes());
                for &idx in path {
                    hasher.update((idx as u64).to_le_bytes());
                }
            }
            hasher.update(convexity.to_le_bytes());
        }
    }
}
