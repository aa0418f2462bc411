// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Inexact geometry types: meshes, primitives, bounding boxes

pub mod analytics;
mod bbox;
mod grid;
mod mesh;
mod primitives;

pub use bbox::BoundingBox;
pub use grid::VertexGrid;
pub use mesh::{Mesh, Polygon};
pub use primitives::Primitive;

use crate::exact::ExactSolid;
use std::sync::Arc;

/// Closed set of geometry kinds flowing through evaluation.
///
/// Values are shared and immutable once wrapped here; producing a
/// modified geometry always allocates a new value rather than mutating
/// one that a cache or tree node may also hold.
#[derive(Debug, Clone)]
pub enum Geometry {
    Mesh(Arc<Mesh>),
    Solid(Arc<ExactSolid>),
    /// Grouped results kept separate from boolean combination, e.g.
    /// background-tagged subtrees retained for display.
    List(Vec<Geometry>),
}

impl Geometry {
    pub fn empty_mesh() -> Self {
        Geometry::Mesh(Arc::new(Mesh::new_3d()))
    }

    pub fn dimension(&self) -> u32 {
        match self {
            Geometry::Mesh(m) => m.dimension(),
            Geometry::Solid(s) => s.dimension(),
            Geometry::List(items) => items.first().map_or(0, Geometry::dimension),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Mesh(m) => m.is_empty(),
            Geometry::Solid(s) => s.is_empty(),
            Geometry::List(items) => items.iter().all(Geometry::is_empty),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Geometry::Mesh(m) => m.bounding_box(),
            Geometry::Solid(s) => s.bounding_box(),
            Geometry::List(items) => {
                let mut bbox = BoundingBox::empty();
                for item in items {
                    bbox.merge(&item.bounding_box());
                }
                bbox
            }
        }
    }

    /// Approximate heap footprint, used as the cache cost.
    pub fn memory_size(&self) -> usize {
        match self {
            Geometry::Mesh(m) => m.memory_size(),
            Geometry::Solid(s) => s.memory_size(),
            Geometry::List(items) => items.iter().map(Geometry::memory_size).sum(),
        }
    }
}
