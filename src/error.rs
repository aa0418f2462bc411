// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Error taxonomy for the geometry core

use thiserror::Error;

/// Failure classes recognized by the geometry core.
///
/// Every error is caught at a well-defined boundary (per operator in the
/// evaluator, per operand pair in the Minkowski engine, per entry in the
/// caches) and converted into a diagnostic plus a safe empty or partial
/// result. None of these escape the evaluation entry point.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// An exact-kernel construction or predicate could not proceed,
    /// e.g. a degenerate plane or a non-simple polyhedron where a simple
    /// one is required.
    #[error("numerical failure: {0}")]
    Numerical(String),

    /// Degenerate primitive parameters or non-manifold user geometry.
    #[error("malformed geometry: {0}")]
    Malformed(String),

    /// Persistent cache lock timeout or arena exhaustion. Degrades to
    /// memory-only caching, never user-visible beyond a log line.
    #[error("cache storage: {0}")]
    Storage(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GeometryResult<T> = Result<T, GeometryError>;

impl GeometryError {
    pub fn numerical(msg: impl Into<String>) -> Self {
        GeometryError::Numerical(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        GeometryError::Malformed(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        GeometryError::Storage(msg.into())
    }
}
