// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! STL round trips through the evaluator

use csgforge::geometry::analytics;
use csgforge::io::stl;
use csgforge::{CsgNode, CsgOp, Primitive};
use nalgebra::Vector3;
use std::io::Write;
use tempfile::NamedTempFile;

fn carved_cube_mesh() -> csgforge::Mesh {
    let tree = CsgNode::with_children(
        CsgOp::Difference,
        vec![
            CsgNode::new(CsgOp::Primitive(Primitive::Cube {
                size: Vector3::new(10.0, 10.0, 10.0),
                center: false,
            })),
            CsgNode::new(CsgOp::Primitive(Primitive::Cube {
                size: Vector3::new(5.0, 5.0, 5.0),
                center: false,
            })),
        ],
    );
    csgforge::render_once(&tree)
}

#[test]
fn test_boolean_result_survives_binary_roundtrip() {
    let mesh = carved_cube_mesh();
    let mut file = NamedTempFile::new().unwrap();
    stl::export_binary(&mesh, &mut file).unwrap();
    file.flush().unwrap();

    let back = stl::import(file.path()).unwrap();
    let stats = analytics::analyze(&back);
    assert!((stats.volume - 875.0).abs() < 1e-3);
    assert!(stats.is_watertight);
}

#[test]
fn test_import_feeds_evaluation() {
    let mesh = carved_cube_mesh();
    let mut file = NamedTempFile::new().unwrap();
    stl::export_binary(&mesh, &mut file).unwrap();
    file.flush().unwrap();

    // Import the exported solid and intersect it with a cube again
    let tree = CsgNode::with_children(
        CsgOp::Intersection,
        vec![
            CsgNode::new(CsgOp::Import {
                path: file.path().to_path_buf(),
                convexity: 1,
            }),
            CsgNode::new(CsgOp::Primitive(Primitive::Cube {
                size: Vector3::new(10.0, 10.0, 4.0),
                center: false,
            })),
        ],
    );
    let result = csgforge::render_once(&tree);
    let stats = analytics::analyze(&result);
    // z < 4 slab of the carved cube: 400 - 100
    assert!((stats.volume - 300.0).abs() < 1e-3);
}

#[test]
fn test_malformed_binary_header_degrades_gracefully() {
    // Declared facet count disagrees with the file size: the binary
    // detector rejects it and the ASCII parser fails without panicking
    let mut bytes = vec![0u8; 84 + 50 * 3];
    bytes[80..84].copy_from_slice(&50_000u32.to_le_bytes());

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let mesh = stl::import(file.path()).unwrap();
    assert!(mesh.is_empty());
}

#[test]
fn test_import_of_missing_file_is_contained_by_evaluator() {
    let tree = CsgNode::with_children(
        CsgOp::Union,
        vec![
            CsgNode::new(CsgOp::Import {
                path: "/nonexistent/broken.stl".into(),
                convexity: 1,
            }),
            CsgNode::new(CsgOp::Primitive(Primitive::Cube {
                size: Vector3::new(2.0, 2.0, 2.0),
                center: false,
            })),
        ],
    );

    let config = csgforge::EngineConfig::default();
    let mut caches = csgforge::CacheSet::new(&config);
    let mut evaluator = csgforge::Evaluator::new(&config, &mut caches);
    let mesh = evaluator.evaluate_to_mesh(&tree);
    // The bad import became empty geometry; the sibling still renders
    assert!((analytics::analyze(&mesh).volume - 8.0).abs() < 1e-9);
    assert!(!evaluator.diagnostics().is_empty());
}
