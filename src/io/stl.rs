// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! STL import and export
//!
//! Binary STL is a fixed 50-byte record per facet: twelve little-endian
//! f32 values (normal plus three vertices) and a 16-bit attribute word.
//! A file whose header-declared facet count matches its size is parsed
//! as binary; everything else falls through to the ASCII parser, which
//! returns whatever it managed to parse when it hits a malformed token.

use crate::error::{GeometryError, GeometryResult};
use crate::geometry::{Mesh, Polygon, VertexGrid};
use crate::tess;
use nalgebra::{Point3, Vector3};
use std::io::Write;
use std::path::Path;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Import an STL file as a 3D mesh, snapping near-coincident vertices
/// onto the shared grid.
pub fn import(path: &Path) -> GeometryResult<Mesh> {
    let bytes = std::fs::read(path).map_err(|e| {
        GeometryError::Io(std::io::Error::new(
            e.kind(),
            format!("cannot read {}: {e}", path.display()),
        ))
    })?;

    let mesh = if is_binary(&bytes) {
        parse_binary(&bytes)
    } else {
        parse_ascii(&bytes, path)
    };
    Ok(snap_vertices(mesh))
}

/// Binary when the header's facet count predicts the exact file size.
fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let declared = u32::from_le_bytes(
        bytes[HEADER_LEN..HEADER_LEN + 4]
            .try_into()
            .unwrap_or([0; 4]),
    ) as usize;
    HEADER_LEN + 4 + declared * FACET_LEN == bytes.len()
}

fn parse_binary(bytes: &[u8]) -> Mesh {
    let mut mesh = Mesh::new_3d();
    for record in bytes[HEADER_LEN + 4..].chunks_exact(FACET_LEN) {
        let f = |i: usize| -> f32 {
            f32::from_le_bytes(record[i * 4..i * 4 + 4].try_into().unwrap_or([0; 4]))
        };
        // Words 0..3 are the stored normal, which is recomputed on
        // export anyway; vertices follow
        let tri: Vec<Point3<f64>> = (1..4)
            .map(|v| Point3::new(f(v * 3) as f64, f(v * 3 + 1) as f64, f(v * 3 + 2) as f64))
            .collect();
        if tri.iter().all(|p| p.coords.iter().all(|c| c.is_finite())) {
            mesh.append_poly();
            for p in tri {
                mesh.append_vertex(p);
            }
        } else {
            log::warn!("binary STL facet with non-finite coordinates skipped");
        }
    }
    mesh
}

fn parse_ascii(bytes: &[u8], path: &Path) -> Mesh {
    let text = String::from_utf8_lossy(bytes);
    let mut tokens = text.split_ascii_whitespace().peekable();
    let mut mesh = Mesh::new_3d();

    if tokens.next() != Some("solid") {
        log::warn!(
            "{} is neither a well-formed binary STL nor an ASCII STL; ignoring it",
            path.display()
        );
        return mesh;
    }
    // Skip the free-form model name up to the first facet
    while let Some(&tok) = tokens.peek() {
        if tok == "facet" || tok == "endsolid" {
            break;
        }
        tokens.next();
    }

    loop {
        match tokens.next() {
            Some("endsolid") | None => break,
            Some("facet") => {}
            Some(other) => {
                log::warn!(
                    "{}: unexpected token {other:?} in ASCII STL; keeping {} facets parsed so far",
                    path.display(),
                    mesh.polygon_count()
                );
                return mesh;
            }
        }

        // facet normal ni nj nk / outer loop / 3 x vertex / endloop / endfacet
        let mut ok = expect(&mut tokens, "normal");
        for _ in 0..3 {
            ok = ok && number(&mut tokens).is_some();
        }
        ok = ok && expect(&mut tokens, "outer") && expect(&mut tokens, "loop");

        let mut tri = Polygon::with_capacity(3);
        for _ in 0..3 {
            ok = ok && expect(&mut tokens, "vertex");
            if !ok {
                break;
            }
            let coords: Vec<f64> = (0..3).filter_map(|_| number(&mut tokens)).collect();
            if coords.len() != 3 {
                ok = false;
                break;
            }
            tri.push(Point3::new(coords[0], coords[1], coords[2]));
        }
        ok = ok && expect(&mut tokens, "endloop") && expect(&mut tokens, "endfacet");

        if !ok {
            log::warn!(
                "{}: malformed facet record; keeping {} facets parsed so far",
                path.display(),
                mesh.polygon_count()
            );
            return mesh;
        }
        mesh.push_polygon(tri);
    }
    mesh
}

fn expect<'a>(tokens: &mut impl Iterator<Item = &'a str>, word: &str) -> bool {
    tokens.next() == Some(word)
}

fn number<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<f64> {
    tokens.next().and_then(|t| t.parse::<f64>().ok())
}

fn snap_vertices(mesh: Mesh) -> Mesh {
    let res = crate::config::Tolerances::default().grid;
    let mut grid = VertexGrid::new(res);
    let mut snapped = Mesh::new_3d();
    for poly in &mesh.polygons {
        let mut ring = Polygon::with_capacity(poly.len());
        for p in poly {
            let idx = grid.align(p);
            ring.push(*grid.point(idx));
        }
        snapped.push_polygon(ring);
    }
    snapped.convexity = mesh.convexity;
    snapped
}

/// Triangles of a mesh, degenerate (repeated-vertex) ones dropped.
fn triangles(mesh: &Mesh) -> Vec<[Point3<f64>; 3]> {
    let mut out = Vec::new();
    for ring in &mesh.polygons {
        if ring.len() == 3 {
            push_triangle(&mut out, [ring[0], ring[1], ring[2]]);
        } else {
            for t in tess::triangulate_face(ring) {
                push_triangle(&mut out, [ring[t[0]], ring[t[1]], ring[t[2]]]);
            }
        }
    }
    out
}

fn push_triangle(out: &mut Vec<[Point3<f64>; 3]>, tri: [Point3<f64>; 3]) {
    if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
        return;
    }
    out.push(tri);
}

/// Face normal by cross product; a near-zero result becomes the fixed
/// placeholder instead of NaN.
fn facet_normal(tri: &[Point3<f64>; 3]) -> Vector3<f64> {
    let n = (tri[1] - tri[0]).cross(&(tri[2] - tri[0]));
    let len = n.norm();
    if len > 1e-30 {
        n / len
    } else {
        Vector3::new(0.0, 0.0, 0.0)
    }
}

/// Write binary STL.
pub fn export_binary(mesh: &Mesh, writer: &mut impl Write) -> GeometryResult<()> {
    let tris = triangles(mesh);
    let mut header = [0u8; HEADER_LEN];
    let tag = b"csgforge binary STL";
    header[..tag.len()].copy_from_slice(tag);
    writer.write_all(&header)?;
    writer.write_all(&(tris.len() as u32).to_le_bytes())?;

    for tri in &tris {
        let n = facet_normal(tri);
        for v in [n.x, n.y, n.z] {
            writer.write_all(&(v as f32).to_le_bytes())?;
        }
        for p in tri {
            for v in [p.x, p.y, p.z] {
                writer.write_all(&(v as f32).to_le_bytes())?;
            }
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// Write ASCII STL.
pub fn export_ascii(mesh: &Mesh, writer: &mut impl Write) -> GeometryResult<()> {
    writeln!(writer, "solid csgforge")?;
    for tri in triangles(mesh) {
        let n = facet_normal(&tri);
        writeln!(writer, "  facet normal {} {} {}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for p in &tri {
            writeln!(writer, "      vertex {} {} {}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid csgforge")?;
    Ok(())
}

/// Export to a file; binary unless `ascii` is set.
pub fn export(mesh: &Mesh, path: &Path, ascii: bool) -> GeometryResult<()> {
    let mut file = std::fs::File::create(path)?;
    if ascii {
        export_ascii(mesh, &mut file)
    } else {
        export_binary(mesh, &mut file)
    }
}
