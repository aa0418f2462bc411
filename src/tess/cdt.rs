// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Constrained Delaunay triangulation over polygon outlines
//!
//! Bowyer-Watson insertion with adaptive-precision predicates, followed
//! by constraint enforcement through cavity retriangulation (no Steiner
//! vertices are ever created) and a parity flood fill that classifies
//! triangles as inside or outside the constrained region.

use ahash::{AHashMap, AHashSet};
use robust::{incircle, orient2d, Coord};
use std::collections::VecDeque;

const SUPER: usize = 3;

#[derive(Debug, Clone, Copy)]
struct Tri {
    v: [usize; 3],
    alive: bool,
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct Cdt {
    points: Vec<[f64; 2]>,
    dedup: AHashMap<(u64, u64), usize>,
    duplicates: usize,
    outlines: Vec<Vec<usize>>,
    triangles: Vec<Tri>,
    constrained: AHashSet<(usize, usize)>,
    built: bool,
}

impl Default for Cdt {
    fn default() -> Self {
        Self::new()
    }
}

impl Cdt {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            dedup: AHashMap::new(),
            duplicates: 0,
            outlines: Vec::new(),
            triangles: Vec::new(),
            constrained: AHashSet::new(),
            built: false,
        }
    }

    /// Coordinates of a registered point, valid before and after
    /// [`Cdt::build`].
    pub fn registered_point(&self, idx: usize) -> [f64; 2] {
        if self.built {
            self.points[idx + SUPER]
        } else {
            self.points[idx]
        }
    }

    /// Register an outline loop. Its edges become constraints during
    /// [`Cdt::build`]. Exact duplicate vertices are merged and counted.
    pub fn add_outline(&mut self, ring: &[[f64; 2]]) {
        let mut indices = Vec::with_capacity(ring.len());
        for p in ring {
            let key = (p[0].to_bits(), p[1].to_bits());
            let idx = match self.dedup.get(&key) {
                Some(&idx) => {
                    self.duplicates += 1;
                    idx
                }
                None => {
                    let idx = self.points.len();
                    self.points.push(*p);
                    self.dedup.insert(key, idx);
                    idx
                }
            };
            // Consecutive duplicates would create zero-length constraints
            if indices.last() != Some(&idx) {
                indices.push(idx);
            }
        }
        while indices.len() > 1 && indices.first() == indices.last() {
            indices.pop();
        }
        if indices.len() >= 3 {
            self.outlines.push(indices);
        } else if !indices.is_empty() {
            log::debug!("dropping outline with fewer than 3 distinct vertices");
        }
    }

    /// Number of duplicate input vertices that were merged.
    pub fn duplicate_count(&self) -> usize {
        self.duplicates
    }

    fn coord(&self, i: usize) -> Coord<f64> {
        Coord {
            x: self.points[i][0],
            y: self.points[i][1],
        }
    }

    fn o2d(&self, a: usize, b: usize, c: usize) -> f64 {
        orient2d(self.coord(a), self.coord(b), self.coord(c))
    }

    fn in_circle(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        incircle(self.coord(a), self.coord(b), self.coord(c), self.coord(d))
    }

    fn push_tri(&mut self, a: usize, b: usize, c: usize) {
        debug_assert!(self.o2d(a, b, c) > 0.0, "triangles must be counter-clockwise");
        self.triangles.push(Tri {
            v: [a, b, c],
            alive: true,
        });
    }

    /// Triangulate, constrain, classify. Returns in-domain triangles as
    /// counter-clockwise index triples into the registered points.
    pub fn build(&mut self) -> Vec<[usize; 3]> {
        if self.points.is_empty() {
            return Vec::new();
        }
        self.init_super_triangle();
        self.built = true;
        // Indices 0..SUPER are the super-triangle corners
        for idx in SUPER..self.points.len() {
            self.insert_point(idx);
        }

        let outlines = std::mem::take(&mut self.outlines);
        for ring in &outlines {
            let n = ring.len();
            for i in 0..n {
                let a = ring[i] + SUPER;
                let b = ring[(i + 1) % n] + SUPER;
                if a != b {
                    self.insert_constraint(a, b);
                }
            }
        }
        self.outlines = outlines;

        let levels = self.classify();
        self.triangles
            .iter()
            .enumerate()
            .filter(|(ti, t)| {
                t.alive
                    && levels[*ti] % 2 == 1
                    && t.v.iter().all(|&v| v >= SUPER)
            })
            .map(|(_, t)| [t.v[0] - SUPER, t.v[1] - SUPER, t.v[2] - SUPER])
            .collect()
    }

    fn init_super_triangle(&mut self) {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.points {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
        let span = (max_x - min_x).max(max_y - min_y).max(1.0);
        let cx = (min_x + max_x) / 2.0;
        let cy = (min_y + max_y) / 2.0;

        let mut shifted = vec![
            [cx - 20.0 * span, cy - 10.0 * span],
            [cx + 20.0 * span, cy - 10.0 * span],
            [cx, cy + 20.0 * span],
        ];
        shifted.append(&mut self.points);
        self.points = shifted;
        self.triangles.clear();
        self.push_tri(0, 1, 2);
    }

    /// Bowyer-Watson insertion of the point at index `idx`.
    fn insert_point(&mut self, idx: usize) {
        let bad: Vec<usize> = self
            .triangles
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive && self.in_circle(t.v[0], t.v[1], t.v[2], idx) > 0.0)
            .map(|(ti, _)| ti)
            .collect();
        if bad.is_empty() {
            // On or outside every circumcircle: cocircular degeneracies
            // leave the point on an existing vertex (already deduped) or
            // on the hull, which cannot happen inside the super triangle
            return;
        }

        // Cavity boundary: directed edges of bad triangles not shared
        // with another bad triangle
        let bad_set: AHashSet<usize> = bad.iter().copied().collect();
        let mut edge_owner: AHashMap<(usize, usize), usize> = AHashMap::new();
        for &ti in &bad {
            let v = self.triangles[ti].v;
            for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
                *edge_owner.entry(edge_key(a, b)).or_insert(0) += 1;
            }
        }
        let mut boundary: Vec<(usize, usize)> = Vec::new();
        for &ti in &bad {
            let v = self.triangles[ti].v;
            for (a, b) in [(v[0], v[1]), (v[1], v[2]), (v[2], v[0])] {
                if edge_owner[&edge_key(a, b)] == 1 {
                    boundary.push((a, b));
                }
            }
        }

        for &ti in &bad_set {
            self.triangles[ti].alive = false;
        }
        for (a, b) in boundary {
            self.push_tri(a, b, idx);
        }
    }

    fn edge_exists(&self, a: usize, b: usize) -> bool {
        self.triangles.iter().any(|t| {
            t.alive
                && [(t.v[0], t.v[1]), (t.v[1], t.v[2]), (t.v[2], t.v[0])]
                    .iter()
                    .any(|&(u, w)| (u == a && w == b) || (u == b && w == a))
        })
    }

    /// True when `v` lies strictly between `a` and `b` on their segment;
    /// caller guarantees collinearity.
    fn between(&self, a: usize, b: usize, v: usize) -> bool {
        let pa = self.points[a];
        let pb = self.points[b];
        let pv = self.points[v];
        let d = [pb[0] - pa[0], pb[1] - pa[1]];
        let t = (pv[0] - pa[0]) * d[0] + (pv[1] - pa[1]) * d[1];
        t > 0.0 && t < d[0] * d[0] + d[1] * d[1]
    }

    /// Enforce the edge `a-b` as a constraint, retriangulating the
    /// corridor of triangles it crosses. Constraints that would cross
    /// another constraint are dropped with a diagnostic.
    fn insert_constraint(&mut self, a: usize, b: usize) {
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            if a == b {
                continue;
            }
            if self.edge_exists(a, b) {
                self.constrained.insert(edge_key(a, b));
                continue;
            }
            match self.trace_corridor(a, b) {
                Some(TraceResult::Corridor {
                    crossed,
                    upper,
                    lower,
                    end,
                }) => {
                    for ti in crossed {
                        self.triangles[ti].alive = false;
                    }
                    self.fill_pseudo(a, end, &upper);
                    let reversed: Vec<usize> = lower.into_iter().rev().collect();
                    self.fill_pseudo(end, a, &reversed);
                    self.constrained.insert(edge_key(a, end));
                    if end != b {
                        stack.push((end, b));
                    }
                }
                Some(TraceResult::SplitAtVertex(v)) => {
                    stack.push((a, v));
                    stack.push((v, b));
                }
                None => {
                    log::warn!("constraint edge crosses another constraint; skipping it");
                }
            }
        }
    }

    fn trace_corridor(&self, a: usize, b: usize) -> Option<TraceResult> {
        // Starting triangle: incident to `a`, with the segment exiting
        // through its opposite edge
        let mut start: Option<(usize, usize, usize)> = None;
        'tris: for (ti, t) in self.triangles.iter().enumerate() {
            if !t.alive {
                continue;
            }
            let Some(pos) = t.v.iter().position(|&v| v == a) else {
                continue;
            };
            let v1 = t.v[(pos + 1) % 3];
            let v2 = t.v[(pos + 2) % 3];
            for v in [v1, v2] {
                if self.o2d(a, b, v) == 0.0 && self.between(a, b, v) {
                    return Some(TraceResult::SplitAtVertex(v));
                }
            }
            let s1 = self.o2d(a, b, v1);
            let s2 = self.o2d(a, b, v2);
            if s1 > 0.0 && s2 < 0.0 {
                // Segment must actually leave through (v1, v2)
                let sa = self.o2d(v1, v2, a);
                let sb = self.o2d(v1, v2, b);
                if sa != 0.0 && sa.signum() != sb.signum() {
                    start = Some((ti, v1, v2));
                    break 'tris;
                }
            }
        }
        let (mut tri, mut left, mut right) = start?;

        let mut crossed = vec![tri];
        let mut upper = vec![left];
        let mut lower = vec![right];

        loop {
            if self.constrained.contains(&edge_key(left, right)) {
                return None;
            }
            let next = self.neighbor_across(tri, left, right)?;
            crossed.push(next);
            let t = self.triangles[next].v;
            let x = *t.iter().find(|&&v| v != left && v != right)?;
            if x == b {
                return Some(TraceResult::Corridor {
                    crossed,
                    upper,
                    lower,
                    end: b,
                });
            }
            let s = self.o2d(a, b, x);
            if s == 0.0 {
                // Corridor ends at a vertex sitting on the segment
                return Some(TraceResult::Corridor {
                    crossed,
                    upper,
                    lower,
                    end: x,
                });
            }
            if s > 0.0 {
                upper.push(x);
                left = x;
            } else {
                lower.push(x);
                right = x;
            }
            tri = next;
        }
    }

    fn neighbor_across(&self, tri: usize, u: usize, w: usize) -> Option<usize> {
        self.triangles
            .iter()
            .enumerate()
            .find(|(ti, t)| *ti != tri && t.alive && t.v.contains(&u) && t.v.contains(&w))
            .map(|(ti, _)| ti)
    }

    /// Retriangulate the pseudo-polygon on the left of `a -> b` whose
    /// far chain is `chain` (ordered from `a` to `b`).
    fn fill_pseudo(&mut self, a: usize, b: usize, chain: &[usize]) {
        match chain.len() {
            0 => {}
            1 => self.push_tri(a, b, chain[0]),
            _ => {
                let mut ci = 0;
                for di in 1..chain.len() {
                    if self.in_circle(a, b, chain[ci], chain[di]) > 0.0 {
                        ci = di;
                    }
                }
                let c = chain[ci];
                self.fill_pseudo(a, c, &chain[..ci]);
                self.fill_pseudo(c, b, &chain[ci + 1..]);
                self.push_tri(a, b, c);
            }
        }
    }

    /// Nesting-level flood fill: the region connected to the super
    /// triangle has level 0, and each crossing of a constrained edge
    /// increments the level. Odd levels are inside.
    fn classify(&self) -> Vec<i32> {
        let mut adjacency: AHashMap<(usize, usize), Vec<usize>> = AHashMap::new();
        for (ti, t) in self.triangles.iter().enumerate() {
            if !t.alive {
                continue;
            }
            for (u, w) in [(t.v[0], t.v[1]), (t.v[1], t.v[2]), (t.v[2], t.v[0])] {
                adjacency.entry(edge_key(u, w)).or_default().push(ti);
            }
        }

        let mut levels = vec![-1i32; self.triangles.len()];
        let seed = self
            .triangles
            .iter()
            .position(|t| t.alive && t.v.iter().any(|&v| v < SUPER));
        let Some(seed) = seed else {
            return levels;
        };

        let mut border: VecDeque<(usize, i32)> = VecDeque::new();
        border.push_back((seed, 0));

        while let Some((start, level)) = border.pop_front() {
            if levels[start] != -1 {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(start);
            levels[start] = level;
            while let Some(ti) = queue.pop_front() {
                let t = self.triangles[ti].v;
                for (u, w) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                    let key = edge_key(u, w);
                    for &ni in &adjacency[&key] {
                        if ni == ti || levels[ni] != -1 {
                            continue;
                        }
                        if self.constrained.contains(&key) {
                            border.push_back((ni, level + 1));
                        } else {
                            levels[ni] = level;
                            queue.push_back(ni);
                        }
                    }
                }
            }
        }
        levels
    }
}

enum TraceResult {
    Corridor {
        crossed: Vec<usize>,
        upper: Vec<usize>,
        lower: Vec<usize>,
        end: usize,
    },
    SplitAtVertex(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(points: &[[f64; 2]], tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| {
                let (a, b, c) = (points[t[0]], points[t[1]], points[t[2]]);
                ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])) / 2.0
            })
            .sum()
    }

    #[test]
    fn test_unit_square_area() {
        let square = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let mut cdt = Cdt::new();
        cdt.add_outline(&square);
        let tris = cdt.build();
        assert_eq!(tris.len(), 2);
        assert!((area(&square, &tris) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_square_with_hole() {
        let mut cdt = Cdt::new();
        cdt.add_outline(&[[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]);
        cdt.add_outline(&[[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]]);
        let tris = cdt.build();
        let mut pts = vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]];
        pts.extend([[1.0, 1.0], [3.0, 1.0], [3.0, 3.0], [1.0, 3.0]]);
        assert!((area(&pts, &tris) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_input_yields_no_triangles() {
        // Zero-area "polygon": all points on one line
        let mut cdt = Cdt::new();
        cdt.add_outline(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
        let tris = cdt.build();
        assert!(tris.is_empty());
    }

    #[test]
    fn test_duplicate_vertices_merged() {
        let mut cdt = Cdt::new();
        cdt.add_outline(&[
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
        ]);
        assert_eq!(cdt.duplicate_count(), 1);
        let tris = cdt.build();
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn test_concave_outline() {
        // L-shape, area 3
        let l = [
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
        ];
        let mut cdt = Cdt::new();
        cdt.add_outline(&l);
        let tris = cdt.build();
        assert!((area(&l, &tris) - 3.0).abs() < 1e-12);
        // Triangles are counter-clockwise
        for t in &tris {
            let (a, b, c) = (l[t[0]], l[t[1]], l[t[2]]);
            let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            assert!(cross > 0.0);
        }
    }
}
