// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 csgforge contributors

//! Exact BSP clipping for 2D boundary segments
//!
//! The 2D kernel mirrors the 3D one with planes replaced by oriented
//! lines and polygons by boundary segments. A region's boundary runs
//! counter-clockwise, interior on the left of each segment.

use super::num::{ELine, EPoint2};
use num_traits::Signed;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Oriented boundary segment with its exact supporting line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ESegment {
    pub a: EPoint2,
    pub b: EPoint2,
    pub line: ELine,
}

impl ESegment {
    pub fn new(a: EPoint2, b: EPoint2) -> Option<Self> {
        let line = ELine::from_points(&a, &b)?;
        Some(Self { a, b, line })
    }

    pub fn flip(&mut self) {
        std::mem::swap(&mut self.a, &mut self.b);
        self.line = self.line.flipped();
    }
}

fn split_segment(
    line: &ELine,
    seg: &ESegment,
    coplanar_front: &mut Vec<ESegment>,
    coplanar_back: &mut Vec<ESegment>,
    front: &mut Vec<ESegment>,
    back: &mut Vec<ESegment>,
) {
    let sa = line.side(&seg.a);
    let sb = line.side(&seg.b);

    match (sa, sb) {
        (Ordering::Equal, Ordering::Equal) => {
            let dot = &line.normal[0] * &seg.line.normal[0] + &line.normal[1] * &seg.line.normal[1];
            if dot.is_negative() {
                coplanar_back.push(seg.clone());
            } else {
                coplanar_front.push(seg.clone());
            }
        }
        (Ordering::Greater, Ordering::Less) | (Ordering::Less, Ordering::Greater) => {
            let da = line.eval(&seg.a);
            let db = line.eval(&seg.b);
            let t = &da / (&da - &db);
            let mid = seg.a.lerp(&seg.b, &t);
            let first = ESegment {
                a: seg.a.clone(),
                b: mid.clone(),
                line: seg.line.clone(),
            };
            let second = ESegment {
                a: mid,
                b: seg.b.clone(),
                line: seg.line.clone(),
            };
            if sa == Ordering::Greater {
                front.push(first);
                back.push(second);
            } else {
                back.push(first);
                front.push(second);
            }
        }
        _ if sa == Ordering::Greater || sb == Ordering::Greater => front.push(seg.clone()),
        _ => back.push(seg.clone()),
    }
}

/// BSP node over boundary segments.
#[derive(Debug, Default)]
pub struct BspNode2 {
    line: Option<ELine>,
    front: Option<Box<BspNode2>>,
    back: Option<Box<BspNode2>>,
    segments: Vec<ESegment>,
}

impl BspNode2 {
    pub fn new(segments: Vec<ESegment>) -> Self {
        let mut node = Self::default();
        node.build(segments);
        node
    }

    pub fn build(&mut self, segments: Vec<ESegment>) {
        if segments.is_empty() {
            return;
        }
        if self.line.is_none() {
            self.line = Some(segments[0].line.clone());
        }
        let line = self.line.clone().expect("line set above");

        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front_segs = Vec::new();
        let mut back_segs = Vec::new();
        for seg in &segments {
            split_segment(
                &line,
                seg,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front_segs,
                &mut back_segs,
            );
        }
        self.segments.append(&mut coplanar_front);
        self.segments.append(&mut coplanar_back);

        if !front_segs.is_empty() {
            self.front
                .get_or_insert_with(|| Box::new(BspNode2::default()))
                .build(front_segs);
        }
        if !back_segs.is_empty() {
            self.back
                .get_or_insert_with(|| Box::new(BspNode2::default()))
                .build(back_segs);
        }
    }

    pub fn invert(&mut self) {
        for seg in &mut self.segments {
            seg.flip();
        }
        if let Some(line) = &mut self.line {
            *line = line.flipped();
        }
        std::mem::swap(&mut self.front, &mut self.back);
        if let Some(front) = &mut self.front {
            front.invert();
        }
        if let Some(back) = &mut self.back {
            back.invert();
        }
    }

    pub fn clip_segments(&self, segments: &[ESegment]) -> Vec<ESegment> {
        let Some(line) = &self.line else {
            return segments.to_vec();
        };

        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for seg in segments {
            split_segment(
                line,
                seg,
                &mut coplanar_front,
                &mut coplanar_back,
                &mut front,
                &mut back,
            );
        }
        front.append(&mut coplanar_front);
        back.append(&mut coplanar_back);

        let front = match &self.front {
            Some(node) => node.clip_segments(&front),
            None => front,
        };
        let mut result = front;
        if let Some(node) = &self.back {
            result.extend(node.clip_segments(&back));
        }
        result
    }

    pub fn clip_to(&mut self, other: &BspNode2) {
        self.segments = other.clip_segments(&self.segments);
        if let Some(front) = &mut self.front {
            front.clip_to(other);
        }
        if let Some(back) = &mut self.back {
            back.clip_to(other);
        }
    }

    pub fn all_segments(&self) -> Vec<ESegment> {
        let mut result = self.segments.clone();
        if let Some(front) = &self.front {
            result.extend(front.all_segments());
        }
        if let Some(back) = &self.back {
            result.extend(back.all_segments());
        }
        result
    }
}

pub fn union(a_segs: Vec<ESegment>, b_segs: Vec<ESegment>) -> Vec<ESegment> {
    let mut a = BspNode2::new(a_segs);
    let mut b = BspNode2::new(b_segs);
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_segments());
    a.all_segments()
}

pub fn difference(a_segs: Vec<ESegment>, b_segs: Vec<ESegment>) -> Vec<ESegment> {
    let mut a = BspNode2::new(a_segs);
    let mut b = BspNode2::new(b_segs);
    a.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    b.invert();
    b.clip_to(&a);
    b.invert();
    a.build(b.all_segments());
    a.invert();
    a.all_segments()
}

pub fn intersection(a_segs: Vec<ESegment>, b_segs: Vec<ESegment>) -> Vec<ESegment> {
    let mut a = BspNode2::new(a_segs);
    let mut b = BspNode2::new(b_segs);
    a.invert();
    b.clip_to(&a);
    b.invert();
    a.clip_to(&b);
    b.clip_to(&a);
    a.build(b.all_segments());
    a.invert();
    a.all_segments()
}

/// Chain loose segments into closed loops by exact endpoint matching.
/// Segments that cannot be chained (open chains from degenerate input)
/// are dropped and reported in the return's second slot.
pub fn chain_loops(segments: &[ESegment]) -> (Vec<Vec<EPoint2>>, usize) {
    let mut remaining: Vec<&ESegment> = segments.iter().collect();
    let mut loops = Vec::new();
    let mut dropped = 0;

    while let Some(first) = remaining.pop() {
        let mut chain = vec![first.a.clone(), first.b.clone()];
        loop {
            let tail = chain.last().expect("chain never empty").clone();
            if tail == chain[0] {
                chain.pop();
                break;
            }
            match remaining.iter().position(|s| s.a == tail) {
                Some(i) => {
                    let seg = remaining.swap_remove(i);
                    chain.push(seg.b.clone());
                }
                None => {
                    dropped += chain.len() - 1;
                    chain.clear();
                    break;
                }
            }
        }
        if chain.len() >= 3 {
            loops.push(chain);
        }
    }
    (loops, dropped)
}
