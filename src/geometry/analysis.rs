// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh validation utilities.
//!
//! Buffers never share vertices between triangles, so connectivity is
//! recovered by matching quantized positions rather than indices.

use super::GeometryBuffer;
use ahash::AHashMap;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Quantized position used as a hash key
type PositionKey = (i64, i64, i64);

/// Undirected edge between two quantized positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Edge {
    a: PositionKey,
    b: PositionKey,
}

impl Edge {
    fn new(a: PositionKey, b: PositionKey) -> Self {
        // Always store edges with smaller key first for consistent hashing
        if a <= b {
            Self { a, b }
        } else {
            Self { a: b, b: a }
        }
    }
}

/// Connectivity summary of a buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeReport {
    pub edge_count: usize,
    /// Edges used by exactly one triangle
    pub boundary_edges: usize,
    /// Edges used by more than two triangles
    pub non_manifold_edges: usize,
    /// Edges whose two triangles traverse them in the same direction
    pub inconsistent_edges: usize,
}

impl EdgeReport {
    /// Every edge shared by exactly two triangles, traversed in opposite directions
    pub fn is_watertight(&self) -> bool {
        self.edge_count > 0
            && self.boundary_edges == 0
            && self.non_manifold_edges == 0
            && self.inconsistent_edges == 0
    }
}

fn quantize(p: &Point3<f32>, tolerance: f32) -> PositionKey {
    let q = |v: f32| (v / tolerance).round() as i64;
    (q(p.x), q(p.y), q(p.z))
}

/// Count how each edge of the buffer is used, matching positions within `tolerance`
pub fn edge_report(buffer: &GeometryBuffer, tolerance: f32) -> EdgeReport {
    // per undirected edge: (uses, forward uses)
    let mut edges: AHashMap<Edge, (u32, u32)> = AHashMap::new();

    for tri in buffer.triangles() {
        let keys = [
            quantize(&tri[0], tolerance),
            quantize(&tri[1], tolerance),
            quantize(&tri[2], tolerance),
        ];
        for i in 0..3 {
            let (from, to) = (keys[i], keys[(i + 1) % 3]);
            if from == to {
                continue;
            }
            let edge = Edge::new(from, to);
            let entry = edges.entry(edge).or_insert((0, 0));
            entry.0 += 1;
            if edge.a == from {
                entry.1 += 1;
            }
        }
    }

    let mut report = EdgeReport {
        edge_count: edges.len(),
        boundary_edges: 0,
        non_manifold_edges: 0,
        inconsistent_edges: 0,
    };
    for &(uses, forward) in edges.values() {
        match uses {
            1 => report.boundary_edges += 1,
            2 if forward != 1 => report.inconsistent_edges += 1,
            2 => {}
            _ => report.non_manifold_edges += 1,
        }
    }
    report
}

/// Signed enclosed volume (positive for outward-facing closed meshes)
pub fn signed_volume(buffer: &GeometryBuffer) -> f64 {
    buffer
        .triangles()
        .map(|[a, b, c]| {
            let a = a.coords.cast::<f64>();
            let b = b.coords.cast::<f64>();
            let c = c.coords.cast::<f64>();
            a.dot(&b.cross(&c)) / 6.0
        })
        .sum()
}

/// Total surface area
pub fn surface_area(buffer: &GeometryBuffer) -> f64 {
    buffer
        .triangles()
        .map(|[a, b, c]| f64::from((b - a).cross(&(c - a)).norm()) * 0.5)
        .sum()
}
