// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Linear extrusion of a closed 2D loop into a solid or hollow prism

use super::polygon::{normalize_winding, triangulate};
use super::{GeometryBuffer, MeshBuilder};
use crate::error::{KernelError, Result};
use nalgebra::{Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Inner offset never moves a vertex further than this share of its shorter edge
const MITER_EDGE_LIMIT: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtrudeOptions {
    pub height: f32,
    /// Hollow mode when set
    #[serde(default)]
    pub wall_thickness: Option<f32>,
}

impl ExtrudeOptions {
    pub fn solid(height: f32) -> Self {
        Self {
            height,
            wall_thickness: None,
        }
    }

    pub fn hollow(height: f32, wall_thickness: f32) -> Self {
        Self {
            height,
            wall_thickness: Some(wall_thickness),
        }
    }
}

/// Extrude `points` along +Z according to `options`
pub fn extrude(points: &[Point2<f32>], options: &ExtrudeOptions) -> Result<GeometryBuffer> {
    match options.wall_thickness {
        Some(wall) => extrude_hollow(points, options.height, wall),
        None => extrude_solid(points, options.height),
    }
}

fn check_loop(points: &[Point2<f32>], height: f32) -> Result<()> {
    if points.len() < 3 {
        return Err(KernelError::invalid_input(format!(
            "extrusion needs at least 3 points, got {}",
            points.len()
        )));
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(KernelError::invalid_input("extrusion loop has non-finite coordinates"));
    }
    if !height.is_finite() || height <= 0.0 {
        return Err(KernelError::invalid_input(format!(
            "extrusion height must be positive, got {}",
            height
        )));
    }
    Ok(())
}

fn at(p: &Point2<f32>, z: f32) -> Point3<f32> {
    Point3::new(p.x, p.y, z)
}

/// Unit normal pointing out of a counter-clockwise loop across edge a-b
fn outward_normal(a: &Point2<f32>, b: &Point2<f32>) -> Vector3<f32> {
    let d = b - a;
    let n = Vector3::new(d.y, -d.x, 0.0);
    let len = n.norm();
    if len > f32::EPSILON {
        n / len
    } else {
        Vector3::zeros()
    }
}

/// Closed prism: caps at z = 0 and z = height joined by one quad per edge
pub fn extrude_solid(points: &[Point2<f32>], height: f32) -> Result<GeometryBuffer> {
    check_loop(points, height)?;

    let ring = normalize_winding(points);
    let n = ring.len();
    let caps = triangulate(&ring);
    let mut builder = MeshBuilder::with_capacity(2 * caps.len() + 2 * n);

    for &[a, b, c] in &caps {
        builder.push_triangle(
            at(&ring[a], height),
            at(&ring[b], height),
            at(&ring[c], height),
            Vector3::z(),
        );
        builder.push_triangle(
            at(&ring[a], 0.0),
            at(&ring[c], 0.0),
            at(&ring[b], 0.0),
            -Vector3::z(),
        );
    }

    for i in 0..n {
        let p = &ring[i];
        let q = &ring[(i + 1) % n];
        builder.push_quad(
            at(p, 0.0),
            at(q, 0.0),
            at(q, height),
            at(p, height),
            outward_normal(p, q),
        );
    }

    let buffer = builder.build();
    log::debug!(
        "solid extrusion: {} points, {} triangles",
        n,
        buffer.triangle_count()
    );
    Ok(buffer)
}

/// Offset a counter-clockwise loop inwards by `wall` along each corner's bisector
fn inset_loop(ring: &[Point2<f32>], wall: f32) -> Vec<Point2<f32>> {
    let n = ring.len();
    let left = |a: &Point2<f32>, b: &Point2<f32>| -> Vector2<f32> {
        let d = b - a;
        let v = Vector2::new(-d.y, d.x);
        let len = v.norm();
        if len > f32::EPSILON {
            v / len
        } else {
            Vector2::zeros()
        }
    };

    (0..n)
        .map(|i| {
            let prev = &ring[(i + n - 1) % n];
            let cur = &ring[i];
            let next = &ring[(i + 1) % n];

            let n_in = left(prev, cur);
            let n_out = left(cur, next);
            let sum = n_in + n_out;
            let (direction, cos_half) = if sum.norm() > 1e-6 {
                let bisector = sum.normalize();
                (bisector, bisector.dot(&n_in))
            } else {
                // hairpin corner
                (n_in, 1.0)
            };

            let miter = if cos_half > 1e-6 { wall / cos_half } else { wall };
            let shorter = (cur - prev).norm().min((next - cur).norm());
            let distance = miter.min(MITER_EDGE_LIMIT * shorter);
            cur + direction * distance
        })
        .collect()
}

/// Push a closed tube between two matching counter-clockwise loops.
///
/// `inner[i]` must be the inset partner of `outer[i]`. Emits the outer wall,
/// the inner wall facing the cavity and annular caps at z = 0 and z = height,
/// eight triangles per loop edge.
pub(crate) fn push_tube(
    builder: &mut MeshBuilder,
    outer: &[Point2<f32>],
    inner: &[Point2<f32>],
    height: f32,
) {
    let n = outer.len().min(inner.len());
    for i in 0..n {
        let j = (i + 1) % n;
        let (o0, o1) = (&outer[i], &outer[j]);
        let (i0, i1) = (&inner[i], &inner[j]);

        builder.push_quad(
            at(o0, 0.0),
            at(o1, 0.0),
            at(o1, height),
            at(o0, height),
            outward_normal(o0, o1),
        );
        // inner wall faces the cavity
        builder.push_quad(
            at(i1, 0.0),
            at(i0, 0.0),
            at(i0, height),
            at(i1, height),
            -outward_normal(i0, i1),
        );
        builder.push_quad(
            at(o0, height),
            at(o1, height),
            at(i1, height),
            at(i0, height),
            Vector3::z(),
        );
        builder.push_quad(
            at(o0, 0.0),
            at(i0, 0.0),
            at(i1, 0.0),
            at(o1, 0.0),
            -Vector3::z(),
        );
    }
}

/// Tube whose inner wall is the loop inset by `wall`
pub fn extrude_hollow(points: &[Point2<f32>], height: f32, wall: f32) -> Result<GeometryBuffer> {
    check_loop(points, height)?;
    if !wall.is_finite() || wall <= 0.0 {
        return Err(KernelError::invalid_input(format!(
            "wall thickness must be positive, got {}",
            wall
        )));
    }

    let outer = normalize_winding(points);
    let inner = inset_loop(&outer, wall);
    let mut builder = MeshBuilder::with_capacity(8 * outer.len());
    push_tube(&mut builder, &outer, &inner, height);

    let buffer = builder.build();
    log::debug!(
        "hollow extrusion: {} points, wall {}, {} triangles",
        outer.len(),
        wall,
        buffer.triangle_count()
    );
    Ok(buffer)
}
