// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Linear and rotational extrusion of outline shapes

use super::cancel::checkpoint;
use super::csg;
use super::primitives::check_segments;
use super::shape2::Shape2;
use super::solid::Solid;
use super::{check_budget, ModelingError, MAX_POLYGONS};
use crate::geometry::{extrude_solid, polygon::triangulate};
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use std::f64::consts::TAU;

/// Hole cutters overshoot the body by this much on both caps
const HOLE_MARGIN: f64 = 0.01;

fn to_f32(outline: &[Point2<f64>]) -> Vec<Point2<f32>> {
    outline
        .iter()
        .map(|p| Point2::new(p.x as f32, p.y as f32))
        .collect()
}

/// Closed prism over one outline from `z0` to `z1`
fn prism(outline: &[Point2<f64>], z0: f64, z1: f64) -> Result<Solid, ModelingError> {
    let buffer = extrude_solid(&to_f32(outline), (z1 - z0) as f32)
        .map_err(|e| ModelingError::new(e.to_string()))?;
    Ok(Solid::from_buffer(&buffer).transform(&Matrix4::new_translation(&Vector3::new(0.0, 0.0, z0))))
}

fn reversed(outline: &[Point2<f64>]) -> Vec<Point2<f64>> {
    outline.iter().rev().copied().collect()
}

/// Extrude every solid outline to `height` and cut the holes through
pub fn extrude_linear(shape: &Shape2, height: f64) -> Result<Solid, ModelingError> {
    if !(height.is_finite() && height > 0.0) {
        return Err(ModelingError::new(format!("height must be positive, got {}", height)));
    }
    if shape.is_empty() {
        return Err(ModelingError::new("cannot extrude an empty shape"));
    }

    let mut body = Solid::default();
    for outline in shape.solids() {
        checkpoint()?;
        body = csg::union(&body, &prism(outline, 0.0, height)?);
    }
    for hole in shape.holes() {
        checkpoint()?;
        let cutter = prism(&reversed(hole), -HOLE_MARGIN, height + HOLE_MARGIN)?;
        body = csg::subtract(&body, &cutter);
    }
    Ok(body)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotateOptions {
    pub angle: f64,
    pub start_angle: f64,
    pub segments: usize,
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            angle: TAU,
            start_angle: 0.0,
            segments: 32,
        }
    }
}

/// Point of the XY outline swept to angle `theta` about the Z axis (x is the radius)
fn swept(p: &Point2<f64>, theta: f64) -> Point3<f64> {
    Point3::new(p.x * theta.cos(), p.x * theta.sin(), p.y)
}

/// Flat cap at `theta` facing `facing`
fn cap_loops(outline: &[Point2<f64>], theta: f64, facing: Vector3<f64>) -> Vec<Vec<Point3<f64>>> {
    triangulate(&to_f32(outline))
        .into_iter()
        .map(|[a, b, c]| {
            let mut face = vec![
                swept(&outline[a], theta),
                swept(&outline[b], theta),
                swept(&outline[c], theta),
            ];
            let normal = (face[1] - face[0]).cross(&(face[2] - face[0]));
            if normal.dot(&facing) < 0.0 {
                face.reverse();
            }
            face
        })
        .collect()
}

/// Revolve one counter-clockwise outline
fn revolve(
    outline: &[Point2<f64>],
    options: &RotateOptions,
    steps: usize,
    closed: bool,
) -> Result<Solid, ModelingError> {
    let n = outline.len();
    let count = steps.checked_mul(n).and_then(|c| c.checked_add(2 * n));
    let count = check_budget("revolved polygon count", count, MAX_POLYGONS)?;
    let theta = |k: usize| {
        let k = if closed { k % steps } else { k };
        options.start_angle + options.angle * k as f64 / steps as f64
    };

    let mut loops = Vec::with_capacity(count);
    for k in 0..steps {
        checkpoint()?;
        let (t0, t1) = (theta(k), theta(k + 1));
        for i in 0..n {
            let p = &outline[i];
            let q = &outline[(i + 1) % n];
            loops.push(vec![swept(p, t0), swept(p, t1), swept(q, t1), swept(q, t0)]);
        }
    }

    if !closed {
        let (start, end) = (theta(0), theta(steps));
        loops.extend(cap_loops(outline, start, Vector3::new(start.sin(), -start.cos(), 0.0)));
        loops.extend(cap_loops(outline, end, Vector3::new(-end.sin(), end.cos(), 0.0)));
    }
    Solid::try_from_loops(loops)
}

/// Revolve the shape about the Z axis, reading outline x as radius and y as height
pub fn extrude_rotate(shape: &Shape2, options: &RotateOptions) -> Result<Solid, ModelingError> {
    if shape.is_empty() {
        return Err(ModelingError::new("cannot extrude an empty shape"));
    }
    if shape.points().any(|p| p.x < -1e-9) {
        return Err(ModelingError::new(
            "extrudeRotate needs every point on the positive X side of the axis",
        ));
    }
    if !(options.angle.is_finite() && options.angle.abs() > 1e-9) {
        return Err(ModelingError::new(format!("angle must be non-zero, got {}", options.angle)));
    }
    check_segments(options.segments, 3)?;

    let options = RotateOptions {
        angle: options.angle.abs().min(TAU),
        ..*options
    };
    let closed = options.angle >= TAU - 1e-9;
    let steps = ((options.segments as f64 * options.angle / TAU).ceil() as usize).max(1);

    let mut body = Solid::default();
    for outline in shape.solids() {
        body = csg::union(&body, &revolve(outline, &options, steps, closed)?);
    }
    for hole in shape.holes() {
        body = csg::subtract(&body, &revolve(&reversed(hole), &options, steps, closed)?);
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::primitives::{circle, rectangle};
    use crate::modeling::transforms::Transform;
    use crate::modeling::Geometry;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_linear_box() {
        let solid = extrude_linear(&rectangle([2.0, 3.0]).unwrap(), 4.0).unwrap();
        assert_relative_eq!(solid.volume(), 24.0, epsilon = 1e-4);
        let (min, max) = solid.bounds().unwrap();
        assert_relative_eq!(min.z, 0.0);
        assert_relative_eq!(max.z, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_linear_with_hole() {
        let outer = rectangle([10.0, 10.0]).unwrap();
        let inner = rectangle([4.0, 4.0]).unwrap();
        let solid = extrude_linear(&outer.subtract(&inner), 2.0).unwrap();
        assert_relative_eq!(solid.volume(), (100.0 - 16.0) * 2.0, epsilon = 1e-2);
    }

    #[test]
    fn test_rotate_full_ring() {
        // 1x1 square, radius 2..3
        let square = Transform::Translate(Vector3::new(2.5, 0.0, 0.0))
            .apply(&Geometry::Shape(rectangle([1.0, 1.0]).unwrap()));
        let Geometry::Shape(square) = square else {
            panic!("expected a shape");
        };
        let options = RotateOptions {
            segments: 128,
            ..Default::default()
        };
        let solid = extrude_rotate(&square, &options).unwrap();
        let exact = PI * (9.0 - 4.0);
        assert_relative_eq!(solid.volume(), exact, max_relative = 0.01);
    }

    #[test]
    fn test_rotate_half_turn_is_closed() {
        let disc = Transform::Translate(Vector3::new(3.0, 0.0, 0.0))
            .apply(&Geometry::Shape(circle(1.0, 32).unwrap()));
        let Geometry::Shape(disc) = disc else {
            panic!("expected a shape");
        };
        let options = RotateOptions {
            angle: PI,
            segments: 64,
            ..Default::default()
        };
        let solid = extrude_rotate(&disc, &options).unwrap();
        let full = 2.0 * PI * PI * 3.0;
        assert_relative_eq!(solid.volume(), full / 2.0, max_relative = 0.02);
    }

    #[test]
    fn test_rotate_rejects_negative_radius() {
        let centered = circle(1.0, 16).unwrap();
        assert!(extrude_rotate(&centered, &RotateOptions::default()).is_err());
    }

    #[test]
    fn test_rotate_limits_generated_polygons() {
        let ring: Vec<Point2<f64>> = (0..2000)
            .map(|i| {
                let a = TAU * i as f64 / 2000.0;
                Point2::new(5.0 + a.cos(), a.sin())
            })
            .collect();
        let shape = Shape2::from_outline(ring);
        let options = RotateOptions {
            segments: 1024,
            ..RotateOptions::default()
        };
        let err = extrude_rotate(&shape, &options).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit"), "{}", err);

        let options = RotateOptions {
            segments: 1 << 20,
            ..RotateOptions::default()
        };
        let square = Shape2::from_outline(vec![
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
        ]);
        let err = extrude_rotate(&square, &options).unwrap_err();
        assert!(err.to_string().contains("at most"), "{}", err);
    }
}
