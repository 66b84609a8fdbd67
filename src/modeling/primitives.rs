// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator.
//!
//! Every primitive is centred on the origin; callers translate it to the
//! requested centre afterwards.

use super::cancel::checkpoint;
use super::hull::{hull_points, MAX_HULL_POINTS};
use super::shape2::Shape2;
use super::solid::Solid;
use super::{check_budget, ModelingError, MAX_POINTS};
use nalgebra::{Point2, Point3};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

pub const DEFAULT_SEGMENTS: usize = 32;
/// Finest tessellation any primitive accepts
pub const MAX_SEGMENTS: usize = 1024;

pub(crate) fn check_segments(segments: usize, minimum: usize) -> Result<usize, ModelingError> {
    if segments < minimum {
        return Err(ModelingError::new(format!(
            "segments must be at least {}, got {}",
            minimum, segments
        )));
    }
    if segments > MAX_SEGMENTS {
        return Err(ModelingError::new(format!(
            "segments must be at most {}, got {}",
            MAX_SEGMENTS, segments
        )));
    }
    Ok(segments)
}

fn check_positive(name: &str, value: f64) -> Result<f64, ModelingError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ModelingError::new(format!("{} must be positive, got {}", name, value)))
    }
}

/// Axis-aligned box
pub fn cuboid(size: [f64; 3]) -> Solid {
    let [hx, hy, hz] = [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0];
    let p = |x: f64, y: f64, z: f64| Point3::new(x * hx, y * hy, z * hz);
    Solid::from_loops([
        vec![p(-1.0, -1.0, -1.0), p(-1.0, -1.0, 1.0), p(-1.0, 1.0, 1.0), p(-1.0, 1.0, -1.0)],
        vec![p(1.0, -1.0, -1.0), p(1.0, 1.0, -1.0), p(1.0, 1.0, 1.0), p(1.0, -1.0, 1.0)],
        vec![p(-1.0, -1.0, -1.0), p(1.0, -1.0, -1.0), p(1.0, -1.0, 1.0), p(-1.0, -1.0, 1.0)],
        vec![p(-1.0, 1.0, -1.0), p(-1.0, 1.0, 1.0), p(1.0, 1.0, 1.0), p(1.0, 1.0, -1.0)],
        vec![p(-1.0, -1.0, -1.0), p(-1.0, 1.0, -1.0), p(1.0, 1.0, -1.0), p(1.0, -1.0, -1.0)],
        vec![p(-1.0, -1.0, 1.0), p(1.0, -1.0, 1.0), p(1.0, 1.0, 1.0), p(-1.0, 1.0, 1.0)],
    ])
}

pub fn checked_cuboid(size: [f64; 3]) -> Result<Solid, ModelingError> {
    for (axis, s) in ["x", "y", "z"].iter().zip(size) {
        check_positive(&format!("size {}", axis), s)?;
    }
    Ok(cuboid(size))
}

/// Unit-direction sample on a sphere, Z up
fn sphere_direction(theta: f64, phi: f64) -> [f64; 3] {
    [theta.cos() * phi.sin(), theta.sin() * phi.sin(), phi.cos()]
}

/// Latitude/longitude sphere
pub fn sphere(radius: f64, segments: usize) -> Result<Solid, ModelingError> {
    check_positive("radius", radius)?;
    let slices = check_segments(segments, 4)?;
    let stacks = (slices / 2).max(2);

    let vertex = |i: usize, j: usize| {
        let [x, y, z] = sphere_direction(TAU * i as f64 / slices as f64, PI * j as f64 / stacks as f64);
        Point3::new(x * radius, y * radius, z * radius)
    };

    let mut loops = Vec::with_capacity(slices * stacks);
    for i in 0..slices {
        checkpoint()?;
        for j in 0..stacks {
            let mut face = vec![vertex(i, j)];
            if j > 0 {
                face.push(vertex(i + 1, j));
            }
            if j < stacks - 1 {
                face.push(vertex(i + 1, j + 1));
            }
            face.push(vertex(i, j + 1));
            face.reverse();
            loops.push(face);
        }
    }
    Solid::try_from_loops(loops)
}

/// Upright cylinder spanning z = -height/2 .. height/2
pub fn cylinder(height: f64, radius: f64, segments: usize) -> Result<Solid, ModelingError> {
    check_positive("height", height)?;
    check_positive("radius", radius)?;
    let segments = check_segments(segments, 3)?;
    let h = height / 2.0;

    let ring: Vec<(f64, f64)> = (0..segments)
        .map(|i| {
            let a = TAU * i as f64 / segments as f64;
            (radius * a.cos(), radius * a.sin())
        })
        .collect();

    let mut loops = Vec::with_capacity(segments + 2);
    loops.push(ring.iter().rev().map(|&(x, y)| Point3::new(x, y, -h)).collect());
    loops.push(ring.iter().map(|&(x, y)| Point3::new(x, y, h)).collect());
    for i in 0..segments {
        let (x0, y0) = ring[i];
        let (x1, y1) = ring[(i + 1) % segments];
        loops.push(vec![
            Point3::new(x0, y0, -h),
            Point3::new(x1, y1, -h),
            Point3::new(x1, y1, h),
            Point3::new(x0, y0, h),
        ]);
    }
    Solid::try_from_loops(loops)
}

/// Ring of `tube` radius swept around the Z axis at distance `ring`
pub fn torus(
    tube: f64,
    ring: f64,
    tube_segments: usize,
    ring_segments: usize,
) -> Result<Solid, ModelingError> {
    check_positive("innerRadius", tube)?;
    check_positive("outerRadius", ring)?;
    if tube >= ring {
        return Err(ModelingError::new(format!(
            "innerRadius {} must be smaller than outerRadius {}",
            tube, ring
        )));
    }
    let tube_segments = check_segments(tube_segments, 3)?;
    let ring_segments = check_segments(ring_segments, 3)?;

    let point = |i: usize, j: usize| {
        let theta = TAU * i as f64 / ring_segments as f64;
        let phi = TAU * j as f64 / tube_segments as f64;
        let r = ring + tube * phi.cos();
        Point3::new(r * theta.cos(), r * theta.sin(), tube * phi.sin())
    };

    let mut loops = Vec::with_capacity(ring_segments * tube_segments);
    for i in 0..ring_segments {
        checkpoint()?;
        for j in 0..tube_segments {
            loops.push(vec![point(i, j), point(i + 1, j), point(i + 1, j + 1), point(i, j + 1)]);
        }
    }
    Solid::try_from_loops(loops)
}

/// Box with rounded edges and corners.
///
/// The radius must be positive and smaller than half of every size component.
pub fn rounded_cuboid(size: [f64; 3], radius: f64, segments: usize) -> Result<Solid, ModelingError> {
    for s in size {
        check_positive("size", s)?;
    }
    if !(radius > 0.0 && size.iter().all(|s| radius < s / 2.0)) {
        return Err(ModelingError::new(format!(
            "roundRadius {} must be greater than 0 and less than half of size {:?}",
            radius, size
        )));
    }
    let segments = check_segments(segments, 4)?;

    let inner = size.map(|s| s / 2.0 - radius);
    let stacks = (segments / 4).max(1);
    let slices = segments;

    let count = check_budget(
        "rounded cuboid point count",
        Some(8 * slices * (2 * stacks + 1)),
        MAX_HULL_POINTS,
    )?;
    let mut points = Vec::with_capacity(count);
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                checkpoint()?;
                let center = Point3::new(sx * inner[0], sy * inner[1], sz * inner[2]);
                for i in 0..slices {
                    for j in 0..=2 * stacks {
                        let theta = TAU * i as f64 / slices as f64;
                        let phi = PI * j as f64 / (2 * stacks) as f64;
                        let [x, y, z] = sphere_direction(theta, phi);
                        points.push(center + nalgebra::Vector3::new(x, y, z) * radius);
                    }
                }
            }
        }
    }
    hull_points(&points)
}

/// Cylinder with rounded top and bottom rims
pub fn rounded_cylinder(
    height: f64,
    radius: f64,
    round_radius: f64,
    segments: usize,
) -> Result<Solid, ModelingError> {
    check_positive("height", height)?;
    check_positive("radius", radius)?;
    if !(round_radius > 0.0 && round_radius < radius && round_radius < height / 2.0) {
        return Err(ModelingError::new(format!(
            "roundRadius {} must be greater than 0 and less than the radius and half the height",
            round_radius
        )));
    }
    let segments = check_segments(segments, 4)?;
    let arc_steps = (segments / 4).max(1);
    let core = radius - round_radius;
    let half = height / 2.0 - round_radius;

    let count = check_budget(
        "rounded cylinder point count",
        Some(2 * segments * (arc_steps + 1)),
        MAX_HULL_POINTS,
    )?;
    let mut points = Vec::with_capacity(count);
    for sz in [-1.0, 1.0] {
        for k in 0..=arc_steps {
            checkpoint()?;
            let phi = FRAC_PI_2 * k as f64 / arc_steps as f64;
            let r = core + round_radius * phi.cos();
            let z = sz * (half + round_radius * phi.sin());
            for i in 0..segments {
                let theta = TAU * i as f64 / segments as f64;
                points.push(Point3::new(r * theta.cos(), r * theta.sin(), z));
            }
        }
    }
    hull_points(&points)
}

/// Regular polygon approximation of a circle
pub fn circle(radius: f64, segments: usize) -> Result<Shape2, ModelingError> {
    check_positive("radius", radius)?;
    let segments = check_segments(segments, 3)?;
    Ok(Shape2::from_outline(
        (0..segments)
            .map(|i| {
                let a = TAU * i as f64 / segments as f64;
                Point2::new(radius * a.cos(), radius * a.sin())
            })
            .collect(),
    ))
}

pub fn rectangle(size: [f64; 2]) -> Result<Shape2, ModelingError> {
    check_positive("size x", size[0])?;
    check_positive("size y", size[1])?;
    let (hx, hy) = (size[0] / 2.0, size[1] / 2.0);
    Ok(Shape2::from_outline(vec![
        Point2::new(-hx, -hy),
        Point2::new(hx, -hy),
        Point2::new(hx, hy),
        Point2::new(-hx, hy),
    ]))
}

pub fn rounded_rectangle(size: [f64; 2], radius: f64, segments: usize) -> Result<Shape2, ModelingError> {
    check_positive("size x", size[0])?;
    check_positive("size y", size[1])?;
    if !(radius >= 0.0 && radius < size[0] / 2.0 && radius < size[1] / 2.0) {
        return Err(ModelingError::new(format!(
            "roundRadius {} must not be negative and less than half of size {:?}",
            radius, size
        )));
    }
    if radius == 0.0 {
        return rectangle(size);
    }
    let segments = check_segments(segments, 4)?;
    let steps = (segments / 4).max(1);
    let (cx, cy) = (size[0] / 2.0 - radius, size[1] / 2.0 - radius);

    let corners = [(cx, cy, 0.0), (-cx, cy, FRAC_PI_2), (-cx, -cy, PI), (cx, -cy, 3.0 * FRAC_PI_2)];
    let mut outline = Vec::with_capacity(4 * (steps + 1));
    for (x, y, start) in corners {
        for k in 0..=steps {
            let a = start + FRAC_PI_2 * k as f64 / steps as f64;
            outline.push(Point2::new(x + radius * a.cos(), y + radius * a.sin()));
        }
    }
    Ok(Shape2::from_outline(outline))
}

/// Arbitrary simple polygon
pub fn polygon(points: Vec<Point2<f64>>) -> Result<Shape2, ModelingError> {
    if points.len() < 3 {
        return Err(ModelingError::new(format!(
            "polygon needs at least 3 points, got {}",
            points.len()
        )));
    }
    check_budget("polygon point count", Some(points.len()), MAX_POINTS)?;
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(ModelingError::new("polygon points must be finite"));
    }
    Ok(Shape2::from_outline(points))
}
