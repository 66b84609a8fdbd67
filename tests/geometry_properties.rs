// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Randomized geometric properties of the mesh generators

use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solidcraft::geometry::analysis::edge_report;
use solidcraft::geometry::heightfield::{generate, grid_size};
use solidcraft::geometry::polygon::{signed_area, triangulate};
use solidcraft::geometry::{extrude_hollow, extrude_solid, GeometryBuffer, Heightfield, HeightfieldOptions};

/// Convex loop: points on a circle at sorted random angles, counter-clockwise
fn random_convex(rng: &mut StdRng, n: usize) -> Vec<Point2<f32>> {
    let radius = rng.gen_range(1.0..50.0f32);
    let mut angles: Vec<f32> = (0..n)
        .map(|i| (i as f32 + rng.gen_range(0.1..0.9)) * std::f32::consts::TAU / n as f32)
        .collect();
    angles.sort_by(|a, b| a.total_cmp(b));
    angles
        .into_iter()
        .map(|a| Point2::new(radius * a.cos(), radius * a.sin()))
        .collect()
}

/// Concave star: alternating outer and inner radii at jittered, increasing angles
fn random_star(rng: &mut StdRng, tips: usize) -> Vec<Point2<f32>> {
    let n = 2 * tips;
    (0..n)
        .map(|i| {
            let a = (i as f32 + rng.gen_range(-0.2..0.2)) * std::f32::consts::TAU / n as f32;
            let r = if i % 2 == 0 {
                rng.gen_range(8.0..12.0f32)
            } else {
                rng.gen_range(2.0..4.0f32)
            };
            Point2::new(r * a.cos(), r * a.sin())
        })
        .collect()
}

fn l_shape() -> Vec<Point2<f32>> {
    vec![
        Point2::new(0.0, 0.0),
        Point2::new(4.0, 0.0),
        Point2::new(4.0, 1.0),
        Point2::new(1.0, 1.0),
        Point2::new(1.0, 3.0),
        Point2::new(0.0, 3.0),
    ]
}

fn triangle_area(a: &Point2<f32>, b: &Point2<f32>, c: &Point2<f32>) -> f32 {
    ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)) * 0.5
}

#[test]
fn test_convex_triangulation_covers_polygon() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let n = rng.gen_range(3..40);
        let points = random_convex(&mut rng, n);
        let triangles = triangulate(&points);
        assert_eq!(triangles.len(), n - 2);

        let total: f32 = triangles
            .iter()
            .map(|[a, b, c]| triangle_area(&points[*a], &points[*b], &points[*c]))
            .sum();
        let expected = signed_area(&points);
        assert!((total - expected).abs() <= expected.abs() * 1e-4, "{} vs {}", total, expected);
    }
}

#[test]
fn test_clockwise_input_matches_counter_clockwise() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let n = rng.gen_range(3..16);
        let ccw = random_convex(&mut rng, n);
        let mut cw = ccw.clone();
        cw.reverse();

        let from_cw = extrude_solid(&cw, 2.0).unwrap();
        let from_ccw = extrude_solid(&ccw, 2.0).unwrap();
        assert_eq!(from_cw, from_ccw);
    }
}

#[test]
fn test_extrusions_are_watertight() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..20 {
        let n = rng.gen_range(3..24);
        let points = random_convex(&mut rng, n);
        let height = rng.gen_range(0.5..20.0f32);

        let solid = extrude_solid(&points, height).unwrap();
        assert_eq!(solid.triangle_count(), 2 * (n - 2) + 2 * n);
        assert!(edge_report(&solid, 1e-4).is_watertight());

        let hollow = extrude_hollow(&points, height, 0.2).unwrap();
        assert_eq!(hollow.triangle_count(), 8 * n);
        assert!(edge_report(&hollow, 1e-4).is_watertight());
    }
}

#[test]
fn test_concave_extrusions_are_watertight() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut loops = vec![l_shape()];
    for _ in 0..20 {
        let tips = rng.gen_range(3..12);
        loops.push(random_star(&mut rng, tips));
    }

    for points in &loops {
        let n = points.len();
        let triangles = triangulate(points);
        assert_eq!(triangles.len(), n - 2);
        let covered: f32 = triangles
            .iter()
            .map(|[a, b, c]| triangle_area(&points[*a], &points[*b], &points[*c]))
            .sum();
        let expected = signed_area(points);
        assert!((covered - expected).abs() <= expected.abs() * 1e-4, "{} vs {}", covered, expected);

        let height = rng.gen_range(0.5..20.0f32);
        let solid = extrude_solid(points, height).unwrap();
        assert_eq!(solid.triangle_count(), 2 * (n - 2) + 2 * n);
        assert!(edge_report(&solid, 1e-4).is_watertight(), "{:?}", points);

        // clockwise input is normalized to the same closed solid
        let mut reversed = points.clone();
        reversed.reverse();
        assert!(edge_report(&extrude_solid(&reversed, height).unwrap(), 1e-4).is_watertight());
    }
}

#[test]
fn test_heightfield_grid_and_triangle_counts() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..10 {
        let w = rng.gen_range(1..12);
        let h = rng.gen_range(1..12);
        let values: Vec<f32> = (0..w * h).map(|_| rng.gen_range(0.0..1.0)).collect();
        let field = Heightfield::new(w, h, values, rng.gen_bool(0.5)).unwrap();
        let resolution = [0.5f32, 1.0, 1.5][rng.gen_range(0..3)];

        let (gw, gh) = grid_size(w, h, resolution).unwrap();
        assert_eq!(gw, ((w as f32 * resolution).floor() as usize).max(2));
        assert_eq!(gh, ((h as f32 * resolution).floor() as usize).max(2));

        let options = HeightfieldOptions {
            width: 40.0,
            resolution,
            ..HeightfieldOptions::default()
        };
        let mesh = generate(&field, &options).unwrap();
        let top = 2 * (gw - 1) * (gh - 1);
        assert_eq!(mesh.triangle_count(), top + 2 + 4 * (gw - 1) + 4 * (gh - 1));
    }
}

fn random_buffer(rng: &mut StdRng) -> GeometryBuffer {
    let n = rng.gen_range(3..10);
    let points = random_convex(rng, n);
    extrude_solid(&points, rng.gen_range(1.0..5.0)).unwrap()
}

#[test]
fn test_merge_is_associative() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..10 {
        let a = random_buffer(&mut rng);
        let b = random_buffer(&mut rng);
        let c = random_buffer(&mut rng);

        let left = a.merge(&b).merge(&c);
        let right = a.merge(&b.merge(&c));
        assert_eq!(left, right);
        assert_eq!(left, GeometryBuffer::merge_all([&a, &b, &c]));
        assert_eq!(
            left.triangle_count(),
            a.triangle_count() + b.triangle_count() + c.triangle_count()
        );
    }
}
