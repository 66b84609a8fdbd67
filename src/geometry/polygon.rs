// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! 2D polygon utilities: winding and ear-clipping triangulation

use nalgebra::Point2;

/// Shoelace area; positive for counter-clockwise loops
pub fn signed_area(points: &[Point2<f32>]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        twice_area += a.x * b.y - b.x * a.y;
    }
    twice_area * 0.5
}

/// Return the loop in counter-clockwise order, reversing it when it is clockwise
pub fn normalize_winding(points: &[Point2<f32>]) -> Vec<Point2<f32>> {
    let mut out = points.to_vec();
    if signed_area(points) < 0.0 {
        out.reverse();
    }
    out
}

/// z component of (b - a) x (c - b)
fn turn(a: &Point2<f32>, b: &Point2<f32>, c: &Point2<f32>) -> f32 {
    (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x)
}

/// Barycentric containment test, boundary included
fn point_in_triangle(p: &Point2<f32>, a: &Point2<f32>, b: &Point2<f32>, c: &Point2<f32>) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() <= f32::EPSILON {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;
    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}

/// Triangulate a counter-clockwise loop by ear clipping.
///
/// Each pass clips the first ear of the remaining ring. A pass that finds
/// no ear (self-intersecting or degenerate loops) force-clips the triangle
/// at the start of the ring, and the number of passes is capped at twice
/// the vertex count, so malformed input still terminates with N-2
/// triangles instead of looping.
pub fn triangulate(points: &[Point2<f32>]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }

    let mut ring: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);
    let max_passes = 2 * n;

    for _ in 0..max_passes {
        if ring.len() <= 3 {
            break;
        }

        let m = ring.len();
        let mut clipped = false;
        for i in 0..m {
            let prev = ring[(i + m - 1) % m];
            let cur = ring[i];
            let next = ring[(i + 1) % m];
            let (a, b, c) = (&points[prev], &points[cur], &points[next]);

            if turn(a, b, c) <= 0.0 {
                continue;
            }

            let blocked = ring.iter().any(|&other| {
                other != prev
                    && other != cur
                    && other != next
                    && point_in_triangle(&points[other], a, b, c)
            });
            if blocked {
                continue;
            }

            triangles.push([prev, cur, next]);
            ring.remove(i);
            clipped = true;
            break;
        }

        if !clipped {
            log::debug!("no ear in a ring of {} vertices, forcing a clip", m);
            triangles.push([ring[0], ring[1], ring[2]]);
            ring.remove(1);
        }
    }

    if ring.len() == 3 {
        triangles.push([ring[0], ring[1], ring[2]]);
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn regular_polygon(n: usize, radius: f32) -> Vec<Point2<f32>> {
        (0..n)
            .map(|i| {
                let a = TAU * i as f32 / n as f32;
                Point2::new(radius * a.cos(), radius * a.sin())
            })
            .collect()
    }

    fn triangle_area(p: &[Point2<f32>], t: &[usize; 3]) -> f32 {
        signed_area(&[p[t[0]], p[t[1]], p[t[2]]])
    }

    #[test]
    fn test_signed_area_orientation() {
        let square = vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 2.0),
            Point2::new(0.0, 2.0),
        ];
        assert_eq!(signed_area(&square), 4.0);
        let mut cw = square.clone();
        cw.reverse();
        assert_eq!(signed_area(&cw), -4.0);
        let fixed = normalize_winding(&cw);
        assert!(signed_area(&fixed) > 0.0);
        assert_eq!(normalize_winding(&square), square);
    }

    #[test]
    fn test_convex_polygon_gives_n_minus_two_triangles() {
        for n in 3..20 {
            let poly = regular_polygon(n, 5.0);
            let tris = triangulate(&poly);
            assert_eq!(tris.len(), n - 2);
            let total: f32 = tris.iter().map(|t| triangle_area(&poly, t)).sum();
            assert!((total - signed_area(&poly)).abs() < 1e-3, "area mismatch for n={n}");
        }
    }

    #[test]
    fn test_concave_polygon_covers_area() {
        // L-shape
        let poly = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 4.0),
            Point2::new(0.0, 4.0),
        ];
        let tris = triangulate(&poly);
        assert_eq!(tris.len(), 4);
        for t in &tris {
            assert!(triangle_area(&poly, t) > 0.0);
        }
        let total: f32 = tris.iter().map(|t| triangle_area(&poly, t)).sum();
        assert!((total - 7.0).abs() < 1e-5);
    }

    #[test]
    fn test_degenerate_loop_terminates() {
        // all collinear: no ear ever qualifies
        let poly: Vec<_> = (0..6).map(|i| Point2::new(i as f32, 0.0)).collect();
        let tris = triangulate(&poly);
        assert_eq!(tris.len(), 4);
    }

    #[test]
    fn test_too_few_points() {
        assert!(triangulate(&[Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).is_empty());
    }
}
