// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polygon-set solids

use super::{check_budget, ModelingError, MAX_POINTS, MAX_POLYGONS};
use crate::geometry::{GeometryBuffer, MeshBuilder};
use crate::utils::math::newell_normal;
use nalgebra::{Matrix4, Point3, Vector3};

/// Oriented plane `normal . p = w`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f64>,
    pub w: f64,
}

impl Plane {
    pub fn from_points(points: &[Point3<f64>]) -> Option<Self> {
        let normal = newell_normal(points)?;
        Some(Self {
            normal,
            w: normal.dot(&points[0].coords),
        })
    }

    /// Signed distance of `point` from the plane
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.w
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }
}

/// Planar convex polygon, counter-clockwise seen from outside
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Point3<f64>>,
    pub plane: Plane,
}

impl Polygon {
    /// Drops repeated consecutive vertices; `None` when no area is left
    pub fn new(vertices: Vec<Point3<f64>>) -> Option<Self> {
        let mut cleaned: Vec<Point3<f64>> = Vec::with_capacity(vertices.len());
        for v in vertices {
            if cleaned.last().map_or(true, |last| (last - v).norm() > 1e-9) {
                cleaned.push(v);
            }
        }
        while cleaned.len() > 1 && (cleaned[0] - cleaned[cleaned.len() - 1]).norm() <= 1e-9 {
            cleaned.pop();
        }
        if cleaned.len() < 3 {
            return None;
        }
        let plane = Plane::from_points(&cleaned)?;
        Some(Self {
            vertices: cleaned,
            plane,
        })
    }

    /// Polygon on a known plane, used for split fragments
    pub(crate) fn with_plane(vertices: Vec<Point3<f64>>, plane: Plane) -> Self {
        Self { vertices, plane }
    }

    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }
}

/// Closed solid as a soup of outward-facing polygons
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solid {
    pub polygons: Vec<Polygon>,
}

impl Solid {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    /// Build from vertex loops, skipping degenerate ones
    pub fn from_loops(loops: impl IntoIterator<Item = Vec<Point3<f64>>>) -> Self {
        Self {
            polygons: loops.into_iter().filter_map(Polygon::new).collect(),
        }
    }

    /// [`Solid::from_loops`] for generated loops, bounded by [`MAX_POLYGONS`] and [`MAX_POINTS`]
    pub fn try_from_loops(loops: Vec<Vec<Point3<f64>>>) -> Result<Self, ModelingError> {
        check_budget("polygon count", Some(loops.len()), MAX_POLYGONS)?;
        let points = loops
            .iter()
            .try_fold(0usize, |total, l| total.checked_add(l.len()));
        check_budget("point count", points, MAX_POINTS)?;
        Ok(Self::from_loops(loops))
    }

    /// Convert a triangle buffer back into polygons
    pub fn from_buffer(buffer: &GeometryBuffer) -> Self {
        Self::from_loops(
            buffer
                .triangles()
                .map(|tri| tri.iter().map(|p| p.cast::<f64>()).collect()),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.polygons.iter().flat_map(|p| p.vertices.iter())
    }

    /// Axis-aligned bounds, `None` for an empty solid
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut iter = self.vertices();
        let first = *iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        }))
    }

    /// Apply an affine transform; mirroring transforms keep the faces outward
    pub fn transform(&self, matrix: &Matrix4<f64>) -> Self {
        let mirror = matrix.fixed_view::<3, 3>(0, 0).determinant() < 0.0;
        Self::from_loops(self.polygons.iter().map(|polygon| {
            let mut vertices: Vec<_> = polygon
                .vertices
                .iter()
                .map(|v| matrix.transform_point(v))
                .collect();
            if mirror {
                vertices.reverse();
            }
            vertices
        }))
    }

    /// Signed volume by the divergence theorem
    pub fn volume(&self) -> f64 {
        self.polygons
            .iter()
            .map(|p| {
                let a = &p.vertices[0].coords;
                p.vertices
                    .windows(2)
                    .skip(1)
                    .map(|w| a.dot(&w[0].coords.cross(&w[1].coords)))
                    .sum::<f64>()
            })
            .sum::<f64>()
            / 6.0
    }

    /// Fan-triangulate every face into a flat-shaded buffer
    pub fn to_buffer(&self) -> GeometryBuffer {
        let triangles: usize = self.polygons.iter().map(|p| p.vertices.len() - 2).sum();
        let mut builder = MeshBuilder::with_capacity(triangles);
        for polygon in &self.polygons {
            let normal = polygon.plane.normal.cast::<f32>();
            let anchor = polygon.vertices[0].cast::<f32>();
            for pair in polygon.vertices[1..].windows(2) {
                builder.push_triangle(anchor, pair[0].cast::<f32>(), pair[1].cast::<f32>(), normal);
            }
        }
        builder.build()
    }
}
