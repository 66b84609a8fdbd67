// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding box utilities

use super::GeometryBuffer;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Box that every point expands; only meaningful after at least one expansion
    fn inverted() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Single pass over the buffer's vertex array.
    ///
    /// An empty buffer yields a zero-sized box at the origin so callers can
    /// place it without special-casing.
    pub fn from_buffer(buffer: &GeometryBuffer) -> Self {
        let vertices = buffer.vertices();
        if vertices.is_empty() {
            return Self::new(Point3::origin(), Point3::origin());
        }

        let mut bbox = Self::inverted();
        for p in vertices.chunks_exact(3) {
            bbox.expand_to_include(&Point3::new(p[0], p[1], p[2]));
        }
        bbox
    }

    pub fn expand_to_include(&mut self, point: &Point3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Check if two bounding boxes are approximately equal within tolerance
    pub fn approx_eq(&self, other: &BoundingBox, tolerance: f32) -> bool {
        (self.min - other.min).amax() <= tolerance && (self.max - other.max).amax() <= tolerance
    }
}
