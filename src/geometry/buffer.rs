// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry buffer: flat vertex/index/normal arrays shared by every generator

use super::BoundingBox;
use crate::error::{KernelError, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Triangle mesh with per-triangle vertex and normal slots.
///
/// Every triangle owns three vertices of its own, even where positions
/// coincide with a neighbour. Vertices are never welded, so flat shading
/// and exported file sizes depend on this layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryBuffer {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    normals: Vec<f32>,
}

impl GeometryBuffer {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a buffer from raw arrays, checking the layout invariants
    pub fn from_parts(vertices: Vec<f32>, indices: Vec<u32>, normals: Vec<f32>) -> Result<Self> {
        if vertices.len() % 3 != 0 {
            return Err(KernelError::invalid_input(format!(
                "vertex array length {} is not a multiple of 3",
                vertices.len()
            )));
        }
        if vertices.len() != normals.len() {
            return Err(KernelError::invalid_input(format!(
                "normal array length {} does not match vertex array length {}",
                normals.len(),
                vertices.len()
            )));
        }
        if indices.len() % 3 != 0 {
            return Err(KernelError::invalid_input(format!(
                "index array length {} is not a multiple of 3",
                indices.len()
            )));
        }

        let vertex_count = (vertices.len() / 3) as u64;
        for (t, tri) in indices.chunks_exact(3).enumerate() {
            if tri.iter().any(|&i| u64::from(i) >= vertex_count) {
                return Err(KernelError::invalid_input(format!(
                    "triangle {} references a vertex past the end ({} vertices)",
                    t, vertex_count
                )));
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(KernelError::invalid_input(format!(
                    "triangle {} repeats a vertex index",
                    t
                )));
            }
        }

        Ok(Self {
            vertices,
            indices,
            normals,
        })
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    /// Move the arrays out without copying them
    pub fn into_parts(self) -> (Vec<f32>, Vec<u32>, Vec<f32>) {
        (self.vertices, self.indices, self.normals)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn position(&self, index: usize) -> Point3<f32> {
        let i = index * 3;
        Point3::new(self.vertices[i], self.vertices[i + 1], self.vertices[i + 2])
    }

    pub fn normal(&self, index: usize) -> Vector3<f32> {
        let i = index * 3;
        Vector3::new(self.normals[i], self.normals[i + 1], self.normals[i + 2])
    }

    /// Corner positions of triangle `t`, in winding order
    pub fn triangle(&self, t: usize) -> [Point3<f32>; 3] {
        let i = t * 3;
        [
            self.position(self.indices[i] as usize),
            self.position(self.indices[i + 1] as usize),
            self.position(self.indices[i + 2] as usize),
        ]
    }

    pub fn triangles(&self) -> impl Iterator<Item = [Point3<f32>; 3]> + '_ {
        (0..self.triangle_count()).map(move |t| self.triangle(t))
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_buffer(self)
    }

    /// Concatenate two buffers into a newly allocated third one.
    ///
    /// `other`'s indices are offset by this buffer's vertex count.
    pub fn merge(&self, other: &GeometryBuffer) -> GeometryBuffer {
        let offset = self.vertex_count() as u32;

        let mut vertices = Vec::with_capacity(self.vertices.len() + other.vertices.len());
        vertices.extend_from_slice(&self.vertices);
        vertices.extend_from_slice(&other.vertices);

        let mut normals = Vec::with_capacity(self.normals.len() + other.normals.len());
        normals.extend_from_slice(&self.normals);
        normals.extend_from_slice(&other.normals);

        let mut indices = Vec::with_capacity(self.indices.len() + other.indices.len());
        indices.extend_from_slice(&self.indices);
        indices.extend(other.indices.iter().map(|i| i + offset));

        GeometryBuffer {
            vertices,
            indices,
            normals,
        }
    }

    /// Merge a sequence of buffers left to right
    pub fn merge_all<'a>(buffers: impl IntoIterator<Item = &'a GeometryBuffer>) -> GeometryBuffer {
        let mut builder = MeshBuilder::new();
        for buffer in buffers {
            builder.append(buffer);
        }
        builder.build()
    }
}

/// Mutable accumulator that generators push triangles into.
///
/// Each pushed triangle gets three fresh vertex slots carrying the given
/// normal, which keeps the non-welded layout of [`GeometryBuffer`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    vertices: Vec<f32>,
    indices: Vec<u32>,
    normals: Vec<f32>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangle_count * 9),
            indices: Vec::with_capacity(triangle_count * 3),
            normals: Vec::with_capacity(triangle_count * 9),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_vertex(&mut self, p: &Point3<f32>, n: &Vector3<f32>) -> u32 {
        let index = (self.vertices.len() / 3) as u32;
        self.vertices.extend_from_slice(&[p.x, p.y, p.z]);
        self.normals.extend_from_slice(&[n.x, n.y, n.z]);
        index
    }

    /// Push a triangle with an explicit normal shared by its three corners
    pub fn push_triangle(
        &mut self,
        a: Point3<f32>,
        b: Point3<f32>,
        c: Point3<f32>,
        normal: Vector3<f32>,
    ) {
        let ia = self.push_vertex(&a, &normal);
        let ib = self.push_vertex(&b, &normal);
        let ic = self.push_vertex(&c, &normal);
        self.indices.extend_from_slice(&[ia, ib, ic]);
    }

    /// Push a triangle whose normal is derived from its winding
    pub fn push_flat_triangle(&mut self, a: Point3<f32>, b: Point3<f32>, c: Point3<f32>) {
        let normal = face_normal(&a, &b, &c);
        self.push_triangle(a, b, c, normal);
    }

    /// Push the quad a-b-c-d (counter-clockwise seen from the normal side) as two triangles
    pub fn push_quad(
        &mut self,
        a: Point3<f32>,
        b: Point3<f32>,
        c: Point3<f32>,
        d: Point3<f32>,
        normal: Vector3<f32>,
    ) {
        self.push_triangle(a, b, c, normal);
        self.push_triangle(a, c, d, normal);
    }

    /// Copy every triangle of `buffer` into this builder
    pub fn append(&mut self, buffer: &GeometryBuffer) {
        let offset = (self.vertices.len() / 3) as u32;
        self.vertices.extend_from_slice(&buffer.vertices);
        self.normals.extend_from_slice(&buffer.normals);
        self.indices
            .extend(buffer.indices.iter().map(|i| i + offset));
    }

    pub fn build(self) -> GeometryBuffer {
        GeometryBuffer {
            vertices: self.vertices,
            indices: self.indices,
            normals: self.normals,
        }
    }
}

/// Unit normal of the triangle a-b-c; degenerate triangles give the zero vector
pub fn face_normal(a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> Vector3<f32> {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > f32::EPSILON {
        n / len
    } else {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle(offset: f32) -> GeometryBuffer {
        let mut builder = MeshBuilder::new();
        builder.push_flat_triangle(
            Point3::new(offset, 0.0, 0.0),
            Point3::new(offset + 1.0, 0.0, 0.0),
            Point3::new(offset, 1.0, 0.0),
        );
        builder.build()
    }

    #[test]
    fn test_builder_duplicates_vertices_per_triangle() {
        let mut builder = MeshBuilder::new();
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(1.0, 1.0, 0.0);
        let d = Point3::new(0.0, 1.0, 0.0);
        builder.push_quad(a, b, c, d, Vector3::z());
        let buffer = builder.build();

        assert_eq!(buffer.triangle_count(), 2);
        // shared corners are not welded
        assert_eq!(buffer.vertex_count(), 6);
        assert_eq!(buffer.vertices().len(), buffer.normals().len());
        assert_eq!(buffer.indices(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let a = single_triangle(0.0);
        let b = single_triangle(5.0);
        let merged = a.merge(&b);

        assert_eq!(merged.triangle_count(), 2);
        assert_eq!(merged.indices(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(merged.position(3), Point3::new(5.0, 0.0, 0.0));
        // inputs untouched
        assert_eq!(a.triangle_count(), 1);
    }

    #[test]
    fn test_merge_all_matches_pairwise_merge() {
        let parts = [single_triangle(0.0), single_triangle(2.0), single_triangle(4.0)];
        let folded = parts[0].merge(&parts[1]).merge(&parts[2]);
        assert_eq!(GeometryBuffer::merge_all(parts.iter()), folded);
    }

    #[test]
    fn test_from_parts_rejects_bad_layouts() {
        let verts = vec![0.0; 9];
        assert!(GeometryBuffer::from_parts(verts.clone(), vec![0, 1, 2], vec![0.0; 6]).is_err());
        assert!(GeometryBuffer::from_parts(verts.clone(), vec![0, 1, 3], vec![0.0; 9]).is_err());
        assert!(GeometryBuffer::from_parts(verts.clone(), vec![0, 1, 1], vec![0.0; 9]).is_err());
        assert!(GeometryBuffer::from_parts(verts.clone(), vec![0, 1], vec![0.0; 9]).is_err());
        assert!(GeometryBuffer::from_parts(verts, vec![0, 1, 2], vec![0.0; 9]).is_ok());
    }

    #[test]
    fn test_face_normal_of_degenerate_triangle_is_zero() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert_eq!(face_normal(&p, &p, &p), Vector3::zeros());
    }
}
