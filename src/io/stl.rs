// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL codec: binary records through `stl_io`, plus a lenient ASCII reader

use crate::error::Result;
use crate::geometry::{face_normal, GeometryBuffer, MeshBuilder};
use nalgebra::{Point3, Vector3};
use std::fs;
use std::path::Path;
use stl_io::{BinaryStlReader, Normal, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const RECORD_LEN: usize = 50;

/// True when `bytes` is exactly a header, a count and `count` records
pub fn is_binary_stl(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]);
    let expected = (HEADER_LEN as u64 + 4) + u64::from(count) * RECORD_LEN as u64;
    expected == bytes.len() as u64
}

/// Decode binary or ASCII STL.
///
/// Input that fails the binary size rule is read as text on a best-effort
/// basis, which may produce an empty buffer.
pub fn read_stl(bytes: &[u8]) -> Result<GeometryBuffer> {
    let buffer = if is_binary_stl(bytes) {
        read_binary(bytes)?
    } else {
        read_ascii(&String::from_utf8_lossy(bytes))
    };
    log::debug!("read STL: {} triangles", buffer.triangle_count());
    Ok(buffer)
}

pub fn read_stl_file(path: impl AsRef<Path>) -> Result<GeometryBuffer> {
    let bytes = fs::read(path.as_ref())?;
    read_stl(&bytes)
}

fn point(v: Vertex) -> Point3<f32> {
    let [x, y, z]: [f32; 3] = v.into();
    Point3::new(x, y, z)
}

fn read_binary(bytes: &[u8]) -> Result<GeometryBuffer> {
    let mut reader = bytes;
    let triangles = BinaryStlReader::create_triangle_iterator(&mut reader)?;
    let mut builder = MeshBuilder::with_capacity((bytes.len() - HEADER_LEN - 4) / RECORD_LEN);

    for triangle in triangles {
        let Triangle { normal, vertices } = triangle?;
        let [nx, ny, nz]: [f32; 3] = normal.into();
        let [a, b, c] = vertices;
        builder.push_triangle(point(a), point(b), point(c), Vector3::new(nx, ny, nz));
    }
    Ok(builder.build())
}

fn parse_triple<'a>(mut fields: impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    let z = fields.next()?.parse().ok()?;
    Some([x, y, z])
}

fn read_ascii(text: &str) -> GeometryBuffer {
    let mut builder = MeshBuilder::new();
    let mut normal = Vector3::zeros();
    let mut pending: Vec<Point3<f32>> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("facet normal") {
            if let Some([x, y, z]) = parse_triple(rest.split_whitespace()) {
                normal = Vector3::new(x, y, z);
            } else {
                log::warn!("STL line {}: unreadable facet normal", line_no + 1);
            }
        } else if let Some(rest) = line.strip_prefix("vertex") {
            match parse_triple(rest.split_whitespace()) {
                Some([x, y, z]) => {
                    pending.push(Point3::new(x, y, z));
                    if pending.len() == 3 {
                        builder.push_triangle(pending[0], pending[1], pending[2], normal);
                        pending.clear();
                    }
                }
                None => log::warn!("STL line {}: skipping unreadable vertex", line_no + 1),
            }
        }
    }

    if !pending.is_empty() {
        log::warn!("STL text ended with {} dangling vertices", pending.len());
    }
    builder.build()
}

fn vertex(p: &Point3<f32>) -> Vertex {
    Vertex::new([p.x, p.y, p.z])
}

/// Encode as binary STL with a zero-filled header.
///
/// Facet normals are recomputed from the winding, not copied from the
/// buffer's vertex normals.
pub fn write_stl(buffer: &GeometryBuffer) -> Result<Vec<u8>> {
    let triangles: Vec<Triangle> = buffer
        .triangles()
        .map(|[a, b, c]| {
            let n = face_normal(&a, &b, &c);
            Triangle {
                normal: Normal::new([n.x, n.y, n.z]),
                vertices: [vertex(&a), vertex(&b), vertex(&c)],
            }
        })
        .collect();

    let mut out = Vec::with_capacity(HEADER_LEN + 4 + triangles.len() * RECORD_LEN);
    stl_io::write_stl(&mut out, triangles.iter())?;
    Ok(out)
}

pub fn write_stl_file(path: impl AsRef<Path>, buffer: &GeometryBuffer) -> Result<()> {
    fs::write(path.as_ref(), write_stl(buffer)?)?;
    Ok(())
}
