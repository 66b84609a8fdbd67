// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - buffer representation and mesh generators

mod bbox;
mod buffer;

pub mod analysis;
pub mod extrude;
pub mod heightfield;
pub mod polygon;

pub use bbox::BoundingBox;
pub use buffer::{face_normal, GeometryBuffer, MeshBuilder};
pub use extrude::{extrude, extrude_hollow, extrude_solid, ExtrudeOptions};
pub use heightfield::{BorderOptions, Heightfield, HeightfieldOptions};
