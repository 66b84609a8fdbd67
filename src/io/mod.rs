// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - mesh codecs, containers and importers

pub mod importer;
pub mod stl;
pub mod threemf;

pub use importer::{heightfield_from_image, import_script_file, load_heightfield};
pub use stl::{read_stl, read_stl_file, write_stl, write_stl_file};
pub use threemf::{color_id, normalize_color, write_3mf, write_3mf_file, ColoredObject, ObjectTransform};
