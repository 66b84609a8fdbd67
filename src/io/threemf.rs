// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! 3MF container writer with per-object colors.
//!
//! An archive holds exactly three entries: `[Content_Types].xml`,
//! `_rels/.rels` and `3D/3dmodel.model`. Each distinct color becomes one
//! materials-extension color group that triangles reference through `pid`.

use crate::error::{KernelError, Result};
use crate::geometry::GeometryBuffer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const NAMESPACE_CORE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";
const NAMESPACE_MATERIAL: &str = "http://schemas.microsoft.com/3dmanufacturing/material/2015/02";

/// Object resource ids start above every possible color id
const OBJECT_ID_BASE: u32 = 0x0100_0001;

pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";
pub const RELS_PATH: &str = "_rels/.rels";
pub const MODEL_PATH: &str = "3D/3dmodel.model";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml"/>
</Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Target="/3D/3dmodel.model" Id="rel0" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel"/>
</Relationships>"#;

/// Placement applied to a build item. Rotation is carried but not encoded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl ObjectTransform {
    /// 3MF affine matrix attribute, scale and translation only
    fn matrix_attribute(&self) -> String {
        let [sx, sy, sz] = self.scale;
        let [tx, ty, tz] = self.position;
        format!("{} 0 0 0 {} 0 0 0 {} {} {} {}", sx, sy, sz, tx, ty, tz)
    }
}

#[derive(Debug, Clone)]
pub struct ColoredObject {
    pub name: String,
    pub buffer: GeometryBuffer,
    /// Hex color, `#RGB` or `#RRGGBB`, leading `#` optional
    pub color: String,
    pub transform: Option<ObjectTransform>,
}

impl ColoredObject {
    pub fn new(name: impl Into<String>, buffer: GeometryBuffer, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer,
            color: color.into(),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: ObjectTransform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Canonical `#RRGGBB` upper-case form of a hex color
pub fn normalize_color(color: &str) -> Result<String> {
    let digits = color.trim().trim_start_matches('#');
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KernelError::invalid_input(format!("invalid hex color '{}'", color)));
    }
    let expanded = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => digits.to_string(),
        _ => {
            return Err(KernelError::invalid_input(format!(
                "hex color '{}' must have 3 or 6 digits",
                color
            )))
        }
    };
    Ok(format!("#{}", expanded.to_ascii_uppercase()))
}

/// Resource id for a color: `1 + 0xRRGGBB`.
///
/// The id is read straight from the hex digits, so it is the same within and
/// across runs and never collides between colors. That needs all 24 bits:
/// ids range over `1..=0x0100_0000` rather than a compact table index.
pub fn color_id(color: &str) -> Result<u32> {
    let normalized = normalize_color(color)?;
    let rgb = u32::from_str_radix(&normalized[1..], 16)
        .map_err(|e| KernelError::invalid_input(format!("invalid hex color '{}': {}", color, e)))?;
    Ok(rgb + 1)
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| KernelError::container(format!("failed to write model XML: {}", e)))
}

fn close<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    emit(writer, Event::End(BytesEnd::new(name)))
}

fn write_mesh<W: Write>(writer: &mut Writer<W>, buffer: &GeometryBuffer, pid: &str) -> Result<()> {
    emit(writer, Event::Start(BytesStart::new("mesh")))?;

    emit(writer, Event::Start(BytesStart::new("vertices")))?;
    for v in buffer.vertices().chunks_exact(3) {
        let mut vertex = BytesStart::new("vertex");
        vertex.push_attribute(("x", v[0].to_string().as_str()));
        vertex.push_attribute(("y", v[1].to_string().as_str()));
        vertex.push_attribute(("z", v[2].to_string().as_str()));
        emit(writer, Event::Empty(vertex))?;
    }
    close(writer, "vertices")?;

    emit(writer, Event::Start(BytesStart::new("triangles")))?;
    for t in buffer.indices().chunks_exact(3) {
        let mut triangle = BytesStart::new("triangle");
        triangle.push_attribute(("v1", t[0].to_string().as_str()));
        triangle.push_attribute(("v2", t[1].to_string().as_str()));
        triangle.push_attribute(("v3", t[2].to_string().as_str()));
        triangle.push_attribute(("pid", pid));
        triangle.push_attribute(("p1", "0"));
        emit(writer, Event::Empty(triangle))?;
    }
    close(writer, "triangles")?;

    close(writer, "mesh")
}

/// Render `3D/3dmodel.model` for the given objects
pub fn model_xml(objects: &[ColoredObject]) -> Result<String> {
    if objects.is_empty() {
        return Err(KernelError::invalid_input("3MF export needs at least one object"));
    }

    let colors = objects
        .iter()
        .map(|o| normalize_color(&o.color))
        .collect::<Result<Vec<_>>>()?;
    let mut unique: Vec<&str> = Vec::new();
    for color in &colors {
        if !unique.contains(&color.as_str()) {
            unique.push(color);
        }
    }

    let mut out = Vec::new();
    let mut writer = Writer::new_with_indent(Cursor::new(&mut out), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("unit", "millimeter"));
    model.push_attribute(("xml:lang", "en-US"));
    model.push_attribute(("xmlns", NAMESPACE_CORE));
    model.push_attribute(("xmlns:m", NAMESPACE_MATERIAL));
    emit(&mut writer, Event::Start(model))?;

    emit(&mut writer, Event::Start(BytesStart::new("resources")))?;
    for color in &unique {
        let mut group = BytesStart::new("m:colorgroup");
        group.push_attribute(("id", color_id(color)?.to_string().as_str()));
        emit(&mut writer, Event::Start(group))?;
        let mut entry = BytesStart::new("m:color");
        entry.push_attribute(("color", format!("{}FF", color).as_str()));
        emit(&mut writer, Event::Empty(entry))?;
        close(&mut writer, "m:colorgroup")?;
    }

    for (index, (object, color)) in objects.iter().zip(&colors).enumerate() {
        let pid = color_id(color)?.to_string();
        let mut element = BytesStart::new("object");
        element.push_attribute(("id", (OBJECT_ID_BASE + index as u32).to_string().as_str()));
        element.push_attribute(("type", "model"));
        element.push_attribute(("name", object.name.as_str()));
        element.push_attribute(("pid", pid.as_str()));
        element.push_attribute(("pindex", "0"));
        emit(&mut writer, Event::Start(element))?;
        write_mesh(&mut writer, &object.buffer, &pid)?;
        close(&mut writer, "object")?;
    }
    close(&mut writer, "resources")?;

    emit(&mut writer, Event::Start(BytesStart::new("build")))?;
    for (index, object) in objects.iter().enumerate() {
        let mut item = BytesStart::new("item");
        item.push_attribute(("objectid", (OBJECT_ID_BASE + index as u32).to_string().as_str()));
        if let Some(transform) = &object.transform {
            if transform.rotation.iter().any(|r| *r != 0.0) {
                log::debug!(
                    "object '{}': rotation {:?} is not encoded in the build transform",
                    object.name,
                    transform.rotation
                );
            }
            item.push_attribute(("transform", transform.matrix_attribute().as_str()));
        }
        emit(&mut writer, Event::Empty(item))?;
    }
    close(&mut writer, "build")?;
    close(&mut writer, "model")?;

    String::from_utf8(out).map_err(|e| KernelError::container(format!("model XML is not UTF-8: {}", e)))
}

/// Build the complete 3MF archive in memory
pub fn write_3mf(objects: &[ColoredObject]) -> Result<Vec<u8>> {
    let model = model_xml(objects)?;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (path, content) in [
        (CONTENT_TYPES_PATH, CONTENT_TYPES_XML),
        (RELS_PATH, RELS_XML),
        (MODEL_PATH, model.as_str()),
    ] {
        zip.start_file(path, options)
            .map_err(|e| KernelError::container(format!("failed to create {}: {}", path, e)))?;
        zip.write_all(content.as_bytes())?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| KernelError::container(format!("failed to finalize ZIP archive: {}", e)))?;
    let bytes = cursor.into_inner();
    log::debug!("3MF archive: {} objects, {} bytes", objects.len(), bytes.len());
    Ok(bytes)
}

pub fn write_3mf_file(path: impl AsRef<Path>, objects: &[ColoredObject]) -> Result<()> {
    std::fs::write(path.as_ref(), write_3mf(objects)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshBuilder;
    use nalgebra::Point3;

    fn triangle() -> GeometryBuffer {
        let mut builder = MeshBuilder::new();
        builder.push_flat_triangle(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        builder.build()
    }

    #[test]
    fn test_normalize_color_forms() {
        assert_eq!(normalize_color("#ff8800").unwrap(), "#FF8800");
        assert_eq!(normalize_color("ff8800").unwrap(), "#FF8800");
        assert_eq!(normalize_color("#f80").unwrap(), "#FF8800");
        assert!(normalize_color("#ff88").is_err());
        assert!(normalize_color("#gg0000").is_err());
    }

    #[test]
    fn test_color_ids_are_derived_from_hex() {
        assert_eq!(color_id("#000000").unwrap(), 1);
        assert_eq!(color_id("#FFFFFF").unwrap(), 0x0100_0000);
        assert_eq!(color_id("#f80").unwrap(), color_id("#FF8800").unwrap());
        assert_ne!(color_id("#FF0000").unwrap(), color_id("#00FF00").unwrap());
        assert!(color_id("#FFFFFF").unwrap() < OBJECT_ID_BASE);
    }

    #[test]
    fn test_model_shares_color_groups() {
        let objects = vec![
            ColoredObject::new("a", triangle(), "#FF0000"),
            ColoredObject::new("b", triangle(), "ff0000"),
            ColoredObject::new("c", triangle(), "#00FF00"),
        ];
        let xml = model_xml(&objects).unwrap();
        assert_eq!(xml.matches("<m:colorgroup").count(), 2);
        assert_eq!(xml.matches("<object ").count(), 3);
        assert_eq!(xml.matches("<item ").count(), 3);
        assert!(xml.contains(r##"color="#FF0000FF""##));
        assert!(xml.contains(r#"unit="millimeter""#));
        assert!(xml.contains(NAMESPACE_MATERIAL));
    }

    #[test]
    fn test_transform_attribute() {
        let object = ColoredObject::new("moved", triangle(), "#123456").with_transform(ObjectTransform {
            position: [10.0, 20.0, 0.5],
            rotation: [0.0, 0.0, 1.0],
            scale: [2.0, 2.0, 2.0],
        });
        let xml = model_xml(&[object]).unwrap();
        assert!(xml.contains(r#"transform="2 0 0 0 2 0 0 0 2 10 20 0.5""#));
    }

    #[test]
    fn test_empty_and_bad_color_rejected() {
        assert!(write_3mf(&[]).is_err());
        let bad = ColoredObject::new("bad", triangle(), "purple");
        assert!(write_3mf(&[bad]).is_err());
    }
}
