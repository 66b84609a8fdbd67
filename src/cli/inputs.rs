// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parsing of CLI argument forms that are not plain paths or numbers

use crate::error::{KernelError, Result};
use crate::io::normalize_color;
use nalgebra::Point2;
use serde::Deserialize;
use std::path::PathBuf;

/// One `pack` input: `part.stl:#RRGGBB`
#[derive(Debug, Clone, PartialEq)]
pub struct PackEntry {
    pub path: PathBuf,
    pub color: String,
}

/// Split `path:color` at the last colon; the color is normalized
pub fn parse_pack_entry(arg: &str) -> Result<PackEntry> {
    let (path, color) = arg.rsplit_once(':').ok_or_else(|| {
        KernelError::invalid_input(format!("expected <file.stl>:<color>, got '{}'", arg))
    })?;
    if path.is_empty() {
        return Err(KernelError::invalid_input(format!("missing file name in '{}'", arg)));
    }
    Ok(PackEntry {
        path: PathBuf::from(path),
        color: normalize_color(color)?,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointForm {
    Pair([f32; 2]),
    Object { x: f32, y: f32 },
}

/// Points as `[[x, y], ...]` or `[{"x": .., "y": ..}, ...]`
pub fn parse_points(json: &str) -> Result<Vec<Point2<f32>>> {
    let points: Vec<PointForm> = serde_json::from_str(json)
        .map_err(|e| KernelError::invalid_input(format!("invalid point list: {}", e)))?;
    Ok(points
        .into_iter()
        .map(|p| match p {
            PointForm::Pair([x, y]) => Point2::new(x, y),
            PointForm::Object { x, y } => Point2::new(x, y),
        })
        .collect())
}

/// Parameter map from an inline JSON string; must be an object
pub fn parse_params(json: &str) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| KernelError::invalid_input(format!("invalid parameter JSON: {}", e)))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(KernelError::invalid_input("parameters must be a JSON object"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pack_entry() {
        let entry = parse_pack_entry("parts/base.stl:#ff8800").unwrap();
        assert_eq!(entry.path, PathBuf::from("parts/base.stl"));
        assert_eq!(entry.color, "#FF8800");

        assert_eq!(parse_pack_entry("C:/models/lid.stl:0f0").unwrap().color, "#00FF00");
        assert!(parse_pack_entry("base.stl").is_err());
        assert!(parse_pack_entry(":#fff").is_err());
        assert!(parse_pack_entry("base.stl:#zzzzzz").is_err());
    }

    #[test]
    fn test_parse_points() {
        let pairs = parse_points("[[0, 0], [1, 0], [0.5, 1]]").unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[2], Point2::new(0.5, 1.0));

        let objects = parse_points(r#"[{"x": 1, "y": 2}]"#).unwrap();
        assert_eq!(objects[0], Point2::new(1.0, 2.0));

        assert!(parse_points("[[0]]").is_err());
        assert!(parse_points("{}").is_err());
    }

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params(r#"{"width": 4}"#).unwrap()["width"], 4);
        assert!(parse_params("[1, 2]").is_err());
        assert!(parse_params("{").is_err());
    }
}
