// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Heightfield slabs: a grid of normalized heights turned into a closed relief.
//!
//! The grid lies in the XY plane centred on the origin with image row 0 at
//! +Y; the slab bottom sits at z = 0 and the relief grows towards +Z.

use super::extrude::push_tube;
use super::{GeometryBuffer, MeshBuilder};
use crate::error::{KernelError, Result};
use nalgebra::{Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Row-major grid of heights in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    width: usize,
    height: usize,
    values: Vec<f32>,
    inverted: bool,
}

impl Heightfield {
    /// Values are clamped into [0, 1]; non-finite values become 0
    pub fn new(width: usize, height: usize, values: Vec<f32>, inverted: bool) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(KernelError::invalid_input(format!(
                "heightfield dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = checked_cells(width, height)?;
        if values.len() != expected {
            return Err(KernelError::invalid_input(format!(
                "heightfield expects {} values, got {}",
                expected,
                values.len()
            )));
        }

        let values = values
            .into_iter()
            .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
            .collect();
        Ok(Self {
            width,
            height,
            values,
            inverted,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Stored value at column `x`, row `y`, clamped to the grid edge
    pub fn value(&self, x: usize, y: usize) -> f32 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.values[y * self.width + x]
    }

    /// Bilinear sample at fractional grid coordinates
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x = x.clamp(0.0, (self.width - 1) as f32);
        let y = y.clamp(0.0, (self.height - 1) as f32);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let tx = x - x0 as f32;
        let ty = y - y0 as f32;

        let v00 = self.value(x0, y0);
        let v10 = self.value(x0 + 1, y0);
        let v01 = self.value(x0, y0 + 1);
        let v11 = self.value(x0 + 1, y0 + 1);

        let top = v00 + (v10 - v00) * tx;
        let bottom = v01 + (v11 - v01) * tx;
        top + (bottom - top) * ty
    }
}

/// Raised frame around the slab
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BorderOptions {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightfieldOptions {
    /// Slab extent along X in millimetres
    pub width: f32,
    /// Slab extent along Y; derived from the aspect ratio when unset
    pub depth: Option<f32>,
    pub max_height: f32,
    pub base_thickness: f32,
    /// Grid samples per source pixel
    pub resolution: f32,
    pub border: Option<BorderOptions>,
}

impl Default for HeightfieldOptions {
    fn default() -> Self {
        Self {
            width: 100.0,
            depth: None,
            max_height: 3.0,
            base_thickness: 0.8,
            resolution: 1.0,
            border: None,
        }
    }
}

impl HeightfieldOptions {
    fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f32| -> Result<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(KernelError::invalid_input(format!("{} must be positive, got {}", name, v)))
            }
        };
        let non_negative = |name: &str, v: f32| -> Result<()> {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(KernelError::invalid_input(format!("{} must not be negative, got {}", name, v)))
            }
        };

        positive("width", self.width)?;
        positive("resolution", self.resolution)?;
        if let Some(depth) = self.depth {
            positive("depth", depth)?;
        }
        non_negative("max_height", self.max_height)?;
        non_negative("base_thickness", self.base_thickness)?;
        if let Some(border) = &self.border {
            positive("border width", border.width)?;
            positive("border height", border.height)?;
        }
        Ok(())
    }
}

/// Largest grid, in cells, a heightfield or its resampled surface may have (4096 x 4096)
pub const MAX_GRID_CELLS: usize = 4096 * 4096;

fn checked_cells(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .filter(|&cells| cells <= MAX_GRID_CELLS)
        .ok_or_else(|| {
            KernelError::invalid_input(format!(
                "heightfield grid {}x{} exceeds the limit of {} cells",
                width, height, MAX_GRID_CELLS
            ))
        })
}

/// Grid dimensions for a source of `width` x `height` samples at `resolution`.
///
/// Grids above [`MAX_GRID_CELLS`] are `InvalidInput`.
pub fn grid_size(width: usize, height: usize, resolution: f32) -> Result<(usize, usize)> {
    let scaled = |n: usize| {
        let side = (n as f32 * resolution).floor();
        if side.is_finite() && side <= MAX_GRID_CELLS as f32 {
            Ok((side as usize).max(2))
        } else {
            Err(KernelError::invalid_input(format!(
                "resolution {} scales {} samples past the grid limit",
                resolution, n
            )))
        }
    };
    let (grid_w, grid_h) = (scaled(width)?, scaled(height)?);
    checked_cells(grid_w, grid_h)?;
    Ok((grid_w, grid_h))
}

/// Resample onto a `grid_w` x `grid_h` grid.
///
/// The source values are returned verbatim when the grid already matches.
pub fn resample(field: &Heightfield, grid_w: usize, grid_h: usize) -> Result<Vec<f32>> {
    if grid_w == field.width && grid_h == field.height {
        return Ok(field.values.clone());
    }
    let cells = checked_cells(grid_w, grid_h)?;

    let step = |src: usize, dst: usize| {
        if dst > 1 {
            (src.saturating_sub(1)) as f32 / (dst - 1) as f32
        } else {
            0.0
        }
    };
    let sx = step(field.width, grid_w);
    let sy = step(field.height, grid_h);

    let mut out = Vec::with_capacity(cells);
    for gy in 0..grid_h {
        for gx in 0..grid_w {
            out.push(field.sample(gx as f32 * sx, gy as f32 * sy));
        }
    }
    Ok(out)
}

/// Build the closed relief slab, plus the border frame when requested
pub fn generate(field: &Heightfield, options: &HeightfieldOptions) -> Result<GeometryBuffer> {
    options.validate()?;

    let (gw, gh) = grid_size(field.width, field.height, options.resolution)?;
    let grid = resample(field, gw, gh)?;

    let width = options.width;
    let depth = options
        .depth
        .unwrap_or(width * field.height as f32 / field.width as f32);
    let half_w = width / 2.0;
    let half_d = depth / 2.0;

    let x_at = |gx: usize| -half_w + gx as f32 * width / (gw - 1) as f32;
    let y_at = |gy: usize| half_d - gy as f32 * depth / (gh - 1) as f32;
    let z_at = |gx: usize, gy: usize| {
        let v = grid[gy * gw + gx];
        let v = if field.inverted { 1.0 - v } else { v };
        options.base_thickness + v * options.max_height
    };
    let top = |gx: usize, gy: usize| Point3::new(x_at(gx), y_at(gy), z_at(gx, gy));
    let floor = |gx: usize, gy: usize| Point3::new(x_at(gx), y_at(gy), 0.0);

    let triangles = 2 * (gw - 1) * (gh - 1) + 2 + 4 * (gw - 1) + 4 * (gh - 1);
    let mut builder = MeshBuilder::with_capacity(triangles);

    for gy in 0..gh - 1 {
        for gx in 0..gw - 1 {
            let p00 = top(gx, gy);
            let p10 = top(gx + 1, gy);
            let p01 = top(gx, gy + 1);
            let p11 = top(gx + 1, gy + 1);
            builder.push_flat_triangle(p00, p01, p11);
            builder.push_flat_triangle(p00, p11, p10);
        }
    }

    builder.push_quad(
        Point3::new(-half_w, half_d, 0.0),
        Point3::new(half_w, half_d, 0.0),
        Point3::new(half_w, -half_d, 0.0),
        Point3::new(-half_w, -half_d, 0.0),
        -Vector3::z(),
    );

    let (first_row, last_row) = (0, gh - 1);
    for gx in 0..gw - 1 {
        // front edge, image bottom
        builder.push_quad(
            floor(gx, last_row),
            floor(gx + 1, last_row),
            top(gx + 1, last_row),
            top(gx, last_row),
            -Vector3::y(),
        );
        builder.push_quad(
            floor(gx + 1, first_row),
            floor(gx, first_row),
            top(gx, first_row),
            top(gx + 1, first_row),
            Vector3::y(),
        );
    }

    let (first_col, last_col) = (0, gw - 1);
    for gy in 0..gh - 1 {
        builder.push_quad(
            floor(first_col, gy),
            floor(first_col, gy + 1),
            top(first_col, gy + 1),
            top(first_col, gy),
            -Vector3::x(),
        );
        builder.push_quad(
            floor(last_col, gy + 1),
            floor(last_col, gy),
            top(last_col, gy),
            top(last_col, gy + 1),
            Vector3::x(),
        );
    }

    let surface = builder.build();
    log::debug!(
        "heightfield {}x{} -> grid {}x{}, {} triangles",
        field.width,
        field.height,
        gw,
        gh,
        surface.triangle_count()
    );

    match &options.border {
        Some(border_options) => Ok(surface.merge(&border(width, depth, border_options))),
        None => Ok(surface),
    }
}

/// Rectangular frame hugging a `width` x `depth` slab centred on the origin
pub fn border(width: f32, depth: f32, options: &BorderOptions) -> GeometryBuffer {
    let rect = |hw: f32, hd: f32| {
        vec![
            Point2::new(-hw, -hd),
            Point2::new(hw, -hd),
            Point2::new(hw, hd),
            Point2::new(-hw, hd),
        ]
    };
    let inner = rect(width / 2.0, depth / 2.0);
    let outer = rect(width / 2.0 + options.width, depth / 2.0 + options.width);

    let mut builder = MeshBuilder::with_capacity(32);
    push_tube(&mut builder, &outer, &inner, options.height);
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(width: usize, height: usize) -> Heightfield {
        let values = (0..width * height)
            .map(|i| (i % width) as f32 / (width - 1).max(1) as f32)
            .collect();
        Heightfield::new(width, height, values, false).unwrap()
    }

    fn expected_triangles(gw: usize, gh: usize) -> usize {
        2 * (gw - 1) * (gh - 1) + 2 + 4 * (gw - 1) + 4 * (gh - 1)
    }

    #[test]
    fn test_new_rejects_mismatched_data() {
        assert!(Heightfield::new(2, 2, vec![0.0; 3], false).is_err());
        assert!(Heightfield::new(0, 2, vec![], false).is_err());
        let clamped = Heightfield::new(2, 1, vec![-1.0, 7.0], false).unwrap();
        assert_eq!(clamped.values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_grid_size_has_floor_of_two() {
        assert_eq!(grid_size(100, 50, 1.0).unwrap(), (100, 50));
        assert_eq!(grid_size(100, 50, 0.5).unwrap(), (50, 25));
        assert_eq!(grid_size(3, 3, 0.1).unwrap(), (2, 2));
        assert_eq!(grid_size(1, 1, 1.0).unwrap(), (2, 2));
    }

    #[test]
    fn test_oversized_grid_is_invalid_input() {
        assert!(matches!(grid_size(10, 10, 1e10), Err(KernelError::InvalidInput(_))));
        assert!(grid_size(4096, 4097, 1.0).is_err());
        assert_eq!(grid_size(4096, 4096, 1.0).unwrap(), (4096, 4096));
        assert!(grid_size(10, 10, f32::INFINITY).is_err());

        let options = HeightfieldOptions {
            resolution: 1e10,
            ..HeightfieldOptions::default()
        };
        let err = generate(&ramp(10, 10), &options).unwrap_err();
        assert!(matches!(err, KernelError::InvalidInput(_)), "{:?}", err);

        assert!(resample(&ramp(2, 2), usize::MAX, 2).is_err());
        assert!(Heightfield::new(usize::MAX, 2, Vec::new(), false).is_err());
    }

    #[test]
    fn test_resample_keeps_matching_grid_verbatim() {
        let field = ramp(4, 3);
        assert_eq!(resample(&field, 4, 3).unwrap(), field.values());
    }

    #[test]
    fn test_resample_interpolates_between_neighbours() {
        let field = Heightfield::new(2, 1, vec![0.0, 1.0], false).unwrap();
        let grid = resample(&field, 3, 2).unwrap();
        assert_relative_eq!(grid[1], 0.5);
        assert_relative_eq!(grid[2], 1.0);
        // single source row is clamped
        assert_relative_eq!(grid[4], 0.5);
    }

    #[test]
    fn test_triangle_count_matches_grid() {
        let field = ramp(10, 6);
        let mesh = generate(&field, &HeightfieldOptions::default()).unwrap();
        assert_eq!(mesh.triangle_count(), expected_triangles(10, 6));

        let options = HeightfieldOptions {
            resolution: 0.5,
            ..Default::default()
        };
        let mesh = generate(&field, &options).unwrap();
        assert_eq!(mesh.triangle_count(), expected_triangles(5, 3));
    }

    #[test]
    fn test_dimensions_and_heights() {
        let field = ramp(5, 5);
        let options = HeightfieldOptions {
            width: 50.0,
            max_height: 2.0,
            base_thickness: 1.0,
            ..Default::default()
        };
        let bbox = generate(&field, &options).unwrap().bounds();
        assert_relative_eq!(bbox.min.x, -25.0);
        assert_relative_eq!(bbox.max.y, 25.0);
        assert_relative_eq!(bbox.min.z, 0.0);
        assert_relative_eq!(bbox.max.z, 3.0);
    }

    #[test]
    fn test_inversion_flips_heights() {
        let flat_dark = Heightfield::new(2, 2, vec![0.0; 4], true).unwrap();
        let options = HeightfieldOptions {
            max_height: 2.0,
            base_thickness: 0.5,
            ..Default::default()
        };
        let bbox = generate(&flat_dark, &options).unwrap().bounds();
        assert_relative_eq!(bbox.max.z, 2.5);
    }

    #[test]
    fn test_border_is_merged() {
        let field = ramp(4, 4);
        let options = HeightfieldOptions {
            width: 40.0,
            border: Some(BorderOptions {
                width: 2.0,
                height: 5.0,
            }),
            ..Default::default()
        };
        let mesh = generate(&field, &options).unwrap();
        assert_eq!(mesh.triangle_count(), expected_triangles(4, 4) + 32);
        let bbox = mesh.bounds();
        assert_relative_eq!(bbox.max.x, 22.0);
        assert_relative_eq!(bbox.max.z, 5.0);
    }

    #[test]
    fn test_invalid_options() {
        let field = ramp(3, 3);
        for options in [
            HeightfieldOptions {
                width: 0.0,
                ..Default::default()
            },
            HeightfieldOptions {
                resolution: -1.0,
                ..Default::default()
            },
            HeightfieldOptions {
                base_thickness: -0.1,
                ..Default::default()
            },
            HeightfieldOptions {
                border: Some(BorderOptions {
                    width: 0.0,
                    height: 1.0,
                }),
                ..Default::default()
            },
        ] {
            assert!(generate(&field, &options).is_err());
        }
    }
}
