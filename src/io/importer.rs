// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! File importers: images for heightfields, modeling scripts

use crate::error::Result;
use crate::geometry::Heightfield;
use image::DynamicImage;
use std::fs;
use std::path::Path;

/// Luminance of an RGBA pixel composited over white, in [0, 1]
pub fn luminance(rgba: [u8; 4]) -> f32 {
    let alpha = f32::from(rgba[3]) / 255.0;
    let channel = |c: u8| f32::from(c) / 255.0 * alpha + (1.0 - alpha);
    let (r, g, b) = (channel(rgba[0]), channel(rgba[1]), channel(rgba[2]));
    (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 1.0)
}

/// Brightness grid of a decoded image
pub fn heightfield_from_image(image: &DynamicImage, invert: bool) -> Result<Heightfield> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let values = rgba.pixels().map(|p| luminance(p.0)).collect();
    Heightfield::new(width as usize, height as usize, values, invert)
}

/// Decode an image file of any supported format into a heightfield
pub fn load_heightfield(path: impl AsRef<Path>, invert: bool) -> Result<Heightfield> {
    let path = path.as_ref();
    let image = image::open(path)?;
    log::debug!(
        "decoded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    heightfield_from_image(&image, invert)
}

/// Read a modeling script from disk
pub fn import_script_file(path: impl AsRef<Path>) -> Result<String> {
    Ok(fs::read_to_string(path.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgba, RgbaImage};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_luminance_weights() {
        assert_relative_eq!(luminance([255, 255, 255, 255]), 1.0);
        assert_relative_eq!(luminance([0, 0, 0, 255]), 0.0);
        assert_relative_eq!(luminance([255, 0, 0, 255]), 0.299, epsilon = 1e-6);
        // fully transparent reads as white
        assert_relative_eq!(luminance([0, 0, 0, 0]), 1.0);
    }

    #[test]
    fn test_heightfield_from_image_is_row_major() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 255]));
        let field = heightfield_from_image(&DynamicImage::ImageRgba8(img), true).unwrap();

        assert_eq!(field.width(), 3);
        assert_eq!(field.height(), 2);
        assert!(field.is_inverted());
        assert_relative_eq!(field.value(2, 0), 0.0);
        assert_relative_eq!(field.value(0, 1), 1.0);
    }

    #[test]
    fn test_load_heightfield_from_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        let img = RgbaImage::from_fn(4, 4, |x, _| {
            let v = (x * 85) as u8;
            Rgba([v, v, v, 255])
        });
        img.save(&path).unwrap();

        let field = load_heightfield(&path, false).unwrap();
        assert_eq!(field.values().len(), 16);
        assert!(field.value(3, 0) > field.value(0, 0));
    }

    #[test]
    fn test_import_script_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "function main() {{ return cuboid() }}").unwrap();
        let source = import_script_file(file.path()).unwrap();
        assert!(source.contains("function main"));
    }

    #[test]
    fn test_missing_image_is_an_error() {
        assert!(load_heightfield("/nonexistent/heightfield.png", false).is_err());
    }
}
