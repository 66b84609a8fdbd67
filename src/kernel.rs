// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Kernel session: configuration plus the lazily started script sandbox

use crate::config::KernelConfig;
use crate::error::Result;
use crate::geometry::analysis::{edge_report, signed_volume, surface_area};
use crate::geometry::{heightfield, BorderOptions, ExtrudeOptions, GeometryBuffer, Heightfield, HeightfieldOptions};
use crate::io::stl::write_stl;
use crate::sandbox::{self, rewrite, ParameterDefinition, Sandbox, SandboxStage};
use log::{debug, info};
use nalgebra::Point2;
use serde::Serialize;
use std::path::Path;

/// Positions closer than this are the same vertex when checking watertightness
const WELD_TOLERANCE: f32 = 1e-4;

/// Static check result for a script that was not run
#[derive(Debug, Clone, Serialize)]
pub struct ScriptReport {
    pub violations: Vec<String>,
    /// Number of `roundedCuboid` calls the safety patch rewrites
    pub rewrites: usize,
    pub patched: String,
}

impl ScriptReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Summary of a mesh for reporting
#[derive(Debug, Clone, Serialize)]
pub struct MeshInfo {
    pub triangles: usize,
    pub vertices: usize,
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub size: [f32; 3],
    pub watertight: bool,
    pub boundary_edges: usize,
    pub volume: f64,
    pub surface_area: f64,
}

impl MeshInfo {
    pub fn of(buffer: &GeometryBuffer) -> Self {
        let bounds = buffer.bounds();
        let size = bounds.size();
        let edges = edge_report(buffer, WELD_TOLERANCE);
        Self {
            triangles: buffer.triangle_count(),
            vertices: buffer.vertex_count(),
            min: [bounds.min.x, bounds.min.y, bounds.min.z],
            max: [bounds.max.x, bounds.max.y, bounds.max.z],
            size: [size.x, size.y, size.z],
            watertight: edges.is_watertight(),
            boundary_edges: edges.boundary_edges,
            volume: signed_volume(buffer),
            surface_area: surface_area(buffer),
        }
    }
}

/// Owns the configuration and the single execution context of a session
pub struct Kernel {
    config: KernelConfig,
    sandbox: Sandbox,
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let sandbox = Sandbox::new(config.sandbox.options());
        Self { config, sandbox }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn sandbox_stage(&self) -> SandboxStage {
        self.sandbox.stage()
    }

    /// Run a modeling script's `main(params)` and mesh the result
    pub fn execute_script(&mut self, script: &str, params: &serde_json::Value) -> Result<GeometryBuffer> {
        let buffer = self.sandbox.execute(script, params)?;
        info!("script produced {} triangles", buffer.triangle_count());
        Ok(buffer)
    }

    /// Like [`Kernel::execute_script`], with the script's declared defaults under `params`
    pub fn execute_with_defaults(
        &mut self,
        script: &str,
        params: serde_json::Value,
    ) -> Result<GeometryBuffer> {
        let definitions = self.sandbox.parameter_definitions(script)?;
        let merged = sandbox::merge_params(sandbox::defaults_from_definitions(&definitions), params);
        debug!("script parameters: {}", merged);
        self.execute_script(script, &merged)
    }

    pub fn parameter_definitions(&mut self, script: &str) -> Result<Vec<ParameterDefinition>> {
        self.sandbox.parameter_definitions(script)
    }

    /// Validation and safety patch preview, without running anything
    pub fn check_script(&self, script: &str) -> ScriptReport {
        let violations = sandbox::validate_script(script);
        ScriptReport {
            violations,
            rewrites: rewrite::rewrite_sites(script),
            patched: rewrite::apply_safety_patch(script),
        }
    }

    /// Stop the current script, if any; the next script starts a fresh context
    pub fn terminate(&mut self) {
        self.sandbox.terminate();
    }

    pub fn extrude(&self, points: &[Point2<f32>], height: f32, wall: Option<f32>) -> Result<GeometryBuffer> {
        let options = ExtrudeOptions {
            height,
            wall_thickness: wall,
        };
        crate::geometry::extrude(points, &options)
    }

    /// Heightfield options seeded from the configuration
    pub fn heightfield_options(&self) -> HeightfieldOptions {
        self.config.heightfield.options()
    }

    pub fn heightfield(
        &self,
        field: &Heightfield,
        options: &HeightfieldOptions,
    ) -> Result<GeometryBuffer> {
        let buffer = heightfield::generate(field, options)?;
        debug!(
            "heightfield {}x{} -> {} triangles",
            field.width(),
            field.height(),
            buffer.triangle_count()
        );
        Ok(buffer)
    }

    /// Load an image and turn it into a relief slab with the configured defaults
    pub fn lithophane(
        &self,
        image: impl AsRef<Path>,
        invert: bool,
        border: Option<BorderOptions>,
    ) -> Result<GeometryBuffer> {
        let field = crate::io::load_heightfield(image, invert)?;
        let options = HeightfieldOptions {
            border,
            ..self.heightfield_options()
        };
        self.heightfield(&field, &options)
    }

    pub fn export_stl(&self, buffer: &GeometryBuffer) -> Result<Vec<u8>> {
        let bytes = write_stl(buffer)?;
        debug!("exported {} triangles as binary STL", buffer.triangle_count());
        Ok(bytes)
    }

    pub fn export_stl_file(&self, path: impl AsRef<Path>, buffer: &GeometryBuffer) -> Result<()> {
        std::fs::write(path, self.export_stl(buffer)?)?;
        Ok(())
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_script() {
        let mut kernel = Kernel::default();
        let buffer = kernel
            .execute_script("function main() { return cuboid({ size: [2, 4, 6] }) }", &json!({}))
            .unwrap();
        let info = MeshInfo::of(&buffer);
        assert_eq!(info.triangles, 12);
        assert!(info.watertight);
        assert!((info.volume - 48.0).abs() < 1e-3);
        assert_eq!(kernel.sandbox_stage(), SandboxStage::Resolved);
    }

    #[test]
    fn test_defaults_are_merged_under_params() {
        let script = "function getParameterDefinitions() {\n\
                        return [{ name: 'w', type: 'float', initial: 2 }, { name: 'h', type: 'float', initial: 3 }]\n\
                      }\n\
                      function main(p) { return cuboid({ size: [p.w, 1, p.h] }) }";
        let mut kernel = Kernel::default();
        let buffer = kernel.execute_with_defaults(script, json!({ "w": 10 })).unwrap();
        let size = buffer.bounds().size();
        assert!((size.x - 10.0).abs() < 1e-5);
        assert!((size.z - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_check_script_does_not_execute() {
        let kernel = Kernel::default();
        let report = kernel.check_script(
            "function main() { return roundedCuboid({ size: [20, 20, 5], roundRadius: 10 }) }",
        );
        assert!(report.is_valid());
        assert_eq!(report.rewrites, 1);
        assert!(report.patched.contains("__safeRoundRadius([20, 20, 5], 10)"));
        assert_eq!(kernel.sandbox_stage(), SandboxStage::Idle);

        assert!(!kernel.check_script("eval('x')").is_valid());
    }

    #[test]
    fn test_export_is_binary_stl() {
        let kernel = Kernel::new(KernelConfig::default());
        let square = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let buffer = kernel.extrude(&square, 1.0, None).unwrap();
        let bytes = kernel.export_stl(&buffer).unwrap();
        assert!(crate::io::stl::is_binary_stl(&bytes));
        assert_eq!(bytes.len(), 84 + 50 * buffer.triangle_count());
    }
}
