// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Solidcraft geometry kernel
//!
//! Turns restricted modeling scripts, 2D outlines and grayscale images into
//! printable triangle meshes, and writes them as binary STL or colored 3MF.

pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod kernel;
pub mod logging;
pub mod modeling;
pub mod sandbox;
pub mod script;
pub mod utils;

pub use config::KernelConfig;
pub use error::{KernelError, Result};
pub use geometry::{BoundingBox, GeometryBuffer, Heightfield, HeightfieldOptions};
pub use io::{read_stl, write_3mf, write_stl, ColoredObject};
pub use kernel::{Kernel, MeshInfo, ScriptReport};
pub use sandbox::{Sandbox, SandboxStage};

/// Run a modeling script once with a default kernel
pub fn render_script(script: &str, params: &serde_json::Value) -> Result<GeometryBuffer> {
    Kernel::default().execute_script(script, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cube() {
        let result = render_script(
            "function main() { return cuboid({ size: [10, 10, 10] }) }",
            &serde_json::json!({}),
        );
        assert!(result.is_ok());
    }
}
