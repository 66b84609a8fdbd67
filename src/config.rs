// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Kernel configuration: `solidcraft.toml` plus environment overrides

use crate::error::{KernelError, Result as KernelResult};
use crate::geometry::HeightfieldOptions;
use crate::sandbox::{SandboxOptions, WorkerOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no path is given
pub const CONFIG_FILE: &str = "solidcraft.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Seconds the caller waits for a script before giving up
    pub timeout_secs: u64,
    pub max_call_depth: usize,
    /// Stack size of the execution context thread
    pub worker_stack_mb: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_call_depth: 256,
            worker_stack_mb: 256,
        }
    }
}

impl SandboxConfig {
    pub fn options(&self) -> SandboxOptions {
        SandboxOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            worker: WorkerOptions {
                stack_size: self.worker_stack_mb * 1024 * 1024,
                max_call_depth: self.max_call_depth,
            },
        }
    }
}

/// Defaults for heightfield generation; per-call options override them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightfieldConfig {
    pub width: f32,
    pub max_height: f32,
    pub base_thickness: f32,
    pub resolution: f32,
}

impl Default for HeightfieldConfig {
    fn default() -> Self {
        let defaults = HeightfieldOptions::default();
        Self {
            width: defaults.width,
            max_height: defaults.max_height,
            base_thickness: defaults.base_thickness,
            resolution: defaults.resolution,
        }
    }
}

impl HeightfieldConfig {
    pub fn options(&self) -> HeightfieldOptions {
        HeightfieldOptions {
            width: self.width,
            max_height: self.max_height,
            base_thickness: self.base_thickness,
            resolution: self.resolution,
            ..HeightfieldOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    pub sandbox: SandboxConfig,
    pub heightfield: HeightfieldConfig,
    /// Default log filter, e.g. `info` or `solidcraft=debug`
    pub log_level: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            heightfield: HeightfieldConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: KernelConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `solidcraft.toml` (if present) with environment variable overrides
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`KernelConfig::load`], reading `path` instead of the default file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if PathBuf::from(CONFIG_FILE).exists() => Self::from_file(CONFIG_FILE)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `SOLIDCRAFT_*` overrides from `lookup`; unparsable values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secs) = lookup("SOLIDCRAFT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.sandbox.timeout_secs = secs;
        }

        if let Some(depth) = lookup("SOLIDCRAFT_MAX_CALL_DEPTH").and_then(|v| v.parse().ok()) {
            self.sandbox.max_call_depth = depth;
        }

        if let Some(level) = lookup("SOLIDCRAFT_LOG") {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> KernelResult<()> {
        if self.sandbox.timeout_secs == 0 {
            return Err(KernelError::Config("sandbox.timeout_secs must be positive".into()));
        }
        if self.sandbox.max_call_depth == 0 {
            return Err(KernelError::Config("sandbox.max_call_depth must be positive".into()));
        }
        if self.sandbox.worker_stack_mb == 0 {
            return Err(KernelError::Config("sandbox.worker_stack_mb must be positive".into()));
        }
        let h = &self.heightfield;
        if !(h.width > 0.0 && h.resolution > 0.0 && h.max_height >= 0.0 && h.base_thickness >= 0.0) {
            return Err(KernelError::Config(
                "heightfield width and resolution must be positive, heights non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = KernelConfig::default();
        assert_eq!(config.sandbox.timeout_secs, 30);
        assert_eq!(config.sandbox.max_call_depth, 256);
        assert_eq!(config.heightfield.width, 100.0);
        assert_eq!(config.sandbox.options().timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: KernelConfig = toml::from_str(
            "log_level = \"debug\"\n[sandbox]\ntimeout_secs = 5\n[heightfield]\nmax_height = 4.5\n",
        )
        .unwrap();
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.max_call_depth, 256);
        assert_eq!(config.heightfield.max_height, 4.5);
        assert_eq!(config.heightfield.base_thickness, 0.8);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SOLIDCRAFT_TIMEOUT_SECS", "12"),
            ("SOLIDCRAFT_MAX_CALL_DEPTH", "not a number"),
            ("SOLIDCRAFT_LOG", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = KernelConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.sandbox.timeout_secs, 12);
        assert_eq!(config.sandbox.max_call_depth, 256);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = KernelConfig::default();
        config.sandbox.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(KernelError::Config(_))));

        let mut config = KernelConfig::default();
        config.heightfield.resolution = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solidcraft.toml");

        let mut config = KernelConfig::default();
        config.sandbox.timeout_secs = 7;
        config.heightfield.width = 120.0;
        config.save(&path).unwrap();

        let loaded = KernelConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
