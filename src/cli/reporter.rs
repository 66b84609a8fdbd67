// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use crate::kernel::{MeshInfo, ScriptReport};
use colored::*;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    fn rule() {
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Report a generated or inspected mesh
    pub fn report_mesh(file: &str, info: &MeshInfo, duration: Option<Duration>) {
        println!();
        Self::rule();
        println!("{} {}", "Mesh:".bold(), file.cyan());
        Self::rule();
        println!("  {} {}", "Triangles:".bright_black(), info.triangles.to_string().cyan());
        println!("  {} {}", "Vertices:".bright_black(), info.vertices.to_string().cyan());
        println!(
            "  {} {:.3} x {:.3} x {:.3} mm",
            "Size:".bright_black(),
            info.size[0],
            info.size[1],
            info.size[2]
        );
        println!(
            "  {} [{:.3}, {:.3}, {:.3}] .. [{:.3}, {:.3}, {:.3}]",
            "Bounds:".bright_black(),
            info.min[0],
            info.min[1],
            info.min[2],
            info.max[0],
            info.max[1],
            info.max[2]
        );
        println!("  {} {:.3} mm³", "Volume:".bright_black(), info.volume);
        println!("  {} {:.3} mm²", "Area:".bright_black(), info.surface_area);

        let watertight = if info.watertight {
            "yes".green()
        } else {
            format!("no ({} open edges)", info.boundary_edges).yellow()
        };
        println!("  {} {}", "Watertight:".bright_black(), watertight);

        if let Some(duration) = duration {
            println!("  {} {}", "Time:".bright_black(), Self::format_duration(duration).yellow());
        }
        Self::rule();
    }

    /// Report static checks and the safety patch preview
    pub fn report_script_check(file: &str, report: &ScriptReport) {
        println!();
        Self::rule();
        println!("{} {}", "Script:".bold(), file.cyan());
        Self::rule();

        if report.is_valid() {
            println!("{} {}", "✅".green(), "Validation passed".green().bold());
        } else {
            println!("{} {}", "❌".red(), "Validation failed".red().bold());
            for violation in &report.violations {
                println!("  {} {}", "•".red(), violation);
            }
        }

        if report.rewrites > 0 {
            println!(
                "\n{} {} roundedCuboid call(s) rewritten:",
                "Safety patch:".bold(),
                report.rewrites.to_string().yellow()
            );
            for line in report.patched.lines().filter(|l| l.contains("__safeRoundRadius")) {
                println!("  {}", line.trim().bright_black());
            }
        } else {
            println!("\n{} {}", "Safety patch:".bold(), "no changes".bright_black());
        }
        Self::rule();
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }

    /// Print success message
    pub fn success(message: &str) {
        println!("{} {}", "✅".green(), message.green());
    }
}
