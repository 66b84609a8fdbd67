// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Solidcraft CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use solidcraft::cli::{parse_pack_entry, parse_params, parse_points, Reporter};
use solidcraft::geometry::{BorderOptions, HeightfieldOptions};
use solidcraft::io::{self, ColoredObject};
use solidcraft::{logging, GeometryBuffer, Kernel, KernelConfig, KernelError, MeshInfo};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "solidcraft")]
#[command(about = "Solidcraft - parametric scripts, outlines and images to printable meshes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./solidcraft.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Stl,
    #[value(name = "3mf")]
    ThreeMf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a modeling script and export the result
    Compile {
        /// Script file
        script: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Parameters as a JSON object
        #[arg(long, conflicts_with = "params_file")]
        params: Option<String>,

        /// File holding the parameter JSON object
        #[arg(long)]
        params_file: Option<PathBuf>,

        /// Output format; derived from the output extension when omitted
        #[arg(short, long)]
        format: Option<Format>,

        /// Object color for 3MF output
        #[arg(long, default_value = "#FFFFFF")]
        color: String,
    },

    /// Extrude a 2D outline given as a JSON point list
    Extrude {
        /// JSON file with `[[x, y], ...]`
        points: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        height: f32,

        /// Wall thickness; produces a hollow shell
        #[arg(long)]
        wall: Option<f32>,
    },

    /// Turn a grayscale image into a relief slab (lithophane)
    Heightfield {
        image: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Slab width in mm
        #[arg(long)]
        width: Option<f32>,

        /// Slab depth in mm (derived from the aspect ratio when omitted)
        #[arg(long)]
        depth: Option<f32>,

        #[arg(long)]
        max_height: Option<f32>,

        /// Base thickness in mm
        #[arg(long)]
        base: Option<f32>,

        /// Grid samples per image pixel
        #[arg(long)]
        resolution: Option<f32>,

        /// Darker pixels produce thicker geometry
        #[arg(long)]
        invert: bool,

        #[arg(long, requires = "border_height")]
        border_width: Option<f32>,

        #[arg(long, requires = "border_width")]
        border_height: Option<f32>,
    },

    /// Pack colored STL parts into one 3MF file
    Pack {
        /// Parts as `file.stl:#RRGGBB`
        #[arg(required = true)]
        parts: Vec<String>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print triangle count, bounds and watertightness of an STL file
    Info {
        file: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a script and preview the safety patch without running it
    Check { script: PathBuf },

    /// Print a script's parameter definitions as JSON
    Params { script: PathBuf },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        Reporter::report_error(&format!("{:#}", e));
        let timed_out = e
            .downcast_ref::<KernelError>()
            .is_some_and(KernelError::is_timeout);
        std::process::exit(if timed_out { 2 } else { 1 });
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = KernelConfig::load_from(cli.config.as_deref())?;
    logging::init_logger(&config.log_level, cli.verbose);
    let mut kernel = Kernel::new(config);

    match cli.command {
        Commands::Compile {
            script,
            output,
            params,
            params_file,
            format,
            color,
        } => {
            let params = match (params, params_file) {
                (Some(inline), _) => parse_params(&inline)?,
                (None, Some(file)) => {
                    let text = std::fs::read_to_string(&file)
                        .with_context(|| format!("Failed to read parameter file: {:?}", file))?;
                    parse_params(&text)?
                }
                (None, None) => serde_json::json!({}),
            };
            compile_command(&mut kernel, &script, &output, params, format, &color)
        }
        Commands::Extrude {
            points,
            output,
            height,
            wall,
        } => {
            let text = std::fs::read_to_string(&points)
                .with_context(|| format!("Failed to read point file: {:?}", points))?;
            let outline = parse_points(&text)?;
            let start = Instant::now();
            let buffer = kernel.extrude(&outline, height, wall)?;
            finish(&kernel, &output, &buffer, Format::Stl, "#FFFFFF", start)
        }
        Commands::Heightfield {
            image,
            output,
            width,
            depth,
            max_height,
            base,
            resolution,
            invert,
            border_width,
            border_height,
        } => {
            let defaults = kernel.heightfield_options();
            let options = HeightfieldOptions {
                width: width.unwrap_or(defaults.width),
                depth,
                max_height: max_height.unwrap_or(defaults.max_height),
                base_thickness: base.unwrap_or(defaults.base_thickness),
                resolution: resolution.unwrap_or(defaults.resolution),
                border: border_width
                    .zip(border_height)
                    .map(|(width, height)| BorderOptions { width, height }),
            };
            let start = Instant::now();
            let field = io::load_heightfield(&image, invert)
                .with_context(|| format!("Failed to load image: {:?}", image))?;
            let buffer = kernel.heightfield(&field, &options)?;
            finish(&kernel, &output, &buffer, output_format(&output, None), "#FFFFFF", start)
        }
        Commands::Pack { parts, output } => pack_command(&parts, &output),
        Commands::Info { file, json } => {
            let buffer = io::read_stl_file(&file)
                .with_context(|| format!("Failed to read STL file: {:?}", file))?;
            let info = MeshInfo::of(&buffer);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                Reporter::report_mesh(&file.display().to_string(), &info, None);
            }
            Ok(())
        }
        Commands::Check { script } => {
            let source = io::import_script_file(&script)?;
            let report = kernel.check_script(&source);
            Reporter::report_script_check(&script.display().to_string(), &report);
            if !report.is_valid() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Params { script } => {
            let source = io::import_script_file(&script)?;
            let definitions = kernel.parameter_definitions(&source)?;
            if definitions.is_empty() {
                Reporter::report_info(&format!("{} declares no parameters", script.display()));
            } else {
                println!("{}", serde_json::to_string_pretty(&definitions)?);
            }
            Ok(())
        }
        Commands::Version => {
            println!("Solidcraft v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn output_format(output: &Path, explicit: Option<Format>) -> Format {
    explicit.unwrap_or_else(|| {
        match output.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
            Some(ext) if ext == "3mf" => Format::ThreeMf,
            _ => Format::Stl,
        }
    })
}

fn compile_command(
    kernel: &mut Kernel,
    script: &Path,
    output: &Path,
    params: serde_json::Value,
    format: Option<Format>,
    color: &str,
) -> Result<()> {
    let source = io::import_script_file(script)?;
    info!("compiling {}", script.display());

    let start = Instant::now();
    let buffer = kernel
        .execute_with_defaults(&source, params)
        .with_context(|| format!("Failed to compile {:?}", script))?;
    finish(kernel, output, &buffer, output_format(output, format), color, start)
}

fn finish(
    kernel: &Kernel,
    output: &Path,
    buffer: &GeometryBuffer,
    format: Format,
    color: &str,
    start: Instant,
) -> Result<()> {
    if buffer.is_empty() {
        bail!("nothing to export: the mesh has no triangles");
    }

    match format {
        Format::Stl => kernel.export_stl_file(output, buffer)?,
        Format::ThreeMf => {
            let name = output
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("object")
                .to_string();
            io::write_3mf_file(output, &[ColoredObject::new(name, buffer.clone(), color)])?;
        }
    }

    Reporter::report_mesh(&output.display().to_string(), &MeshInfo::of(buffer), Some(start.elapsed()));
    Reporter::success(&format!("Wrote {}", output.display()));
    Ok(())
}

fn pack_command(parts: &[String], output: &Path) -> Result<()> {
    let mut objects = Vec::with_capacity(parts.len());
    for part in parts {
        let entry = parse_pack_entry(part)?;
        let buffer = io::read_stl_file(&entry.path)
            .with_context(|| format!("Failed to read STL file: {:?}", entry.path))?;
        if buffer.is_empty() {
            Reporter::report_warning(&format!("{} has no triangles", entry.path.display()));
        }
        let name = entry
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("part")
            .to_string();
        objects.push(ColoredObject::new(name, buffer, entry.color));
    }

    io::write_3mf_file(output, &objects)?;
    Reporter::success(&format!("Packed {} part(s) into {}", objects.len(), output.display()));
    Ok(())
}
