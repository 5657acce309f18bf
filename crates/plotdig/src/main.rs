//! plotdig: command-line digitizer.
//!
//! Loads an image, replays transform and contour commands (given as
//! flags, a JSON script, or both), then optionally writes the overlay
//! image, prints the contour registry as JSON and exports the marked
//! contours as calibrated CSV.
//!
//! Flags run first, in pipeline order: resize, gray, blur, edges,
//! contour discovery. The script's commands follow. When an output
//! needs contours and none exist yet, edge detection and discovery run
//! automatically.
//!
//! # Usage
//!
//! ```text
//! plotdig [OPTIONS] <IMAGE_PATH>
//! plotdig plot.png --resize vga --gray --blur-passes 2 --edges --find --external \
//!     --script labels.json --overlay overlay.png --export curve --force
//! ```
//!
//! A script is a JSON array of commands, for example:
//!
//! ```text
//! [
//!   {"op": "label_contour", "key": 4, "label": "tick", "coordinate": "0,0"},
//!   {"op": "label_contour", "key": 7, "label": "tick", "coordinate": "10,0"},
//!   {"op": "label_contour", "key": 2, "label": "tick", "coordinate": "0,1e2"},
//!   {"op": "split_contour", "key": 9},
//!   {"op": "mark", "key": 12}
//! ]
//! ```
//!
//! Logging goes to stderr through `env_logger` (`RUST_LOG`, default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use plotdig_pipeline::{
    BlurAmount, BlurKind, Command, EdgeKind, Pipeline, PipelineConfig, Raster, ResizeFilter,
    SizeName,
};

/// Digitize plotted curves from an image.
///
/// Applies classical image transforms, discovers contours, calibrates
/// from contours labeled "tick" and exports marked contours as CSV.
#[derive(Parser)]
#[command(name = "plotdig", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, TIFF, BMP, PPM/PGM/PBM, WebP).
    image_path: PathBuf,

    /// Shrink to a named resolution.
    #[arg(long, value_enum)]
    resize: Option<Size>,

    /// Convert to grayscale.
    #[arg(long)]
    gray: bool,

    /// Gaussian blur with this many passes (kernel 3 + 2(n-1)).
    #[arg(long, conflicts_with = "blur_strength", value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    blur_passes: Option<u32>,

    /// Gaussian blur with kernel size as a fraction (0 to 1) of the smaller side.
    #[arg(long)]
    blur_strength: Option<f64>,

    /// Run Canny edge detection with automatic thresholds.
    #[arg(long)]
    edges: bool,

    /// Discover contours over the whole image.
    #[arg(long)]
    find: bool,

    /// Keep only outermost contours when discovering.
    #[arg(long)]
    external: bool,

    /// JSON file with a list of commands to apply after the flags.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Corner tolerance in pixels for contour splitting.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SPLIT_EPSILON)]
    split_epsilon: f64,

    /// ROI padding as a fraction of the image size for scoped discovery.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ROI_PADDING)]
    roi_padding: f64,

    /// Hit-test radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_HIT_THRESHOLD)]
    hit_threshold: f64,

    /// Resampling filter for --resize (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resize_filter: Filter,

    /// Write the processed buffer instead of the contour overlay.
    #[arg(long)]
    show_pipeline: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other config flags are ignored. The JSON must
    /// be a valid `PipelineConfig` serialization; missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the display image (overlay or processed buffer) as PNG.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Export marked contours as calibrated CSV (".csv" is appended if missing).
    #[arg(long)]
    export: Option<PathBuf>,

    /// Overwrite an existing export file.
    #[arg(long)]
    force: bool,

    /// Print the contour registry as JSON on stdout.
    #[arg(long)]
    json: bool,
}

/// Named target resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Size {
    /// 640x480.
    Vga,
    /// 1280x720.
    Hd,
    /// 1920x1080.
    Fhd,
    /// 3840x2160.
    #[value(name = "4k")]
    Uhd4k,
}

impl From<Size> for SizeName {
    fn from(size: Size) -> Self {
        match size {
            Size::Vga => Self::Vga,
            Size::Hd => Self::Hd,
            Size::Fhd => Self::Fhd,
            Size::Uhd4k => Self::Uhd4k,
        }
    }
}

/// Resize resampling filter selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

const fn filter_from_pipeline(f: ResizeFilter) -> Filter {
    match f {
        ResizeFilter::Nearest => Filter::Nearest,
        ResizeFilter::Triangle => Filter::Triangle,
        ResizeFilter::CatmullRom => Filter::CatmullRom,
        ResizeFilter::Gaussian => Filter::Gaussian,
        ResizeFilter::Lanczos3 => Filter::Lanczos3,
    }
}

const fn filter_to_pipeline(f: Filter) -> ResizeFilter {
    match f {
        Filter::Nearest => ResizeFilter::Nearest,
        Filter::Triangle => ResizeFilter::Triangle,
        Filter::CatmullRom => ResizeFilter::CatmullRom,
        Filter::Gaussian => ResizeFilter::Gaussian,
        Filter::Lanczos3 => ResizeFilter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`PipelineConfig::DEFAULT_RESIZE_FILTER`].
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_RESIZE_FILTER);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// `--config-json` wins over the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(PipelineConfig {
        roi_padding: cli.roi_padding,
        split_epsilon: cli.split_epsilon,
        hit_threshold: cli.hit_threshold,
        resize_filter: filter_to_pipeline(cli.resize_filter),
        show_pipeline: cli.show_pipeline,
    })
}

/// The commands the transform flags ask for, in pipeline order.
fn commands_from_flags(cli: &Cli) -> Vec<Command> {
    let mut commands = Vec::new();
    if let Some(size) = cli.resize {
        commands.push(Command::Resize { size: size.into() });
    }
    if cli.gray {
        commands.push(Command::Gray);
    }
    let blur = cli
        .blur_passes
        .map(BlurAmount::Passes)
        .or_else(|| cli.blur_strength.map(BlurAmount::Strength));
    if let Some(amount) = blur {
        commands.push(Command::Blur {
            kind: BlurKind::Gaussian,
            amount,
        });
    }
    if cli.edges {
        commands.push(Command::Edges {
            kind: EdgeKind::Canny,
        });
    }
    if cli.find {
        commands.push(Command::FindContours {
            external: cli.external,
            parent: None,
        });
    }
    commands
}

fn read_script(path: &Path) -> Result<Vec<Command>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Error reading script {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Error parsing script {}: {e}", path.display()))
}

fn save_raster(raster: &Raster, path: &Path) -> Result<(), String> {
    let saved = match raster {
        Raster::Gray(img) => img.save(path),
        Raster::Rgb(img) => img.save(path),
    };
    saved.map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn registry_json(pipeline: &Pipeline) -> Result<String, String> {
    let entries: Vec<serde_json::Value> = pipeline
        .contours()
        .iter()
        .map(|(key, contour)| {
            serde_json::json!({
                "key": key,
                "marked": pipeline.export_marks().contains(&key),
                "contour": contour,
            })
        })
        .collect();
    serde_json::to_string_pretty(&entries).map_err(|e| format!("Error serializing contours: {e}"))
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    let show_pipeline = config.show_pipeline;
    let mut pipeline = Pipeline::with_config(config);

    let dimensions = pipeline
        .load(&cli.image_path)
        .map_err(|e| format!("Error loading {}: {e}", cli.image_path.display()))?;
    log::info!("loaded {} ({dimensions})", cli.image_path.display());

    let mut commands = commands_from_flags(cli);
    if let Some(ref script) = cli.script {
        commands.extend(read_script(script)?);
    }

    for (step, command) in commands.iter().enumerate() {
        match pipeline.apply(command) {
            Ok(outcome) => log::info!("step {}: {command:?} -> {outcome:?}", step + 1),
            Err(e) if e.is_validation() => {
                return Err(format!("Step {} ({command:?}) rejected: {e}", step + 1));
            }
            Err(e) => return Err(format!("Step {} ({command:?}) failed: {e}", step + 1)),
        }
        for advisory in pipeline.take_advisories() {
            eprintln!("note: {advisory}");
        }
    }

    let needs_contours = cli.json || cli.export.is_some() || (cli.overlay.is_some() && !show_pipeline);
    if needs_contours
        && pipeline
            .ensure_contours(cli.external)
            .map_err(|e| format!("Contour discovery failed: {e}"))?
    {
        log::info!("discovered {} contour(s)", pipeline.contours().len());
    }

    if let Some(ref path) = cli.overlay {
        let image = pipeline
            .display_image(show_pipeline)
            .ok_or_else(|| "No image to display".to_owned())?;
        save_raster(&image, path)?;
        eprintln!("Display image written to {}", path.display());
    }

    if cli.json {
        println!("{}", registry_json(&pipeline)?);
    }

    if let Some(ref path) = cli.export {
        let points = pipeline
            .export_points()
            .map_err(|e| format!("Export failed: {e}"))?;
        let written = plotdig_export::write_csv(path, &points, cli.force)
            .map_err(|e| format!("Export failed: {e}"))?;
        eprintln!("{} point(s) written to {}", points.len(), written.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
