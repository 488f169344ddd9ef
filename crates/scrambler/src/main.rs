//! scrambler: displace every pixel of an image along its hue angle.
//!
//! Reads one image, runs the hue-displacement pipeline, and writes the
//! enlarged, scattered canvas as PNG.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin scrambler -- [OPTIONS] [IMAGE_PATH]
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`); pipeline stage
//! events are logged at `debug`.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use scrambler_pipeline::{CollisionPolicy, OffsetRounding, ScrambleConfig, codec};

/// Scramble a raster image by displacing pixels based on their hue.
///
/// Each pixel moves a fixed distance in the direction of its binned hue
/// angle. The output canvas is larger than the input so that nothing is
/// pushed off the edge; pixels that nothing lands on stay white.
#[derive(Parser)]
#[command(name = "scrambler", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(default_value = "test.png")]
    image_path: PathBuf,

    /// Output PNG path.
    #[arg(short, long, default_value = "out.png")]
    output: PathBuf,

    /// Number of hue sectors; each sector moves in one direction.
    #[arg(
        long,
        default_value_t = ScrambleConfig::DEFAULT_HUE_BINS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    hue_bins: u32,

    /// Displacement distance in pixels.
    ///
    /// Defaults to 5% of the longer image side.
    #[arg(long, value_name = "PIXELS")]
    displace: Option<f64>,

    /// How fractional offsets become whole pixels.
    #[arg(long, value_enum, default_value_t = Rounding::Floor)]
    rounding: Rounding,

    /// What happens when several pixels land on the same spot.
    #[arg(long, value_enum, default_value_t = Collision::LastWriteWins)]
    collision: Collision,

    /// Full scramble config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `ScrambleConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print a per-stage diagnostics report to stdout.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Offset rounding selection.
#[derive(Clone, Copy, ValueEnum)]
enum Rounding {
    /// Floor the destination coordinate.
    Floor,
    /// Truncate the offset toward zero.
    TowardZero,
    /// Round the offset to nearest.
    Nearest,
}

/// Collision policy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Collision {
    /// The pixel visited last wins.
    LastWriteWins,
    /// The pixel visited first wins.
    FirstWriteWins,
    /// Average all pixels that land on the spot.
    Average,
}

/// Build a [`ScrambleConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<ScrambleConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("error parsing --config-json: {e}"));
    }

    Ok(ScrambleConfig {
        hue_bins: cli.hue_bins,
        displace_magnitude: cli.displace,
        rounding: match cli.rounding {
            Rounding::Floor => OffsetRounding::Floor,
            Rounding::TowardZero => OffsetRounding::TowardZero,
            Rounding::Nearest => OffsetRounding::Nearest,
        },
        collision: match cli.collision {
            Collision::LastWriteWins => CollisionPolicy::LastWriteWins,
            Collision::FirstWriteWins => CollisionPolicy::FirstWriteWins,
            Collision::Average => CollisionPolicy::Average,
        },
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli).and_then(|c| {
        c.validate().map_err(|e| e.to_string())?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(msg) => {
            tracing::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!("error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        path = %cli.image_path.display(),
        bytes = image_bytes.len(),
        "read input image"
    );
    tracing::debug!(?config, "scramble config");

    // Decode failures end the run here, before any pixel is touched.
    let staged = match scrambler_pipeline::process_staged(image_bytes, &config) {
        Ok(staged) => staged,
        Err(e) => {
            tracing::error!("pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        width = staged.dimensions.width,
        height = staged.dimensions.height,
        canvas_width = staged.canvas.width(),
        canvas_height = staged.canvas.height(),
        magnitude = staged.params.magnitude,
        band = staged.params.band(),
        collisions = staged.stats.collisions,
        "scrambled image"
    );

    if cli.json {
        match serde_json::to_string_pretty(&staged.diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if cli.diagnostics {
        println!("{}", staged.diagnostics.report());
    }

    let png = match codec::encode_png(&staged.canvas) {
        Ok(png) => png,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&cli.output, &png) {
        tracing::error!("error writing {}: {e}", cli.output.display());
        return ExitCode::FAILURE;
    }

    tracing::info!(
        path = %cli.output.display(),
        bytes = png.len(),
        "wrote output image"
    );
    ExitCode::SUCCESS
}
