//! pyramid-tiler - Build tiled multi-resolution pyramids from large images.
//!
//! This binary parses the command line, configures logging and runs the
//! requested subcommand.

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyramid_tiler::{
    config::{Cli, Command, ConvertConfig, InspectConfig},
    convert, PyramidReader,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Convert(config) => run_convert(config),
        Command::Inspect(config) => run_inspect(config),
    }
}

// =============================================================================
// Convert Command
// =============================================================================

fn run_convert(config: ConvertConfig) -> ExitCode {
    init_logging(config.verbose);

    info!("Converting {}", config.input.display());
    info!("  Output: {}", config.output.display());
    info!("  Resolutions: {}", config.resolutions);
    info!("  Scale factor: {}", config.scale);
    info!("  Tile size: {}", config.tile_size);

    let start = Instant::now();
    match convert(&config) {
        Ok(summary) => {
            info!(
                "Done: {} series, {} planes, {} tiles in {:.2?}",
                summary.series,
                summary.planes,
                summary.tiles_written,
                start.elapsed()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

fn run_inspect(config: InspectConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    let reader = match PyramidReader::open_path(&config.path) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let metadata = reader.metadata();
    let format = &metadata.pixel_format;

    println!("Pyramid: {}", config.path.display());
    println!("═════════════════════════════════");
    println!(
        "Pixel format: {} channel(s), {} byte(s)/sample, {}{}, {}",
        format.channels,
        format.bytes_per_sample,
        if format.floating_point {
            "float"
        } else if format.signed {
            "signed"
        } else {
            "unsigned"
        },
        if format.little_endian { " LE" } else { " BE" },
        if format.interleaved {
            "interleaved"
        } else {
            "planar"
        }
    );
    println!("Scale factor: {}", metadata.scale_factor);
    println!("Series count: {}", reader.series_count());

    for (index, series) in metadata.series.iter().enumerate() {
        println!();
        println!("Series #{}", index);
        println!("─────────────────");
        println!("  Planes: {}", series.plane_count);
        println!("  Tile size: {}x{}", series.tile_width, series.tile_height);
        println!("  Resolution count: {}", series.resolution_count());
        for (level, geometry) in series.levels.iter().enumerate() {
            let tiles = series.grid(level).map(|g| g.len()).unwrap_or(0);
            println!(
                "    Resolution #{}: {}x{} ({} tile(s) per plane)",
                level, geometry.width, geometry.height, tiles
            );
        }
    }

    if config.validate {
        println!();
        print!("Validating... ");
        let result = reader.validate_payloads();

        for warning in &result.warnings {
            println!();
            println!("  ! {}", warning);
        }

        if result.is_valid {
            println!("✓ {} tiles OK", reader.entries().len());
        } else {
            println!("✗ {} error(s)", result.errors.len());
            for error in &result.errors {
                println!("  - {}", error);
            }
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pyramid_tiler=debug"
    } else {
        "pyramid_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
