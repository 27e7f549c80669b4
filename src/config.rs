//! Command-line configuration for pyramid-tiler.
//!
//! This module provides the CLI definition, supporting:
//! - Command-line arguments via clap
//! - Environment variables with `PYRAMID_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use pyramid_tiler::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Convert(config) => println!("{} -> {}", config.input.display(), config.output.display()),
//!     Command::Inspect(config) => println!("inspecting {}", config.path.display()),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `PYRAMID_RESOLUTIONS` - Levels generated below the base (default: 0)
//! - `PYRAMID_SCALE` - Scale factor between levels (default: 2)
//! - `PYRAMID_TILE_SIZE` - `N`, `WxH` or `whole` (default: 512)

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::error::ConfigError;
use crate::pyramid::{PyramidConfig, DEFAULT_SCALE_FACTOR};
use crate::tile::TileSizeMode;

// =============================================================================
// Default Values
// =============================================================================

/// Default number of levels below the base.
pub const DEFAULT_RESOLUTIONS: usize = 0;

/// Default tile size argument.
pub const DEFAULT_TILE_SIZE_ARG: &str = "512";

// =============================================================================
// CLI Arguments
// =============================================================================

/// pyramid-tiler - Build tiled multi-resolution pyramids from large images.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyramid-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert an image into a tiled pyramid container.
    Convert(ConvertConfig),

    /// Print the structure of a pyramid container.
    Inspect(InspectConfig),
}

// =============================================================================
// Convert
// =============================================================================

/// Conversion options.
#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Input image (PNG, TIFF or JPEG).
    pub input: PathBuf,

    /// Output pyramid file.
    pub output: PathBuf,

    /// Number of resolution levels generated below the base.
    #[arg(short, long, default_value_t = DEFAULT_RESOLUTIONS, env = "PYRAMID_RESOLUTIONS")]
    pub resolutions: usize,

    /// Integer scale factor between consecutive levels (at least 2).
    #[arg(short, long, default_value_t = DEFAULT_SCALE_FACTOR, env = "PYRAMID_SCALE")]
    pub scale: u32,

    /// Tile size: `N` for square tiles, `WxH`, or `whole` for one tile per
    /// level.
    #[arg(short, long, default_value = DEFAULT_TILE_SIZE_ARG, env = "PYRAMID_TILE_SIZE")]
    pub tile_size: TileSizeMode,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ConvertConfig {
    /// Create a configuration with default pyramid settings.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            resolutions: DEFAULT_RESOLUTIONS,
            scale: DEFAULT_SCALE_FACTOR,
            tile_size: TileSizeMode::default(),
            verbose: false,
        }
    }

    pub fn with_resolutions(mut self, resolutions: usize) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_tile_size(mut self, tile_size: TileSizeMode) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Validate the configuration before any pixel I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pyramid_config().validate()?;

        if !self.input.is_file() {
            return Err(ConfigError::InputNotFound(
                self.input.display().to_string(),
            ));
        }

        if self.output.is_dir() {
            return Err(self.unwritable("path is a directory"));
        }

        let parent = match self.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(self.unwritable("parent directory does not exist"));
        }

        if same_file(&self.input, &self.output) {
            return Err(self.unwritable("output would overwrite the input"));
        }

        Ok(())
    }

    /// Immutable pyramid parameters for the builder.
    pub fn pyramid_config(&self) -> PyramidConfig {
        PyramidConfig::new(self.resolutions, self.scale, self.tile_size)
    }

    fn unwritable(&self, reason: &str) -> ConfigError {
        ConfigError::OutputNotWritable {
            path: self.output.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

// =============================================================================
// Inspect
// =============================================================================

/// Inspection options.
#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Pyramid file to inspect.
    pub path: PathBuf,

    /// Check tile coverage and payload checksums; exit non-zero on errors.
    #[arg(long, default_value_t = false)]
    pub validate: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
