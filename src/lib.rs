//! # pyramid-tiler
//!
//! Converts large raster images into tiled, multi-resolution pyramids.
//!
//! This library provides boundary-safe tile planning, box downsampling and a
//! sequential pyramid builder that streams tiles from an image source to a
//! tiled sink, so that viewers can fetch only the tiles and resolutions they
//! need instead of the full-resolution image.
//!
//! ## Features
//!
//! - **Edge-safe tiling**: Images need not be a multiple of the tile size; edge tiles are truncated
//! - **Format-faithful downsampling**: 8 to 64-bit integers and 32/64-bit floats, any endianness,
//!   interleaved or planar channels
//! - **Multi-series, multi-plane**: Every plane of every series gets its own pyramid
//! - **Checksummed container**: Single-file `.tpyr` output with a SHA-256 per tile
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`tile`] - Tile-grid planner and box downsampler
//! - [`raster`] - Source/sink contracts, in-memory and image-file sources
//! - [`pyramid`] - Pyramid planning, the builder state machine, and conversion
//! - [`mod@format`] - The `.tpyr` container writer, reader and validation
//! - [`io`] - Range reading and endian helpers
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use pyramid_tiler::{convert, ConvertConfig, TileSizeMode};
//!
//! let config = ConvertConfig::new("slide.tif", "slide.tpyr")
//!     .with_resolutions(4)
//!     .with_tile_size(TileSizeMode::Fixed(Default::default()));
//!
//! let summary = convert(&config).expect("conversion failed");
//! println!("{} tiles written", summary.tiles_written);
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod pyramid;
pub mod raster;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, ConvertConfig, InspectConfig};
pub use error::{
    ConfigError, DownsampleError, FormatError, IoError, PyramidError, SinkError, SourceError,
};
pub use format::{PyramidReader, PyramidWriter, TileEntry, ValidationError, ValidationResult};
pub use io::{FileRangeReader, MemoryRangeReader, RangeReader};
pub use pyramid::{
    convert, convert_source, BuildSummary, PlaneState, PyramidBuilder, PyramidConfig,
    PyramidMetadata, SeriesMetadata,
};
pub use raster::{
    open_image_file, ImageGeometry, ImageSink, ImageSource, MemorySource, PixelFormatFacts, Region,
};
pub use tile::{
    plan_grid, BoxDownsampler, DownsampleFilter, TileDescriptor, TileGrid, TileSize, TileSizeMode,
};
