//! Tile layer.
//!
//! This module holds the two pure building blocks of a pyramid: the tile-grid
//! planner and the box downsampler. Neither performs I/O or keeps state
//! between calls.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             PyramidBuilder              │
//! └──────────┬───────────────────┬──────────┘
//!            │                   │
//!            ▼                   ▼
//! ┌────────────────────┐ ┌────────────────────┐
//! │     TileGrid       │ │   BoxDownsampler   │
//! │ (origins, edge     │ │ (block mean per    │
//! │  truncation)       │ │  channel)          │
//! └────────────────────┘ └────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileGrid`]: Row-major tile enumeration for one level
//! - [`TileSize`] / [`TileSizeMode`]: Fixed tile extent or whole-image mode
//! - [`BoxDownsampler`]: Integer-factor reduction honoring the pixel format
//!
//! # Example
//!
//! ```
//! use pyramid_tiler::raster::ImageGeometry;
//! use pyramid_tiler::tile::{TileGrid, TileSize};
//!
//! let grid = TileGrid::new(ImageGeometry::new(1000, 600), TileSize::square(512).unwrap());
//!
//! assert_eq!((grid.tiles_x(), grid.tiles_y()), (2, 2));
//!
//! let corner = grid.get(1, 1).unwrap();
//! assert_eq!((corner.width, corner.height), (488, 88));
//! ```

mod downsample;
mod grid;

pub use downsample::{
    scaled_dimension, BoxDownsampler, DownsampleFilter, DownsampledBuffer, SampleType,
};
pub use grid::{
    plan_axis, plan_grid, tile_count, AxisTile, TileDescriptor, TileGrid, TileSize, TileSizeMode,
    DEFAULT_TILE_SIZE,
};
