//! Tile grid planning.
//!
//! Every piece of edge-tile arithmetic in the crate goes through this module.
//! A dimension is covered by `ceil(dim / tile)` tiles; all tiles have the
//! requested size except the last one, which is truncated at the image edge.
//!
//! ```text
//!  dim = 1000, tile = 512
//!  ┌──────────────────────────┬────────────────────────┐
//!  │ origin 0, size 512       │ origin 512, size 488   │
//!  └──────────────────────────┴────────────────────────┘
//! ```

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::raster::{ImageGeometry, Region};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

// =============================================================================
// TileSize
// =============================================================================

/// Tile extent in pixels. Both dimensions are guaranteed non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileSize {
    x: NonZeroU32,
    y: NonZeroU32,
}

impl TileSize {
    /// Create a tile size, rejecting zero dimensions.
    pub fn new(x: u32, y: u32) -> Result<Self, ConfigError> {
        match (NonZeroU32::new(x), NonZeroU32::new(y)) {
            (Some(x), Some(y)) => Ok(Self { x, y }),
            _ => Err(ConfigError::ZeroTileSize { x, y }),
        }
    }

    /// Square tile size.
    pub fn square(size: u32) -> Result<Self, ConfigError> {
        Self::new(size, size)
    }

    #[inline]
    pub fn x(&self) -> u32 {
        self.x.get()
    }

    #[inline]
    pub fn y(&self) -> u32 {
        self.y.get()
    }
}

impl Default for TileSize {
    fn default() -> Self {
        let size = NonZeroU32::new(DEFAULT_TILE_SIZE).unwrap_or(NonZeroU32::MIN);
        Self { x: size, y: size }
    }
}

impl fmt::Display for TileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

// =============================================================================
// TileSizeMode
// =============================================================================

/// Configured tile size: a fixed extent, or the whole base image.
///
/// Whole-image mode writes every level as a single tile and downsamples the
/// entire plane in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSizeMode {
    Fixed(TileSize),
    WholeImage,
}

impl TileSizeMode {
    /// Concrete tile size for a series with the given base geometry.
    ///
    /// Returns `None` for whole-image mode over an empty geometry.
    pub fn resolve(&self, base: ImageGeometry) -> Option<TileSize> {
        match self {
            TileSizeMode::Fixed(size) => Some(*size),
            TileSizeMode::WholeImage => TileSize::new(base.width, base.height).ok(),
        }
    }
}

impl Default for TileSizeMode {
    fn default() -> Self {
        TileSizeMode::Fixed(TileSize::default())
    }
}

impl fmt::Display for TileSizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileSizeMode::Fixed(size) => write!(f, "{}", size),
            TileSizeMode::WholeImage => write!(f, "whole"),
        }
    }
}

impl FromStr for TileSizeMode {
    type Err = ConfigError;

    /// Parse `"512"`, `"512x256"` or `"whole"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("whole") || s.eq_ignore_ascii_case("whole-image") {
            return Ok(TileSizeMode::WholeImage);
        }

        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidTileSize(s.to_string()))
        };

        let size = match s.split_once(['x', 'X']) {
            Some((x, y)) => TileSize::new(parse(x)?, parse(y)?)?,
            None => TileSize::square(parse(s)?)?,
        };

        Ok(TileSizeMode::Fixed(size))
    }
}

// =============================================================================
// Axis Planning
// =============================================================================

/// One tile along a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTile {
    /// Tile index along the axis
    pub index: u32,

    /// Pixel offset of the tile
    pub origin: u32,

    /// Effective extent, truncated at the edge
    pub size: u32,
}

/// Number of tiles of `tile_size` needed to cover `dim_size`.
#[inline]
pub fn tile_count(dim_size: u32, tile_size: NonZeroU32) -> u32 {
    let tile_size = tile_size.get();
    let count = dim_size / tile_size;
    // count * tile_size <= dim_size, so this cannot overflow
    if count * tile_size != dim_size {
        count + 1
    } else {
        count
    }
}

/// Plan the tiles covering `[0, dim_size)` along one axis.
///
/// The result partitions the range exactly: consecutive tiles touch, no two
/// overlap, and the last one ends at `dim_size`.
pub fn plan_axis(dim_size: u32, tile_size: NonZeroU32) -> Vec<AxisTile> {
    let step = tile_size.get();
    (0..tile_count(dim_size, tile_size))
        .map(|index| {
            let origin = index * step;
            AxisTile {
                index,
                origin,
                size: step.min(dim_size - origin),
            }
        })
        .collect()
}

// =============================================================================
// TileDescriptor
// =============================================================================

/// A single tile of a 2-D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileDescriptor {
    pub grid_x: u32,
    pub grid_y: u32,
    pub origin_x: u32,
    pub origin_y: u32,
    /// Effective width, at most the tile width
    pub width: u32,
    /// Effective height, at most the tile height
    pub height: u32,
}

impl TileDescriptor {
    /// Pixel rectangle covered by this tile.
    pub fn region(&self) -> Region {
        Region::new(self.origin_x, self.origin_y, self.width, self.height)
    }
}

// =============================================================================
// TileGrid
// =============================================================================

/// The tile grid covering one image at one tile size.
///
/// Tiles are enumerated row-major (Y outer, X inner).
#[derive(Debug, Clone)]
pub struct TileGrid {
    geometry: ImageGeometry,
    tile_size: TileSize,
    columns: Vec<AxisTile>,
    rows: Vec<AxisTile>,
}

impl TileGrid {
    pub fn new(geometry: ImageGeometry, tile_size: TileSize) -> Self {
        Self {
            geometry,
            tile_size,
            columns: plan_axis(geometry.width, tile_size.x),
            rows: plan_axis(geometry.height, tile_size.y),
        }
    }

    pub fn geometry(&self) -> ImageGeometry {
        self.geometry
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    /// Number of tiles in X direction.
    pub fn tiles_x(&self) -> u32 {
        self.columns.len() as u32
    }

    /// Number of tiles in Y direction.
    pub fn tiles_y(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Total number of tiles.
    pub fn len(&self) -> usize {
        self.columns.len() * self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile at grid position (`grid_x`, `grid_y`), or `None` if out of range.
    pub fn get(&self, grid_x: u32, grid_y: u32) -> Option<TileDescriptor> {
        let column = self.columns.get(grid_x as usize)?;
        let row = self.rows.get(grid_y as usize)?;
        Some(Self::descriptor(column, row))
    }

    /// The tile whose rectangle is exactly `region`, or `None` if `region` is
    /// not a cell of this grid.
    pub fn cell(&self, region: Region) -> Option<TileDescriptor> {
        let (tile_x, tile_y) = (self.tile_size.x(), self.tile_size.y());
        if region.x % tile_x != 0 || region.y % tile_y != 0 {
            return None;
        }
        self.get(region.x / tile_x, region.y / tile_y)
            .filter(|tile| tile.region() == region)
    }

    /// Iterate over all tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = TileDescriptor> + '_ {
        self.rows.iter().flat_map(move |row| {
            self.columns
                .iter()
                .map(move |column| Self::descriptor(column, row))
        })
    }

    fn descriptor(column: &AxisTile, row: &AxisTile) -> TileDescriptor {
        TileDescriptor {
            grid_x: column.index,
            grid_y: row.index,
            origin_x: column.origin,
            origin_y: row.origin,
            width: column.size,
            height: row.size,
        }
    }
}

/// Plan the full 2-D grid for `geometry`, row-major.
pub fn plan_grid(geometry: ImageGeometry, tile_size: TileSize) -> Vec<TileDescriptor> {
    TileGrid::new(geometry, tile_size).iter().collect()
}
