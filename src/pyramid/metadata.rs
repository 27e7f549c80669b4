//! Pyramid planning.
//!
//! Everything a sink must know before the first tile is written: pixel format,
//! scale factor, tile size and the geometry of every level of every series.
//!
//! # Level Geometry
//!
//! Level `k` of a series with base geometry `W x H` measures
//! `floor(W / scale^k) x floor(H / scale^k)`. Levels are computed from the
//! base, never from the previous level, so truncation errors do not
//! accumulate.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, PyramidError, SourceError};
use crate::raster::{ImageGeometry, ImageSource, PixelFormatFacts};
use crate::tile::{DownsampleFilter, SampleType, TileGrid, TileSize, TileSizeMode};

/// Default scale factor between consecutive levels.
pub const DEFAULT_SCALE_FACTOR: u32 = 2;

// =============================================================================
// PyramidConfig
// =============================================================================

/// Immutable conversion parameters consumed by the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Number of levels generated below the base (0 writes the base only)
    pub resolutions: usize,

    /// Integer reduction between consecutive levels
    pub scale_factor: u32,

    /// Tile extent, or the whole image per series
    pub tile_size: TileSizeMode,

    /// Block reduction used for levels above the base
    pub filter: DownsampleFilter,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            resolutions: 0,
            scale_factor: DEFAULT_SCALE_FACTOR,
            tile_size: TileSizeMode::default(),
            filter: DownsampleFilter::default(),
        }
    }
}

impl PyramidConfig {
    pub fn new(resolutions: usize, scale_factor: u32, tile_size: TileSizeMode) -> Self {
        Self {
            resolutions,
            scale_factor,
            tile_size,
            filter: DownsampleFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: DownsampleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Check the parameters that do not depend on the image.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scale_factor < 2 {
            return Err(ConfigError::InvalidScaleFactor(self.scale_factor));
        }
        // Fails early for pyramids too deep to address at all.
        level_scale(self.scale_factor, self.resolutions)?;
        Ok(())
    }
}

/// `scale^level`, the reduction of `level` relative to the base.
pub fn level_scale(scale: u32, level: usize) -> Result<u32, ConfigError> {
    u32::try_from(level)
        .ok()
        .and_then(|exp| scale.checked_pow(exp))
        .ok_or(ConfigError::ScaleOverflow { scale, level })
}

/// Geometry of `level` for a series whose base is `base`.
///
/// May be empty; callers decide whether that is an error.
pub fn level_geometry(
    base: ImageGeometry,
    scale: u32,
    level: usize,
) -> Result<ImageGeometry, ConfigError> {
    let factor = level_scale(scale, level)?;
    Ok(ImageGeometry::new(base.width / factor, base.height / factor))
}

// =============================================================================
// Metadata
// =============================================================================

/// Declared layout of one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    /// Number of planes, each pyramided independently
    pub plane_count: usize,

    /// Tile width used at every level
    pub tile_width: u32,

    /// Tile height used at every level
    pub tile_height: u32,

    /// Level geometries, base first
    pub levels: Vec<ImageGeometry>,
}

impl SeriesMetadata {
    /// Tile size, or `None` if a declared dimension is zero.
    pub fn tile_size(&self) -> Option<TileSize> {
        TileSize::new(self.tile_width, self.tile_height).ok()
    }

    /// Full-resolution geometry.
    pub fn base(&self) -> Option<ImageGeometry> {
        self.levels.first().copied()
    }

    /// Number of levels including the base.
    pub fn resolution_count(&self) -> usize {
        self.levels.len()
    }

    /// Tile grid of `level`.
    pub fn grid(&self, level: usize) -> Option<TileGrid> {
        let geometry = *self.levels.get(level)?;
        Some(TileGrid::new(geometry, self.tile_size()?))
    }
}

/// Per-series, per-level geometry declared to the sink before pixel data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidMetadata {
    /// Pixel format shared by every tile
    pub pixel_format: PixelFormatFacts,

    /// Reduction between consecutive levels
    pub scale_factor: u32,

    /// One entry per series, in source order
    pub series: Vec<SeriesMetadata>,
}

impl PyramidMetadata {
    /// Plan the pyramid for `source` under `config`.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the parameters are invalid, the source is empty,
    ///   or a level would collapse to zero pixels
    /// - `SourceError` if the source cannot report its layout
    /// - `DownsampleError` if reductions are requested for a sample encoding
    ///   the box filter cannot decode
    pub fn plan<S: ImageSource + ?Sized>(
        source: &S,
        config: &PyramidConfig,
    ) -> Result<Self, PyramidError> {
        config.validate()?;

        let series_count = source.series_count();
        if series_count == 0 {
            return Err(ConfigError::EmptySource.into());
        }
        if config.resolutions > 0 {
            SampleType::from_format(&source.pixel_format())?;
        }

        let mut series = Vec::with_capacity(series_count);
        for index in 0..series_count {
            let base = source.geometry(index)?;
            let tile_size =
                config
                    .tile_size
                    .resolve(base)
                    .ok_or(SourceError::InvalidGeometry {
                        series: index,
                        width: base.width,
                        height: base.height,
                    })?;

            if matches!(config.tile_size, TileSizeMode::Fixed(_))
                && tile_size.x() >= base.width
                && tile_size.y() >= base.height
            {
                warn!(
                    "Series {}: tile size {} covers the whole {}x{} image",
                    index, tile_size, base.width, base.height
                );
            }

            let mut levels = Vec::with_capacity(config.resolutions + 1);
            for level in 0..=config.resolutions {
                let geometry = level_geometry(base, config.scale_factor, level)?;
                if geometry.is_empty() {
                    return Err(ConfigError::LevelTooSmall {
                        series: index,
                        level,
                        width: geometry.width,
                        height: geometry.height,
                    }
                    .into());
                }
                levels.push(geometry);
            }

            let plane_count = source.plane_count(index)?;
            debug!(
                "Series {}: {} levels, tile {}, {} planes",
                index,
                levels.len(),
                tile_size,
                plane_count
            );

            series.push(SeriesMetadata {
                plane_count,
                tile_width: tile_size.x(),
                tile_height: tile_size.y(),
                levels,
            });
        }

        Ok(Self {
            pixel_format: source.pixel_format(),
            scale_factor: config.scale_factor,
            series,
        })
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Number of levels of `series`, base included.
    pub fn resolution_count(&self, series: usize) -> Option<usize> {
        self.series.get(series).map(SeriesMetadata::resolution_count)
    }

    /// Geometry of `level` in `series`.
    pub fn level_dimensions(&self, series: usize, level: usize) -> Option<ImageGeometry> {
        self.series.get(series)?.levels.get(level).copied()
    }

    /// Check internal consistency: scale factor, tile sizes, and level
    /// geometries that follow `floor(base / scale^level)` without collapsing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scale_factor < 2 {
            return Err(ConfigError::InvalidScaleFactor(self.scale_factor));
        }
        if self.series.is_empty() {
            return Err(ConfigError::EmptySource);
        }

        for (index, series) in self.series.iter().enumerate() {
            TileSize::new(series.tile_width, series.tile_height)?;
            let base = series.base().ok_or(ConfigError::NoLevels(index))?;

            for (level, geometry) in series.levels.iter().enumerate() {
                if geometry.is_empty() {
                    return Err(ConfigError::LevelTooSmall {
                        series: index,
                        level,
                        width: geometry.width,
                        height: geometry.height,
                    });
                }
                let expected = level_geometry(base, self.scale_factor, level)?;
                if *geometry != expected {
                    return Err(ConfigError::LevelGeometryMismatch {
                        series: index,
                        level,
                        width: geometry.width,
                        height: geometry.height,
                        expected_width: expected.width,
                        expected_height: expected.height,
                    });
                }
            }
        }
        Ok(())
    }
}
