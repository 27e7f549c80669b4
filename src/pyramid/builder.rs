//! Pyramid build orchestration.
//!
//! The builder walks series, then planes, then levels, then tiles, and drives
//! the source and sink through their narrow contracts. It is the only
//! component that keeps state across calls, and that state lives in a single
//! [`PlaneState`] per plane.
//!
//! # Per-Plane State Machine
//!
//! ```text
//! WritingBase ──▶ WritingLevel(1) ──▶ … ──▶ WritingLevel(n) ──▶ Done
//! ```
//!
//! - **WritingBase**: every base tile is read and written unchanged.
//! - **WritingLevel(k)**: every tile of level `k` is read at full resolution
//!   (`scale^k` times larger), downsampled by `scale^k`, and written at its
//!   level coordinates.
//!
//! Whole-image pyramids are the same machine with a tile size equal to the
//! base geometry.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::{ConfigError, PyramidError};
use crate::raster::{ImageGeometry, ImageSink, ImageSource, PixelFormatFacts, Region};
use crate::tile::{BoxDownsampler, TileDescriptor, TileGrid, TileSize};

use super::metadata::{level_scale, PyramidConfig, PyramidMetadata, SeriesMetadata};

// =============================================================================
// PlaneState
// =============================================================================

/// Progress of one plane through its levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneState {
    WritingBase,
    WritingLevel(usize),
    Done,
}

impl PlaneState {
    /// Advance once `self` is finished, for a pyramid with `resolutions`
    /// levels below the base.
    pub fn next(self, resolutions: usize) -> Self {
        match self {
            PlaneState::WritingBase if resolutions == 0 => PlaneState::Done,
            PlaneState::WritingBase => PlaneState::WritingLevel(1),
            PlaneState::WritingLevel(level) if level < resolutions => {
                PlaneState::WritingLevel(level + 1)
            }
            PlaneState::WritingLevel(_) | PlaneState::Done => PlaneState::Done,
        }
    }

    /// Level being written, if any.
    pub fn level(self) -> Option<usize> {
        match self {
            PlaneState::WritingBase => Some(0),
            PlaneState::WritingLevel(level) => Some(level),
            PlaneState::Done => None,
        }
    }
}

// =============================================================================
// BuildSummary
// =============================================================================

/// Counters reported after a successful build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Series processed
    pub series: usize,

    /// Planes processed across all series
    pub planes: usize,

    /// Level passes, one per (series, plane, level)
    pub levels: usize,

    /// Tiles handed to the sink
    pub tiles_written: u64,

    /// Full-resolution pixels read from the source
    pub pixels_read: u64,
}

// =============================================================================
// PyramidBuilder
// =============================================================================

/// Sequential pyramid builder.
///
/// # Example
///
/// ```ignore
/// let builder = PyramidBuilder::new(config)?;
/// let metadata = builder.plan(&source)?;
/// let mut writer = PyramidWriter::create(output, metadata.clone())?;
/// let summary = builder.build(&mut source, &mut writer, &metadata)?;
/// writer.close()?;
/// ```
#[derive(Debug, Clone)]
pub struct PyramidBuilder {
    config: PyramidConfig,
    downsampler: BoxDownsampler,
}

impl PyramidBuilder {
    /// Create a builder, rejecting invalid parameters.
    pub fn new(config: PyramidConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let downsampler = BoxDownsampler::with_filter(config.filter);
        Ok(Self {
            config,
            downsampler,
        })
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Plan the metadata to declare to the sink for `source`.
    pub fn plan<S: ImageSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<PyramidMetadata, PyramidError> {
        PyramidMetadata::plan(source, &self.config)
    }

    /// Write every tile of every level of every plane of every series.
    ///
    /// `metadata` must be what was declared to `sink`, planned from `source`.
    /// The first failure aborts the build.
    pub fn build<S, K>(
        &self,
        source: &mut S,
        sink: &mut K,
        metadata: &PyramidMetadata,
    ) -> Result<BuildSummary, PyramidError>
    where
        S: ImageSource + ?Sized,
        K: ImageSink + ?Sized,
    {
        metadata.validate()?;

        let start = Instant::now();
        let mut summary = BuildSummary::default();

        for (series_index, series) in metadata.series.iter().enumerate() {
            let tile_size = series.tile_size().ok_or(ConfigError::ZeroTileSize {
                x: series.tile_width,
                y: series.tile_height,
            })?;
            let resolutions = series.resolution_count().saturating_sub(1);

            info!(
                "Series {}: {} planes, {} levels, tile {}",
                series_index,
                series.plane_count,
                series.resolution_count(),
                tile_size
            );

            sink.set_series(series_index)?;

            for plane in 0..series.plane_count {
                let mut state = PlaneState::WritingBase;
                while let Some(level) = state.level() {
                    sink.set_resolution(level)?;

                    let mut pass = LevelPass {
                        series: series_index,
                        plane,
                        level,
                        format: &metadata.pixel_format,
                        summary: &mut summary,
                    };
                    match state {
                        PlaneState::WritingBase => {
                            pass.write_base(source, sink, series, tile_size)?
                        }
                        _ => pass.write_level(
                            source,
                            sink,
                            series,
                            tile_size,
                            metadata.scale_factor,
                            &self.downsampler,
                        )?,
                    }

                    summary.levels += 1;
                    state = state.next(resolutions);
                }
                summary.planes += 1;
            }
            summary.series += 1;
        }

        info!(
            "Pyramid built: {} series, {} planes, {} tiles in {:.2?}",
            summary.series,
            summary.planes,
            summary.tiles_written,
            start.elapsed()
        );

        Ok(summary)
    }
}

/// One (series, plane, level) pass.
struct LevelPass<'a> {
    series: usize,
    plane: usize,
    level: usize,
    format: &'a PixelFormatFacts,
    summary: &'a mut BuildSummary,
}

impl LevelPass<'_> {
    fn write_base<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        series: &SeriesMetadata,
        tile_size: TileSize,
    ) -> Result<(), PyramidError>
    where
        S: ImageSource + ?Sized,
        K: ImageSink + ?Sized,
    {
        let base = series.levels[0];
        let grid = TileGrid::new(base, tile_size);
        info!(
            "Series {} plane {}: writing base {}x{} as {} tiles",
            self.series,
            self.plane,
            base.width,
            base.height,
            grid.len()
        );

        for tile in grid.iter() {
            let region = tile.region();
            let buffer = source.read_region(self.series, self.plane, region)?;
            self.summary.pixels_read += region.pixel_count();

            sink.write_tile(self.plane, &buffer, region)?;
            self.summary.tiles_written += 1;
            self.trace(&tile);
        }
        Ok(())
    }

    fn write_level<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        series: &SeriesMetadata,
        tile_size: TileSize,
        scale_factor: u32,
        downsampler: &BoxDownsampler,
    ) -> Result<(), PyramidError>
    where
        S: ImageSource + ?Sized,
        K: ImageSink + ?Sized,
    {
        let base = series.levels[0];
        let geometry = series.levels[self.level];
        let scale = level_scale(scale_factor, self.level)?;
        let grid = TileGrid::new(geometry, tile_size);
        info!(
            "Series {} plane {}: writing level {} ({}x{}, 1/{}) as {} tiles",
            self.series,
            self.plane,
            self.level,
            geometry.width,
            geometry.height,
            scale,
            grid.len()
        );

        for tile in grid.iter() {
            let source_region = source_region(&tile, scale, base);
            let buffer = source.read_region(self.series, self.plane, source_region)?;
            self.summary.pixels_read += source_region.pixel_count();

            let reduced = downsampler.downsample(
                &buffer,
                source_region.width,
                source_region.height,
                scale,
                self.format,
            )?;

            let region = Region::new(tile.origin_x, tile.origin_y, reduced.width, reduced.height);
            sink.write_tile(self.plane, &reduced.data, region)?;
            self.summary.tiles_written += 1;
            self.trace(&tile);
        }
        Ok(())
    }

    fn trace(&self, tile: &TileDescriptor) {
        debug!(
            "Series {} plane {} level {}: tile ({}, {}) {}x{} at ({}, {})",
            self.series,
            self.plane,
            self.level,
            tile.grid_x,
            tile.grid_y,
            tile.width,
            tile.height,
            tile.origin_x,
            tile.origin_y
        );
    }
}

/// Full-resolution rectangle behind a level tile, clamped to the base.
///
/// For levels planned as `floor(base / scale)` the clamp never cuts anything:
/// `(origin + size) * scale <= level_size * scale <= base_size`. The
/// downsampled result therefore always matches the level tile exactly.
pub fn source_region(tile: &TileDescriptor, scale: u32, base: ImageGeometry) -> Region {
    let span = |origin: u32, size: u32, limit: u32| {
        let start = (origin as u64 * scale as u64).min(limit as u64);
        let end = ((origin as u64 + size as u64) * scale as u64).min(limit as u64);
        // Both are clamped to a u32 limit.
        (start as u32, (end - start) as u32)
    };

    let (x, width) = span(tile.origin_x, tile.width, base.width);
    let (y, height) = span(tile.origin_y, tile.height, base.height);
    Region::new(x, y, width, height)
}
