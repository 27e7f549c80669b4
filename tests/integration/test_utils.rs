//! Test utilities for integration tests.
//!
//! This module provides a source that records every region request, a sink
//! that records every call, and helpers for synthesizing pixel data.

use std::collections::BTreeMap;

use bytes::Bytes;

use pyramid_tiler::error::{SinkError, SourceError};
use pyramid_tiler::raster::{
    ImageGeometry, ImageSink, ImageSource, MemorySource, PixelFormatFacts, Region,
};

// =============================================================================
// Tracking Source
// =============================================================================

/// One `read_region` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub series: usize,
    pub plane: usize,
    pub region: Region,
}

/// A source that delegates to a [`MemorySource`] and records every read.
///
/// `declared` optionally overrides the geometry reported for series 0, to
/// simulate a source whose metadata disagrees with its pixels.
pub struct TrackingSource {
    inner: MemorySource,
    declared: Option<ImageGeometry>,
    pub requests: Vec<ReadRequest>,
    pub closed: bool,
}

impl TrackingSource {
    pub fn new(inner: MemorySource) -> Self {
        Self {
            inner,
            declared: None,
            requests: Vec::new(),
            closed: false,
        }
    }

    pub fn declaring(mut self, geometry: ImageGeometry) -> Self {
        self.declared = Some(geometry);
        self
    }
}

impl ImageSource for TrackingSource {
    fn series_count(&self) -> usize {
        self.inner.series_count()
    }

    fn geometry(&self, series: usize) -> Result<ImageGeometry, SourceError> {
        match (series, self.declared) {
            (0, Some(geometry)) => Ok(geometry),
            _ => self.inner.geometry(series),
        }
    }

    fn plane_count(&self, series: usize) -> Result<usize, SourceError> {
        self.inner.plane_count(series)
    }

    fn pixel_format(&self) -> PixelFormatFacts {
        self.inner.pixel_format()
    }

    fn read_region(
        &mut self,
        series: usize,
        plane: usize,
        region: Region,
    ) -> Result<Bytes, SourceError> {
        self.requests.push(ReadRequest {
            series,
            plane,
            region,
        });
        self.inner.read_region(series, plane, region)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.closed = true;
        Ok(())
    }
}

// =============================================================================
// Recording Sink
// =============================================================================

/// One sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    SetSeries(usize),
    SetResolution(usize),
    WriteTile { plane: usize, region: Region },
    Close,
}

/// A written tile with its address.
#[derive(Debug, Clone)]
pub struct RecordedTile {
    pub series: usize,
    pub level: usize,
    pub plane: usize,
    pub region: Region,
    pub data: Vec<u8>,
}

/// A sink that records every call and keeps every tile in memory.
///
/// Optionally fails the n-th `write_tile` call.
#[derive(Default)]
pub struct RecordingSink {
    pub calls: Vec<SinkCall>,
    pub tiles: Vec<RecordedTile>,
    series: Option<usize>,
    level: usize,
    fail_on_write: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_write(n: usize) -> Self {
        Self {
            fail_on_write: Some(n),
            ..Self::default()
        }
    }

    /// Tiles of one (series, level, plane), in write order.
    pub fn tiles_of(&self, series: usize, level: usize, plane: usize) -> Vec<&RecordedTile> {
        self.tiles
            .iter()
            .filter(|t| t.series == series && t.level == level && t.plane == plane)
            .collect()
    }

    /// Reassemble one (series, level, plane) into a full buffer laid out per
    /// `format`.
    pub fn stitch(
        &self,
        series: usize,
        level: usize,
        plane: usize,
        geometry: ImageGeometry,
        format: &PixelFormatFacts,
    ) -> Vec<u8> {
        let mut out = vec![0u8; geometry.pixel_count() as usize * format.bytes_per_pixel()];
        // Interleaved rows hold every channel; planar rows hold one.
        let (row_channels, pixel_len) = if format.interleaved {
            (1, format.bytes_per_pixel())
        } else {
            (format.channels, format.bytes_per_sample)
        };
        for tile in self.tiles_of(series, level, plane) {
            let r = tile.region;
            let row_len = r.width as usize * pixel_len;
            for channel in 0..row_channels {
                for row in 0..r.height {
                    let src = format.sample_offset(r.width, r.height, 0, row, channel);
                    let dst = format.sample_offset(
                        geometry.width,
                        geometry.height,
                        r.x,
                        r.y + row,
                        channel,
                    );
                    out[dst..dst + row_len].copy_from_slice(&tile.data[src..src + row_len]);
                }
            }
        }
        out
    }

    /// Number of tiles per (series, level, plane).
    pub fn tile_counts(&self) -> BTreeMap<(usize, usize, usize), usize> {
        let mut counts = BTreeMap::new();
        for tile in &self.tiles {
            *counts
                .entry((tile.series, tile.level, tile.plane))
                .or_insert(0) += 1;
        }
        counts
    }
}

impl ImageSink for RecordingSink {
    fn set_series(&mut self, series: usize) -> Result<(), SinkError> {
        self.calls.push(SinkCall::SetSeries(series));
        self.series = Some(series);
        self.level = 0;
        Ok(())
    }

    fn set_resolution(&mut self, level: usize) -> Result<(), SinkError> {
        self.calls.push(SinkCall::SetResolution(level));
        self.level = level;
        Ok(())
    }

    fn write_tile(&mut self, plane: usize, buffer: &[u8], region: Region) -> Result<(), SinkError> {
        let series = self.series.ok_or(SinkError::NoSeriesSelected)?;

        if self.fail_on_write == Some(self.tiles.len()) {
            return Err(SinkError::Encode {
                message: "disk full".to_string(),
            });
        }

        self.calls.push(SinkCall::WriteTile { plane, region });
        self.tiles.push(RecordedTile {
            series,
            level: self.level,
            plane,
            region,
            data: buffer.to_vec(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.calls.push(SinkCall::Close);
        Ok(())
    }
}

// =============================================================================
// Pixel Helpers
// =============================================================================

/// 8-bit gray plane with a deterministic, non-trivial pattern.
pub fn gray_pattern(width: u32, height: u32, seed: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x * 7 + y * 13 + seed * 31) % 256) as u8))
        .collect()
}

/// 16-bit little-endian RGB plane with a deterministic pattern.
pub fn rgb16_pattern(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| {
            (0..width).flat_map(move |x| {
                let r = (x * 257 + y) as u16;
                let g = (y * 311) as u16;
                let b = ((x ^ y) * 97) as u16;
                [r, g, b].into_iter().flat_map(u16::to_le_bytes)
            })
        })
        .collect()
}

/// Single-series gray source.
pub fn gray_source(width: u32, height: u32, planes: usize) -> MemorySource {
    MemorySource::new(PixelFormatFacts::new(1, 1))
        .with_series(
            ImageGeometry::new(width, height),
            (0..planes).map(|p| gray_pattern(width, height, p as u32)),
        )
        .expect("valid gray source")
}
