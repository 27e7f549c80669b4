//! Streaming container writer.
//!
//! The header and manifest are written as soon as the writer is created, so
//! the full pyramid geometry is declared before any pixel data. Tile payloads
//! are appended as they arrive; the index and trailer are only written by a
//! successful [`close`](ImageSink::close), so an aborted conversion never
//! produces a file readers accept.
//!
//! Every tile must be exactly one cell of its level's tile grid, and each
//! cell may be written once.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{IoError, SinkError};
use crate::pyramid::PyramidMetadata;
use crate::raster::{ImageSink, Region};
use crate::tile::TileGrid;

use super::header::{ContainerHeader, ContainerTrailer, HEADER_SIZE};
use super::index::{digest, TileEntry, TileKey};

/// [`ImageSink`] producing a `.tpyr` container.
pub struct PyramidWriter<W: Write> {
    out: W,
    identifier: String,
    metadata: PyramidMetadata,

    /// Bytes written so far, i.e. the offset of the next payload
    position: u64,

    entries: Vec<TileEntry>,
    written: HashSet<TileKey>,

    /// Pixels written per (series, level, plane)
    coverage: HashMap<(usize, usize, usize), u64>,

    series: Option<usize>,
    level: usize,

    /// Tile grid of the current (series, level)
    grid: Option<TileGrid>,

    closed: bool,
}

impl PyramidWriter<BufWriter<File>> {
    /// Create the file at `path` and declare `metadata`.
    pub fn create(path: impl AsRef<Path>, metadata: PyramidMetadata) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SinkError::Io(IoError::from_io(path, e)))?;
        Self::new(BufWriter::new(file), path.display().to_string(), metadata)
    }
}

impl<W: Write> PyramidWriter<W> {
    /// Start a container on `out`, writing the header and manifest.
    pub fn new(
        out: W,
        identifier: impl Into<String>,
        metadata: PyramidMetadata,
    ) -> Result<Self, SinkError> {
        metadata.validate()?;

        let manifest = serde_json::to_vec(&metadata).map_err(|e| SinkError::Encode {
            message: format!("manifest: {}", e),
        })?;

        let mut writer = Self {
            out,
            identifier: identifier.into(),
            metadata,
            position: 0,
            entries: Vec::new(),
            written: HashSet::new(),
            coverage: HashMap::new(),
            series: None,
            level: 0,
            grid: None,
            closed: false,
        };

        writer.emit(&ContainerHeader::new(manifest.len() as u64).to_bytes())?;
        writer.emit(&manifest)?;

        info!(
            "Created pyramid {}: {} series, manifest {} bytes",
            writer.identifier,
            writer.metadata.series_count(),
            manifest.len()
        );

        Ok(writer)
    }

    pub fn metadata(&self) -> &PyramidMetadata {
        &self.metadata
    }

    /// Index entries of the tiles written so far.
    pub fn entries(&self) -> &[TileEntry] {
        &self.entries
    }

    /// Consume the writer, returning the underlying output.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.out
            .write_all(bytes)
            .map_err(|e| SinkError::Io(IoError::from_io(&self.identifier, e)))?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.closed {
            Err(SinkError::Closed)
        } else {
            Ok(())
        }
    }

    /// Check that every declared (series, level, plane) is fully covered.
    ///
    /// Tiles are distinct grid cells, so a full area means every cell was
    /// written.
    fn check_complete(&self) -> Result<(), SinkError> {
        for (series, meta) in self.metadata.series.iter().enumerate() {
            for (level, geometry) in meta.levels.iter().enumerate() {
                for plane in 0..meta.plane_count {
                    let written = self
                        .coverage
                        .get(&(series, level, plane))
                        .copied()
                        .unwrap_or(0);
                    let expected = geometry.pixel_count();
                    if written != expected {
                        return Err(SinkError::Incomplete {
                            series,
                            level,
                            plane,
                            written,
                            expected,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl<W: Write> ImageSink for PyramidWriter<W> {
    fn set_series(&mut self, series: usize) -> Result<(), SinkError> {
        self.ensure_open()?;
        let count = self.metadata.series_count();
        if series >= count {
            return Err(SinkError::UndeclaredSeries { series, count });
        }
        self.series = Some(series);
        self.level = 0;
        self.grid = self.metadata.series[series].grid(0);
        Ok(())
    }

    fn set_resolution(&mut self, level: usize) -> Result<(), SinkError> {
        self.ensure_open()?;
        let series = self.series.ok_or(SinkError::NoSeriesSelected)?;
        let count = self.metadata.series[series].resolution_count();
        if level >= count {
            return Err(SinkError::UndeclaredResolution {
                series,
                level,
                count,
            });
        }
        self.level = level;
        self.grid = self.metadata.series[series].grid(level);
        Ok(())
    }

    fn write_tile(&mut self, plane: usize, buffer: &[u8], region: Region) -> Result<(), SinkError> {
        self.ensure_open()?;
        let series = self.series.ok_or(SinkError::NoSeriesSelected)?;
        let level = self.level;
        let meta = &self.metadata.series[series];

        if plane >= meta.plane_count {
            return Err(SinkError::InvalidPlane {
                series,
                plane,
                count: meta.plane_count,
            });
        }

        let geometry = meta.levels[level];
        if region.geometry().is_empty() || !region.fits_within(geometry) {
            return Err(SinkError::TileOutOfBounds {
                series,
                level,
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                level_width: geometry.width,
                level_height: geometry.height,
            });
        }

        if self.grid.as_ref().and_then(|g| g.cell(region)).is_none() {
            return Err(SinkError::OffGrid {
                series,
                level,
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
            });
        }

        // Fits within a u32 geometry, so the area is representable.
        let expected = self
            .metadata
            .pixel_format
            .buffer_len(region.width, region.height)
            .unwrap_or(usize::MAX);
        if buffer.len() != expected {
            return Err(SinkError::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        let key = TileKey {
            series,
            level,
            plane,
            x: region.x,
            y: region.y,
        };
        if !self.written.insert(key) {
            return Err(SinkError::DuplicateTile {
                series,
                level,
                plane,
                x: region.x,
                y: region.y,
            });
        }

        let offset = self.position;
        self.emit(buffer)?;

        self.entries.push(TileEntry {
            series,
            level,
            plane,
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
            offset,
            length: buffer.len() as u64,
            sha256: digest(buffer),
        });
        *self.coverage.entry((series, level, plane)).or_insert(0) += region.pixel_count();

        debug!(
            "{}: tile {}x{} at ({}, {}) series {} level {} plane {} -> offset {}",
            self.identifier,
            region.width,
            region.height,
            region.x,
            region.y,
            series,
            level,
            plane,
            offset
        );

        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.closed = true;

        self.check_complete()?;

        let index = serde_json::to_vec(&self.entries).map_err(|e| SinkError::Encode {
            message: format!("tile index: {}", e),
        })?;

        let trailer = ContainerTrailer {
            index_offset: self.position,
            index_len: index.len() as u64,
        };
        self.emit(&index)?;
        self.emit(&trailer.to_bytes())?;
        self.out
            .flush()
            .map_err(|e| SinkError::Io(IoError::from_io(&self.identifier, e)))?;

        info!(
            "Closed pyramid {}: {} tiles, {} bytes",
            self.identifier,
            self.entries.len(),
            self.position
        );
        Ok(())
    }
}

/// Offset of the first tile payload for a manifest of `manifest_len` bytes.
pub fn first_payload_offset(manifest_len: u64) -> u64 {
    HEADER_SIZE as u64 + manifest_len
}
