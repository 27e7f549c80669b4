//! Container reader.
//!
//! Opening a container reads four things through a [`RangeReader`]: the
//! header, the trailer, the manifest and the tile index. Tile payloads are
//! fetched lazily and checked against their SHA-256 on every read.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::FormatError;
use crate::io::{FileRangeReader, RangeReader};
use crate::pyramid::PyramidMetadata;
use crate::raster::{copy_rect, ImageGeometry, Layout};

use super::header::{ContainerHeader, ContainerTrailer, HEADER_SIZE, TRAILER_SIZE};
use super::index::{TileEntry, TileKey};
use super::validation::{validate_pyramid, ValidationResult};
use super::writer::first_payload_offset;

/// Random-access reader of a `.tpyr` container.
pub struct PyramidReader<R: RangeReader> {
    reader: R,
    header: ContainerHeader,
    metadata: PyramidMetadata,
    entries: Vec<TileEntry>,
    lookup: HashMap<TileKey, usize>,
}

impl PyramidReader<FileRangeReader> {
    /// Open the container at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        Self::open(FileRangeReader::open(path)?)
    }
}

impl<R: RangeReader> PyramidReader<R> {
    /// Parse the framing, manifest and index of the container behind
    /// `reader`.
    ///
    /// # Errors
    /// - `FileTooSmall` if the file cannot hold a header and trailer
    /// - `InvalidMagic` / `UnsupportedVersion` for foreign or future files,
    ///   and for files whose writer never closed
    /// - `InvalidManifest` / `InvalidIndex` for malformed or inconsistent
    ///   JSON
    pub fn open(reader: R) -> Result<Self, FormatError> {
        let size = reader.size();
        let minimum = (HEADER_SIZE + TRAILER_SIZE) as u64;
        if size < minimum {
            return Err(FormatError::FileTooSmall {
                required: minimum,
                actual: size,
            });
        }

        let header_bytes = reader.read_exact_at(0, HEADER_SIZE)?;
        let header = ContainerHeader::parse(&header_bytes, size)?;

        let trailer_bytes = reader.read_exact_at(size - TRAILER_SIZE as u64, TRAILER_SIZE)?;
        let trailer = ContainerTrailer::parse(&trailer_bytes, size)?;

        let manifest_bytes = reader.read_exact_at(
            header.manifest_offset,
            to_len(header.manifest_len, "manifest")?,
        )?;
        let metadata: PyramidMetadata =
            serde_json::from_slice(&manifest_bytes).map_err(|e| FormatError::InvalidManifest {
                message: e.to_string(),
            })?;
        metadata
            .validate()
            .map_err(|e| FormatError::InvalidManifest {
                message: e.to_string(),
            })?;

        let index_bytes =
            reader.read_exact_at(trailer.index_offset, to_len(trailer.index_len, "index")?)?;
        let entries: Vec<TileEntry> =
            serde_json::from_slice(&index_bytes).map_err(|e| FormatError::InvalidIndex {
                message: e.to_string(),
            })?;

        let payload_start = first_payload_offset(header.manifest_len);
        let lookup = index_entries(&entries, &metadata, payload_start, trailer.index_offset)?;

        info!(
            "Opened pyramid {}: {} series, {} tiles",
            reader.identifier(),
            metadata.series_count(),
            entries.len()
        );

        Ok(Self {
            reader,
            header,
            metadata,
            entries,
            lookup,
        })
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn metadata(&self) -> &PyramidMetadata {
        &self.metadata
    }

    pub fn series_count(&self) -> usize {
        self.metadata.series_count()
    }

    /// Number of levels of `series`, base included.
    pub fn resolution_count(&self, series: usize) -> Option<usize> {
        self.metadata.resolution_count(series)
    }

    /// Geometry of `level` in `series`.
    pub fn level_dimensions(&self, series: usize, level: usize) -> Option<ImageGeometry> {
        self.metadata.level_dimensions(series, level)
    }

    /// Every index entry, in write order.
    pub fn entries(&self) -> &[TileEntry] {
        &self.entries
    }

    /// Entries of one (series, level, plane), in write order.
    pub fn tiles(
        &self,
        series: usize,
        level: usize,
        plane: usize,
    ) -> impl Iterator<Item = &TileEntry> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.series == series && e.level == level && e.plane == plane)
    }

    /// Payload of the tile whose origin is (`x`, `y`), checksum-verified.
    pub fn read_tile(
        &self,
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    ) -> Result<Bytes, FormatError> {
        let key = TileKey {
            series,
            level,
            plane,
            x,
            y,
        };
        let entry = self
            .lookup
            .get(&key)
            .map(|&i| &self.entries[i])
            .ok_or(FormatError::TileNotFound {
                series,
                level,
                plane,
                x,
                y,
            })?;
        self.read_entry(entry)
    }

    /// Payload of `entry`, checksum-verified.
    pub fn read_entry(&self, entry: &TileEntry) -> Result<Bytes, FormatError> {
        let payload = self
            .reader
            .read_exact_at(entry.offset, to_len(entry.length, "tile")?)?;

        if !entry.matches(&payload) {
            return Err(FormatError::ChecksumMismatch {
                series: entry.series,
                level: entry.level,
                plane: entry.plane,
                x: entry.x,
                y: entry.y,
            });
        }

        debug!(
            "{}: read tile ({}, {}) series {} level {} plane {}",
            self.reader.identifier(),
            entry.x,
            entry.y,
            entry.series,
            entry.level,
            entry.plane
        );
        Ok(payload)
    }

    /// Stitch every tile of one (series, level, plane) into a full level
    /// buffer.
    ///
    /// Fails with `InvalidIndex` if a tile is not a cell of the level's tile
    /// grid, has the wrong payload size, repeats a cell, or if any cell is
    /// missing.
    pub fn read_level(
        &self,
        series: usize,
        level: usize,
        plane: usize,
    ) -> Result<Bytes, FormatError> {
        let grid = self
            .metadata
            .series
            .get(series)
            .and_then(|s| s.grid(level))
            .ok_or(FormatError::TileNotFound {
                series,
                level,
                plane,
                x: 0,
                y: 0,
            })?;
        let geometry = grid.geometry();
        let format = &self.metadata.pixel_format;
        let len = format
            .buffer_len(geometry.width, geometry.height)
            .ok_or_else(|| FormatError::InvalidManifest {
                message: format!(
                    "level {}x{} does not fit in memory",
                    geometry.width, geometry.height
                ),
            })?;

        let mut out = vec![0u8; len];
        let mut cells = HashSet::with_capacity(grid.len());

        for entry in self.tiles(series, level, plane) {
            let region = entry.region();
            let expected = format.buffer_len(region.width, region.height);
            let cell = grid
                .cell(region)
                .filter(|_| expected == Some(entry.length as usize));
            let cell = match cell {
                Some(cell) if cells.insert((cell.grid_x, cell.grid_y)) => cell,
                _ => {
                    return Err(FormatError::InvalidIndex {
                        message: format!(
                            "tile {}x{} at ({}, {}) with {} bytes is not a distinct cell of \
                             level {}x{}",
                            region.width,
                            region.height,
                            region.x,
                            region.y,
                            entry.length,
                            geometry.width,
                            geometry.height
                        ),
                    })
                }
            };

            let payload = self.read_entry(entry)?;
            copy_rect(
                format,
                &payload,
                Layout {
                    width: cell.width,
                    height: cell.height,
                },
                0,
                0,
                &mut out,
                Layout {
                    width: geometry.width,
                    height: geometry.height,
                },
                cell.origin_x,
                cell.origin_y,
                cell.width,
                cell.height,
            );
        }

        if cells.len() != grid.len() {
            return Err(FormatError::InvalidIndex {
                message: format!(
                    "series {} level {} plane {}: {} of {} tiles present",
                    series,
                    level,
                    plane,
                    cells.len(),
                    grid.len()
                ),
            });
        }

        Ok(Bytes::from(out))
    }

    /// Check the index against the tile grid declared in the manifest.
    pub fn validate(&self) -> ValidationResult {
        validate_pyramid(&self.metadata, &self.entries)
    }

    /// [`validate`](Self::validate), then read every payload and verify its
    /// checksum.
    pub fn validate_payloads(&self) -> ValidationResult {
        let mut result = self.validate();
        for entry in &self.entries {
            if let Err(err) = self.read_entry(entry) {
                result.add_payload_error(entry, err);
            }
        }
        result
    }
}

fn to_len(len: u64, what: &str) -> Result<usize, FormatError> {
    usize::try_from(len).map_err(|_| FormatError::InvalidIndex {
        message: format!("{} length {} exceeds addressable memory", what, len),
    })
}

/// Build the key lookup, rejecting entries that point outside the payload
/// section, address undeclared tiles, or repeat a key.
fn index_entries(
    entries: &[TileEntry],
    metadata: &PyramidMetadata,
    payload_start: u64,
    payload_end: u64,
) -> Result<HashMap<TileKey, usize>, FormatError> {
    let mut lookup = HashMap::with_capacity(entries.len());

    for (i, entry) in entries.iter().enumerate() {
        let declared = metadata
            .series
            .get(entry.series)
            .map(|s| entry.level < s.resolution_count() && entry.plane < s.plane_count)
            .unwrap_or(false);
        if !declared {
            return Err(FormatError::InvalidIndex {
                message: format!(
                    "entry {} addresses undeclared series {} level {} plane {}",
                    i, entry.series, entry.level, entry.plane
                ),
            });
        }

        let end = entry.offset.checked_add(entry.length);
        if entry.offset < payload_start || end.map_or(true, |e| e > payload_end) {
            return Err(FormatError::InvalidIndex {
                message: format!(
                    "entry {} payload {}+{} outside {}..{}",
                    i, entry.offset, entry.length, payload_start, payload_end
                ),
            });
        }

        if lookup.insert(entry.key(), i).is_some() {
            return Err(FormatError::InvalidIndex {
                message: format!(
                    "duplicate tile ({}, {}) in series {} level {} plane {}",
                    entry.x, entry.y, entry.series, entry.level, entry.plane
                ),
            });
        }
    }

    Ok(lookup)
}
