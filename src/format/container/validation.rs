//! Pyramid container validation.
//!
//! Checks a container's tile index against the tile grids implied by its
//! manifest. A valid container holds exactly one tile per grid cell of every
//! (series, level, plane), each with the planned extent and a payload of the
//! matching size.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::error::FormatError;
use crate::pyramid::PyramidMetadata;

use super::index::TileEntry;

// =============================================================================
// Validation Result
// =============================================================================

/// Result of validating a pyramid container.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the container is complete and consistent
    pub is_valid: bool,

    /// List of validation errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// List of validation warnings (non-fatal issues)
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Create a successful validation result.
    pub fn ok() -> Self {
        ValidationResult {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Record a failed payload read for `entry`.
    pub fn add_payload_error(&mut self, entry: &TileEntry, error: FormatError) {
        let error = match error {
            FormatError::ChecksumMismatch { .. } => ValidationError::ChecksumMismatch {
                series: entry.series,
                level: entry.level,
                plane: entry.plane,
                x: entry.x,
                y: entry.y,
            },
            other => ValidationError::UnreadablePayload {
                series: entry.series,
                level: entry.level,
                plane: entry.plane,
                x: entry.x,
                y: entry.y,
                message: other.to_string(),
            },
        };
        self.add_error(error);
    }

    /// Convert to a `FormatError` if invalid.
    ///
    /// Returns the first error, or `Ok(())` if valid.
    pub fn into_result(self) -> Result<(), FormatError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(FormatError::InvalidIndex {
                message: error.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// A specific validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Grid cell with no stored tile
    #[error("Missing tile at ({x}, {y}) in series {series}, level {level}, plane {plane}")]
    MissingTile {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    },

    /// Tile whose origin is not a grid cell origin
    #[error("Tile at ({x}, {y}) in series {series}, level {level}, plane {plane} is not on the tile grid")]
    UnexpectedTile {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    },

    /// Tile leaving its level
    #[error(
        "Tile {width}x{height} at ({x}, {y}) in series {series}, level {level}, plane {plane} \
         exceeds the level"
    )]
    OutOfBounds {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Tile whose extent differs from its grid cell, leaving a gap or an
    /// overlap with its neighbours
    #[error(
        "Tile at ({x}, {y}) in series {series}, level {level}, plane {plane} is {width}x{height}, \
         expected {expected_width}x{expected_height}"
    )]
    ExtentMismatch {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// Payload length disagrees with the tile extent
    #[error(
        "Tile at ({x}, {y}) in series {series}, level {level}, plane {plane} has {actual} bytes, \
         expected {expected}"
    )]
    PayloadSizeMismatch {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
        expected: u64,
        actual: u64,
    },

    /// Payload does not hash to its recorded digest
    #[error("Checksum mismatch for tile at ({x}, {y}) in series {series}, level {level}, plane {plane}")]
    ChecksumMismatch {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    },

    /// Payload could not be read
    #[error("Cannot read tile at ({x}, {y}) in series {series}, level {level}, plane {plane}: {message}")]
    UnreadablePayload {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
        message: String,
    },
}

// =============================================================================
// Pyramid Validation
// =============================================================================

/// Validate `entries` against the grids declared by `metadata`.
///
/// `metadata` is expected to have passed [`PyramidMetadata::validate`].
pub fn validate_pyramid(metadata: &PyramidMetadata, entries: &[TileEntry]) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let mut groups: BTreeMap<(usize, usize, usize), Vec<&TileEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry((entry.series, entry.level, entry.plane))
            .or_default()
            .push(entry);
    }

    for (series, meta) in metadata.series.iter().enumerate() {
        for level in 0..meta.resolution_count() {
            let Some(grid) = meta.grid(level) else {
                continue;
            };
            let geometry = grid.geometry();
            let tile_size = grid.tile_size();

            for plane in 0..meta.plane_count {
                let tiles = groups
                    .get(&(series, level, plane))
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let mut present = HashSet::with_capacity(tiles.len());
                let mut previous: Option<(u32, u32)> = None;
                let mut out_of_order = false;

                for entry in tiles {
                    let region = entry.region();
                    if !region.fits_within(geometry) {
                        result.add_error(ValidationError::OutOfBounds {
                            series,
                            level,
                            plane,
                            x: entry.x,
                            y: entry.y,
                            width: entry.width,
                            height: entry.height,
                        });
                        continue;
                    }

                    let on_grid = entry.x % tile_size.x() == 0 && entry.y % tile_size.y() == 0;
                    let cell = on_grid
                        .then(|| grid.get(entry.x / tile_size.x(), entry.y / tile_size.y()))
                        .flatten();
                    let Some(cell) = cell else {
                        result.add_error(ValidationError::UnexpectedTile {
                            series,
                            level,
                            plane,
                            x: entry.x,
                            y: entry.y,
                        });
                        continue;
                    };

                    if (cell.width, cell.height) != (entry.width, entry.height) {
                        result.add_error(ValidationError::ExtentMismatch {
                            series,
                            level,
                            plane,
                            x: entry.x,
                            y: entry.y,
                            width: entry.width,
                            height: entry.height,
                            expected_width: cell.width,
                            expected_height: cell.height,
                        });
                    }

                    let expected = metadata
                        .pixel_format
                        .buffer_len(entry.width, entry.height)
                        .map(|len| len as u64);
                    if expected != Some(entry.length) {
                        result.add_error(ValidationError::PayloadSizeMismatch {
                            series,
                            level,
                            plane,
                            x: entry.x,
                            y: entry.y,
                            expected: expected.unwrap_or(u64::MAX),
                            actual: entry.length,
                        });
                    }

                    if let Some(prev) = previous {
                        if (entry.y, entry.x) < (prev.1, prev.0) {
                            out_of_order = true;
                        }
                    }
                    previous = Some((entry.x, entry.y));
                    present.insert((entry.x, entry.y));
                }

                for cell in grid.iter() {
                    if !present.contains(&(cell.origin_x, cell.origin_y)) {
                        result.add_error(ValidationError::MissingTile {
                            series,
                            level,
                            plane,
                            x: cell.origin_x,
                            y: cell.origin_y,
                        });
                    }
                }

                if out_of_order {
                    result.add_warning(format!(
                        "Series {}, level {}, plane {}: tiles not stored in row-major order",
                        series, level, plane
                    ));
                }
            }
        }
    }

    result
}
