//! In-memory image source.

use bytes::Bytes;
use tracing::debug;

use crate::error::SourceError;

use super::traits::ImageSource;
use super::types::{copy_rect, ImageGeometry, Layout, PixelFormatFacts, Region};

/// One series held in memory: its geometry and the raw bytes of each plane.
#[derive(Debug, Clone)]
pub struct MemorySeries {
    pub geometry: ImageGeometry,
    pub planes: Vec<Bytes>,
}

/// An [`ImageSource`] over planes already decoded into memory.
///
/// Every plane is stored in the layout described by the shared
/// [`PixelFormatFacts`]. Plane sizes are checked when a series is added, so
/// region reads never need to re-validate buffer lengths.
#[derive(Debug, Clone)]
pub struct MemorySource {
    format: PixelFormatFacts,
    series: Vec<MemorySeries>,
    identifier: String,
}

impl MemorySource {
    /// Create an empty source with the given pixel format.
    pub fn new(format: PixelFormatFacts) -> Self {
        Self {
            format,
            series: Vec::new(),
            identifier: "memory".to_string(),
        }
    }

    /// Set the identifier used in log messages.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Append a series with the given planes.
    ///
    /// # Errors
    ///
    /// Fails if the geometry is empty or a plane does not hold exactly
    /// `width * height` pixels in the source's pixel format.
    pub fn with_series<P>(
        mut self,
        geometry: ImageGeometry,
        planes: impl IntoIterator<Item = P>,
    ) -> Result<Self, SourceError>
    where
        P: Into<Bytes>,
    {
        let series = self.series.len();
        if geometry.is_empty() {
            return Err(SourceError::InvalidGeometry {
                series,
                width: geometry.width,
                height: geometry.height,
            });
        }

        let expected = self
            .format
            .buffer_len(geometry.width, geometry.height)
            .ok_or(SourceError::InvalidGeometry {
                series,
                width: geometry.width,
                height: geometry.height,
            })?;

        let planes: Vec<Bytes> = planes.into_iter().map(Into::into).collect();
        for (plane, data) in planes.iter().enumerate() {
            if data.len() != expected {
                return Err(SourceError::PlaneSizeMismatch {
                    series,
                    plane,
                    expected,
                    actual: data.len(),
                });
            }
        }

        self.series.push(MemorySeries { geometry, planes });
        Ok(self)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn series_entry(&self, series: usize) -> Result<&MemorySeries, SourceError> {
        self.series.get(series).ok_or(SourceError::InvalidSeries {
            series,
            count: self.series.len(),
        })
    }
}

impl ImageSource for MemorySource {
    fn series_count(&self) -> usize {
        self.series.len()
    }

    fn geometry(&self, series: usize) -> Result<ImageGeometry, SourceError> {
        Ok(self.series_entry(series)?.geometry)
    }

    fn plane_count(&self, series: usize) -> Result<usize, SourceError> {
        Ok(self.series_entry(series)?.planes.len())
    }

    fn pixel_format(&self) -> PixelFormatFacts {
        self.format
    }

    fn read_region(
        &mut self,
        series: usize,
        plane: usize,
        region: Region,
    ) -> Result<Bytes, SourceError> {
        let entry = self.series_entry(series)?;
        let data = entry.planes.get(plane).ok_or(SourceError::InvalidPlane {
            series,
            plane,
            count: entry.planes.len(),
        })?;

        let geometry = entry.geometry;
        if !region.fits_within(geometry) {
            return Err(SourceError::RegionOutOfBounds {
                series,
                plane,
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
                image_width: geometry.width,
                image_height: geometry.height,
            });
        }

        // Whole-plane reads need no copy.
        if region == geometry.full_region() {
            return Ok(data.clone());
        }

        // In bounds, so the size is at most the plane size.
        let len = region.pixel_count() as usize * self.format.bytes_per_pixel();
        let mut out = vec![0u8; len];
        copy_rect(
            &self.format,
            data,
            Layout {
                width: geometry.width,
                height: geometry.height,
            },
            region.x,
            region.y,
            &mut out,
            Layout {
                width: region.width,
                height: region.height,
            },
            0,
            0,
            region.width,
            region.height,
        );

        debug!(
            "{}: read {}x{} at ({}, {}) from series {} plane {}",
            self.identifier, region.width, region.height, region.x, region.y, series, plane
        );

        Ok(Bytes::from(out))
    }
}
