//! Read and write contracts between the pyramid builder and its I/O
//! collaborators.

use bytes::Bytes;

use crate::error::{SinkError, SourceError};

use super::types::{ImageGeometry, PixelFormatFacts, Region};

// =============================================================================
// ImageSource
// =============================================================================

/// Random-access reader of raw pixel regions.
///
/// A source reports geometry and pixel-format facts once and then serves
/// arbitrary rectangles of any plane of any series at full resolution.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use pyramid_tiler::error::SourceError;
/// use pyramid_tiler::raster::{ImageSource, Region};
///
/// fn first_row<S: ImageSource>(source: &mut S) -> Result<Bytes, SourceError> {
///     let geometry = source.geometry(0)?;
///     source.read_region(0, 0, Region::new(0, 0, geometry.width, 1))
/// }
/// ```
pub trait ImageSource {
    /// Number of independent images in the source.
    fn series_count(&self) -> usize;

    /// Full-resolution geometry of `series`.
    fn geometry(&self, series: usize) -> Result<ImageGeometry, SourceError>;

    /// Number of planes in `series`.
    fn plane_count(&self, series: usize) -> Result<usize, SourceError>;

    /// Pixel format shared by every plane of every series.
    fn pixel_format(&self) -> PixelFormatFacts;

    /// Read `region` of `plane` in `series`.
    ///
    /// The returned buffer holds exactly `region.width * region.height`
    /// pixels in the source's layout. Implementations must fail with
    /// [`SourceError::RegionOutOfBounds`] instead of returning a truncated or
    /// padded buffer when the rectangle leaves the declared geometry.
    fn read_region(
        &mut self,
        series: usize,
        plane: usize,
        region: Region,
    ) -> Result<Bytes, SourceError>;

    /// Release any resources held by the source.
    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

// =============================================================================
// ImageSink
// =============================================================================

/// Tile writer for a pyramid whose metadata was declared when the sink was
/// opened.
///
/// Writes are addressed by the current series and resolution, selected with
/// [`set_series`](ImageSink::set_series) and
/// [`set_resolution`](ImageSink::set_resolution). Writing to anything that was
/// not declared is an error.
pub trait ImageSink {
    /// Select the series subsequent tiles belong to. Resets the resolution
    /// to 0.
    fn set_series(&mut self, series: usize) -> Result<(), SinkError>;

    /// Select the resolution level subsequent tiles belong to.
    fn set_resolution(&mut self, level: usize) -> Result<(), SinkError>;

    /// Write one tile of `plane` covering `region` of the current level.
    fn write_tile(&mut self, plane: usize, buffer: &[u8], region: Region)
        -> Result<(), SinkError>;

    /// Finish the output. No writes are accepted afterwards.
    fn close(&mut self) -> Result<(), SinkError>;
}
