//! Image file loading.
//!
//! Decodes PNG, TIFF and JPEG files with the `image` crate into a
//! single-series, single-plane [`MemorySource`]. Channels are interleaved and
//! multi-byte samples are stored little-endian, whatever the file's own byte
//! order was.

use std::path::Path;

use image::{DynamicImage, ImageReader};
use tracing::info;

use crate::error::{IoError, SourceError};

use super::memory::MemorySource;
use super::types::{ImageGeometry, PixelFormatFacts};

/// Decode the image at `path` into a [`MemorySource`].
///
/// # Errors
///
/// - `SourceError::Io` if the file cannot be opened
/// - `SourceError::Decode` if the format is unknown or decoding fails
pub fn open_image_file(path: impl AsRef<Path>) -> Result<MemorySource, SourceError> {
    let path = path.as_ref();

    let mut reader = ImageReader::open(path)
        .map_err(|e| SourceError::Io(IoError::from_io(path, e)))?
        .with_guessed_format()
        .map_err(|e| SourceError::Io(IoError::from_io(path, e)))?;

    // Slides routinely exceed the default allocation limit.
    reader.no_limits();

    let image = reader.decode().map_err(|e| SourceError::Decode {
        message: format!("{}: {}", path.display(), e),
    })?;

    info!(
        "Decoded {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color()
    );

    image_to_source(image, path.display().to_string())
}

/// Convert a decoded image into a single-plane [`MemorySource`].
pub fn image_to_source(
    image: DynamicImage,
    identifier: impl Into<String>,
) -> Result<MemorySource, SourceError> {
    let geometry = ImageGeometry::new(image.width(), image.height());

    let (format, data) = match image {
        DynamicImage::ImageLuma8(buf) => (PixelFormatFacts::new(1, 1), buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => (PixelFormatFacts::new(1, 2), buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => (PixelFormatFacts::new(1, 3), buf.into_raw()),
        DynamicImage::ImageRgba8(buf) => (PixelFormatFacts::new(1, 4), buf.into_raw()),
        DynamicImage::ImageLuma16(buf) => (PixelFormatFacts::new(2, 1), u16_le(buf.as_raw())),
        DynamicImage::ImageLumaA16(buf) => (PixelFormatFacts::new(2, 2), u16_le(buf.as_raw())),
        DynamicImage::ImageRgb16(buf) => (PixelFormatFacts::new(2, 3), u16_le(buf.as_raw())),
        DynamicImage::ImageRgba16(buf) => (PixelFormatFacts::new(2, 4), u16_le(buf.as_raw())),
        DynamicImage::ImageRgb32F(buf) => (
            PixelFormatFacts::new(4, 3).with_floating_point(true),
            f32_le(buf.as_raw()),
        ),
        DynamicImage::ImageRgba32F(buf) => (
            PixelFormatFacts::new(4, 4).with_floating_point(true),
            f32_le(buf.as_raw()),
        ),
        other => {
            return Err(SourceError::Decode {
                message: format!("unsupported color type {:?}", other.color()),
            })
        }
    };

    MemorySource::new(format)
        .with_identifier(identifier)
        .with_series(geometry, [data])
}

fn u16_le(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn f32_le(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
