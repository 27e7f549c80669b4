//! Geometry and pixel-format value types shared by sources, sinks and the
//! pyramid builder.

use serde::{Deserialize, Serialize};

use crate::io::ByteOrder;

// =============================================================================
// ImageGeometry
// =============================================================================

/// Pixel dimensions of one resolution level of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageGeometry {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,
}

impl ImageGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Region covering the whole image.
    pub fn full_region(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }
}

// =============================================================================
// Region
// =============================================================================

/// A pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle lies entirely inside `geometry`.
    ///
    /// Computed in 64 bits so that `x + width` can never wrap.
    pub fn fits_within(&self, geometry: ImageGeometry) -> bool {
        self.x as u64 + self.width as u64 <= geometry.width as u64
            && self.y as u64 + self.height as u64 <= geometry.height as u64
    }

    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn geometry(&self) -> ImageGeometry {
        ImageGeometry::new(self.width, self.height)
    }
}

// =============================================================================
// PixelFormatFacts
// =============================================================================

/// Pixel encoding facts, read once from the source and immutable for the
/// whole conversion.
///
/// `bytes_per_sample` counts the bytes of a single channel sample, so one
/// pixel occupies `bytes_per_sample * channels` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormatFacts {
    /// Bytes of one channel sample (1, 2, 4 or 8)
    pub bytes_per_sample: usize,

    /// IEEE floating-point samples
    pub floating_point: bool,

    /// Two's-complement integer samples (ignored for floating point)
    pub signed: bool,

    /// Multi-byte samples are stored little-endian
    pub little_endian: bool,

    /// Number of channels stored per plane
    pub channels: usize,

    /// Channels interleaved per pixel (`RGBRGB…`) rather than stored as
    /// consecutive channel planes (`RR…GG…BB…`)
    pub interleaved: bool,
}

impl PixelFormatFacts {
    /// Unsigned integer samples, little-endian and interleaved.
    pub fn new(bytes_per_sample: usize, channels: usize) -> Self {
        Self {
            bytes_per_sample,
            floating_point: false,
            signed: false,
            little_endian: true,
            channels,
            interleaved: true,
        }
    }

    pub fn with_floating_point(mut self, floating_point: bool) -> Self {
        self.floating_point = floating_point;
        self
    }

    pub fn with_signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    pub fn with_little_endian(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    pub fn with_interleaved(mut self, interleaved: bool) -> Self {
        self.interleaved = interleaved;
        self
    }

    /// Bytes occupied by one pixel across all channels.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_sample * self.channels
    }

    /// Byte order of multi-byte samples.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        ByteOrder::from_little_endian(self.little_endian)
    }

    /// Exact buffer length for a `width` x `height` image, or `None` if it
    /// does not fit in memory.
    pub fn buffer_len(&self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }

    /// Byte offset of sample `channel` of pixel (`x`, `y`) in an image of
    /// `width` x `height`.
    #[inline]
    pub fn sample_offset(&self, width: u32, height: u32, x: u32, y: u32, channel: usize) -> usize {
        let (width, height, x, y) = (width as usize, height as usize, x as usize, y as usize);
        if self.interleaved {
            ((y * width + x) * self.channels + channel) * self.bytes_per_sample
        } else {
            ((channel * height + y) * width + x) * self.bytes_per_sample
        }
    }
}

// =============================================================================
// Rectangle Copy
// =============================================================================

/// A buffer paired with the dimensions it was laid out for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Layout {
    pub width: u32,
    pub height: u32,
}

/// Copy a `width` x `height` rectangle from (`src_x`, `src_y`) in `src` to
/// (`dst_x`, `dst_y`) in `dst`, honoring interleaved or planar layout.
///
/// Callers guarantee both rectangles are in bounds.
#[allow(clippy::too_many_arguments)]
pub(crate) fn copy_rect(
    format: &PixelFormatFacts,
    src: &[u8],
    src_layout: Layout,
    src_x: u32,
    src_y: u32,
    dst: &mut [u8],
    dst_layout: Layout,
    dst_x: u32,
    dst_y: u32,
    width: u32,
    height: u32,
) {
    if width == 0 || height == 0 {
        return;
    }

    if format.interleaved {
        let row_len = width as usize * format.bytes_per_pixel();
        for row in 0..height {
            let s = format.sample_offset(src_layout.width, src_layout.height, src_x, src_y + row, 0);
            let d = format.sample_offset(dst_layout.width, dst_layout.height, dst_x, dst_y + row, 0);
            dst[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
        }
    } else {
        let row_len = width as usize * format.bytes_per_sample;
        for channel in 0..format.channels {
            for row in 0..height {
                let s = format.sample_offset(
                    src_layout.width,
                    src_layout.height,
                    src_x,
                    src_y + row,
                    channel,
                );
                let d = format.sample_offset(
                    dst_layout.width,
                    dst_layout.height,
                    dst_x,
                    dst_y + row,
                    channel,
                );
                dst[d..d + row_len].copy_from_slice(&src[s..s + row_len]);
            }
        }
    }
}
