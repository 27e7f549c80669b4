//! Box downsampler.
//!
//! Reduces a pixel buffer by an integer factor by combining non-overlapping
//! `scale x scale` blocks into one output pixel, channel by channel.
//!
//! # Design Decisions
//!
//! - **Format-faithful**: every sample is decoded according to its width,
//!   signedness, float-ness and byte order before any arithmetic, and the
//!   result is re-encoded the same way. The output never changes the pixel
//!   format or the interleave convention of the input.
//!
//! - **Truncating geometry**: the output is `floor(width / scale)` by
//!   `floor(height / scale)`; trailing rows and columns that do not fill a
//!   complete block are dropped.
//!
//! - **Explicit failures**: encodings that cannot be decoded (3-byte
//!   integers, half floats, ...) are rejected instead of being averaged as raw
//!   bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::DownsampleError;
use crate::io::ByteOrder;
use crate::raster::PixelFormatFacts;

// =============================================================================
// Filter
// =============================================================================

/// How each block of source samples is reduced to one output sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownsampleFilter {
    /// Arithmetic mean of the block
    #[default]
    Mean,

    /// Top-left sample of the block, copied verbatim
    Nearest,
}

// =============================================================================
// SampleType
// =============================================================================

/// Decodable sample encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl SampleType {
    /// Resolve the sample encoding described by `format`.
    pub fn from_format(format: &PixelFormatFacts) -> Result<Self, DownsampleError> {
        let sample = match (
            format.floating_point,
            format.signed,
            format.bytes_per_sample,
        ) {
            (true, _, 4) => SampleType::F32,
            (true, _, 8) => SampleType::F64,
            (false, false, 1) => SampleType::U8,
            (false, true, 1) => SampleType::I8,
            (false, false, 2) => SampleType::U16,
            (false, true, 2) => SampleType::I16,
            (false, false, 4) => SampleType::U32,
            (false, true, 4) => SampleType::I32,
            (false, false, 8) => SampleType::U64,
            (false, true, 8) => SampleType::I64,
            (floating_point, _, bytes_per_sample) => {
                return Err(DownsampleError::UnsupportedFormat {
                    bytes_per_sample,
                    floating_point,
                })
            }
        };
        Ok(sample)
    }

    /// Size of one sample in bytes.
    pub fn size(self) -> usize {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 => 4,
            SampleType::U64 | SampleType::I64 | SampleType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleType::F32 | SampleType::F64)
    }

    #[inline]
    fn decode_int(self, order: ByteOrder, bytes: &[u8]) -> i128 {
        match self {
            SampleType::U8 => bytes[0] as i128,
            SampleType::I8 => bytes[0] as i8 as i128,
            SampleType::U16 => order.read_u16(bytes) as i128,
            SampleType::I16 => order.read_u16(bytes) as i16 as i128,
            SampleType::U32 => order.read_u32(bytes) as i128,
            SampleType::I32 => order.read_u32(bytes) as i32 as i128,
            SampleType::U64 => order.read_u64(bytes) as i128,
            SampleType::I64 => order.read_u64(bytes) as i64 as i128,
            SampleType::F32 | SampleType::F64 => self.decode_float(order, bytes) as i128,
        }
    }

    /// Encode an integer already known to lie in the sample's range.
    /// Truncating casts keep the two's-complement bit pattern for signed types.
    #[inline]
    fn encode_int(self, order: ByteOrder, value: i128, out: &mut [u8]) {
        match self {
            SampleType::U8 | SampleType::I8 => out[0] = value as u8,
            SampleType::U16 | SampleType::I16 => order.write_u16(value as u16, out),
            SampleType::U32 | SampleType::I32 => order.write_u32(value as u32, out),
            SampleType::U64 | SampleType::I64 => order.write_u64(value as u64, out),
            SampleType::F32 | SampleType::F64 => self.encode_float(order, value as f64, out),
        }
    }

    #[inline]
    fn decode_float(self, order: ByteOrder, bytes: &[u8]) -> f64 {
        match self {
            SampleType::F32 => f32::from_bits(order.read_u32(bytes)) as f64,
            SampleType::F64 => f64::from_bits(order.read_u64(bytes)),
            _ => self.decode_int(order, bytes) as f64,
        }
    }

    #[inline]
    fn encode_float(self, order: ByteOrder, value: f64, out: &mut [u8]) {
        match self {
            SampleType::F32 => order.write_u32((value as f32).to_bits(), out),
            SampleType::F64 => order.write_u64(value.to_bits(), out),
            _ => self.encode_int(order, value as i128, out),
        }
    }
}

// =============================================================================
// Downsampled Buffer
// =============================================================================

/// Output of a downsample call.
#[derive(Debug, Clone, PartialEq)]
pub struct DownsampledBuffer {
    /// Pixel data in the input's layout
    pub data: Bytes,

    /// Output width, `floor(input_width / scale)`
    pub width: u32,

    /// Output height, `floor(input_height / scale)`
    pub height: u32,
}

/// Output dimension for an input dimension and scale factor.
#[inline]
pub fn scaled_dimension(size: u32, scale: u32) -> u32 {
    size / scale
}

// =============================================================================
// BoxDownsampler
// =============================================================================

/// Stateless block downsampler.
///
/// # Example
///
/// ```
/// use pyramid_tiler::raster::PixelFormatFacts;
/// use pyramid_tiler::tile::BoxDownsampler;
///
/// let format = PixelFormatFacts::new(1, 1);
/// let pixels = [10u8, 20, 30, 40];
///
/// let out = BoxDownsampler::new()
///     .downsample(&pixels, 2, 2, 2, &format)
///     .unwrap();
///
/// assert_eq!((out.width, out.height), (1, 1));
/// assert_eq!(&out.data[..], &[25]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxDownsampler {
    filter: DownsampleFilter,
}

impl BoxDownsampler {
    /// Create a downsampler using the block mean.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a downsampler with an explicit filter.
    pub fn with_filter(filter: DownsampleFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> DownsampleFilter {
        self.filter
    }

    /// Downsample `buffer` (a `width` x `height` image in `format`) by
    /// `scale`.
    ///
    /// # Errors
    ///
    /// - `InvalidScaleFactor` if `scale` is 0
    /// - `UnsupportedFormat` if the sample encoding cannot be decoded
    /// - `BufferSizeMismatch` if `buffer` does not hold exactly
    ///   `width * height` pixels
    pub fn downsample(
        &self,
        buffer: &[u8],
        width: u32,
        height: u32,
        scale: u32,
        format: &PixelFormatFacts,
    ) -> Result<DownsampledBuffer, DownsampleError> {
        if scale == 0 {
            return Err(DownsampleError::InvalidScaleFactor(scale));
        }

        let sample = SampleType::from_format(format)?;

        let expected = format
            .buffer_len(width, height)
            .ok_or(DownsampleError::BufferSizeMismatch {
                expected: usize::MAX,
                actual: buffer.len(),
            })?;
        if buffer.len() != expected {
            return Err(DownsampleError::BufferSizeMismatch {
                expected,
                actual: buffer.len(),
            });
        }

        if scale == 1 {
            return Ok(DownsampledBuffer {
                data: Bytes::copy_from_slice(buffer),
                width,
                height,
            });
        }

        let out_width = scaled_dimension(width, scale);
        let out_height = scaled_dimension(height, scale);
        // Bounded by the input length, which is already in memory.
        let out_len = out_width as usize * out_height as usize * format.bytes_per_pixel();
        let mut out = vec![0u8; out_len];

        if out_len > 0 {
            let block = Block {
                format,
                sample,
                src: buffer,
                width,
                height,
                scale,
            };

            for channel in 0..format.channels {
                for oy in 0..out_height {
                    for ox in 0..out_width {
                        let dst = format.sample_offset(out_width, out_height, ox, oy, channel);
                        let dst = &mut out[dst..dst + sample.size()];
                        match self.filter {
                            DownsampleFilter::Nearest => block.nearest(channel, ox, oy, dst),
                            DownsampleFilter::Mean if sample.is_float() => {
                                block.float_mean(channel, ox, oy, dst)
                            }
                            DownsampleFilter::Mean => block.int_mean(channel, ox, oy, dst),
                        }
                    }
                }
            }
        }

        Ok(DownsampledBuffer {
            data: Bytes::from(out),
            width: out_width,
            height: out_height,
        })
    }
}

/// Source buffer view used to reduce one block at a time.
struct Block<'a> {
    format: &'a PixelFormatFacts,
    sample: SampleType,
    src: &'a [u8],
    width: u32,
    height: u32,
    scale: u32,
}

impl Block<'_> {
    #[inline]
    fn sample_at(&self, channel: usize, x: u32, y: u32) -> &[u8] {
        let offset = self
            .format
            .sample_offset(self.width, self.height, x, y, channel);
        &self.src[offset..offset + self.sample.size()]
    }

    fn nearest(&self, channel: usize, ox: u32, oy: u32, dst: &mut [u8]) {
        dst.copy_from_slice(self.sample_at(channel, ox * self.scale, oy * self.scale));
    }

    /// Integer mean, rounding half up.
    fn int_mean(&self, channel: usize, ox: u32, oy: u32, dst: &mut [u8]) {
        let order = self.format.byte_order();
        let (x0, y0) = (ox * self.scale, oy * self.scale);

        let mut sum: i128 = 0;
        for y in y0..y0 + self.scale {
            for x in x0..x0 + self.scale {
                sum += self.sample.decode_int(order, self.sample_at(channel, x, y));
            }
        }

        let n = self.scale as i128 * self.scale as i128;
        let mean = (sum + n / 2).div_euclid(n);
        self.sample.encode_int(order, mean, dst);
    }

    /// Floating-point mean as a running average, so a block of identical
    /// values (including infinities) reproduces that value exactly.
    fn float_mean(&self, channel: usize, ox: u32, oy: u32, dst: &mut [u8]) {
        let order = self.format.byte_order();
        let (x0, y0) = (ox * self.scale, oy * self.scale);

        let mut mean = self.sample.decode_float(order, self.sample_at(channel, x0, y0));
        let mut count = 1.0f64;
        for y in y0..y0 + self.scale {
            for x in x0..x0 + self.scale {
                if x == x0 && y == y0 {
                    continue;
                }
                let value = self.sample.decode_float(order, self.sample_at(channel, x, y));
                count += 1.0;
                if value != mean {
                    mean += (value - mean) / count;
                }
            }
        }

        self.sample.encode_float(order, mean, dst);
    }
}
