use std::path::Path;

use thiserror::Error;

/// I/O errors that can occur when reading or writing local resources
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Underlying file system error
    #[error("I/O error on {path}: {message}")]
    File { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    NotFound(String),
}

impl IoError {
    /// Wrap a `std::io::Error` raised while accessing `path`.
    pub fn from_io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        let path = path.as_ref().display().to_string();
        if err.kind() == std::io::ErrorKind::NotFound {
            IoError::NotFound(path)
        } else {
            IoError::File {
                path,
                message: err.to_string(),
            }
        }
    }
}

/// Configuration errors, detected before any pixel I/O happens
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Tile size with a zero dimension
    #[error("Tile size must be greater than 0, got {x}x{y}")]
    ZeroTileSize { x: u32, y: u32 },

    /// Tile size argument could not be parsed
    #[error("Invalid tile size '{0}': expected N, WxH or 'whole'")]
    InvalidTileSize(String),

    /// Scale factor below 2
    #[error("Scale factor must be at least 2, got {0}")]
    InvalidScaleFactor(u32),

    /// scale^level does not fit in 32 bits
    #[error("Scale factor {scale} raised to level {level} overflows")]
    ScaleOverflow { scale: u32, level: usize },

    /// Input path does not exist
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    /// Output path cannot be created
    #[error("Output path {path} is not writable: {reason}")]
    OutputNotWritable { path: String, reason: String },

    /// A declared resolution level would have a zero dimension
    #[error(
        "Resolution {level} of series {series} collapses to {width}x{height} pixels; \
         reduce the resolution count"
    )]
    LevelTooSmall {
        series: usize,
        level: usize,
        width: u32,
        height: u32,
    },

    /// Declared level geometry disagrees with floor(base / scale^level)
    #[error(
        "Resolution {level} of series {series} is {width}x{height}, expected \
         {expected_width}x{expected_height}"
    )]
    LevelGeometryMismatch {
        series: usize,
        level: usize,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    /// Series declares no resolution levels
    #[error("Series {0} declares no resolution levels")]
    NoLevels(usize),

    /// The source reports no series at all
    #[error("Source contains no series")]
    EmptySource,
}

/// Errors raised by an image source
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Requested rectangle exceeds the declared geometry
    #[error(
        "Region out of bounds in series {series}, plane {plane}: requested {width}x{height} \
         at ({x}, {y}), image is {image_width}x{image_height}"
    )]
    RegionOutOfBounds {
        series: usize,
        plane: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Series index is out of range
    #[error("Series {series} out of range (source has {count})")]
    InvalidSeries { series: usize, count: usize },

    /// Plane index is out of range
    #[error("Plane {plane} out of range for series {series} (series has {count})")]
    InvalidPlane {
        series: usize,
        plane: usize,
        count: usize,
    },

    /// Plane buffer does not match the declared geometry and format
    #[error("Plane {plane} of series {series} has {actual} bytes, expected {expected}")]
    PlaneSizeMismatch {
        series: usize,
        plane: usize,
        expected: usize,
        actual: usize,
    },

    /// Geometry with a zero dimension
    #[error("Invalid geometry {width}x{height} for series {series}")]
    InvalidGeometry {
        series: usize,
        width: u32,
        height: u32,
    },

    /// Pixel decoding failed
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// I/O error while reading the source
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Errors raised by an image sink
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// Declared pyramid metadata is inconsistent
    #[error("Invalid pyramid metadata: {0}")]
    InvalidMetadata(#[from] ConfigError),

    /// Series was not declared in the pyramid metadata
    #[error("Series {series} was not declared (pyramid has {count})")]
    UndeclaredSeries { series: usize, count: usize },

    /// Resolution level was not declared for the series
    #[error("Resolution {level} was not declared for series {series} (series has {count})")]
    UndeclaredResolution {
        series: usize,
        level: usize,
        count: usize,
    },

    /// A tile was written before any series was selected
    #[error("No series selected; call set_series before writing tiles")]
    NoSeriesSelected,

    /// Plane index exceeds the declared plane count
    #[error("Plane {plane} out of range for series {series} (series has {count})")]
    InvalidPlane {
        series: usize,
        plane: usize,
        count: usize,
    },

    /// Tile rectangle leaves the declared level
    #[error(
        "Tile {width}x{height} at ({x}, {y}) exceeds resolution {level} of series {series} \
         ({level_width}x{level_height})"
    )]
    TileOutOfBounds {
        series: usize,
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        level_width: u32,
        level_height: u32,
    },

    /// Tile rectangle is not a cell of the declared tile grid
    #[error(
        "Tile {width}x{height} at ({x}, {y}) is not a cell of the tile grid of resolution \
         {level} in series {series}"
    )]
    OffGrid {
        series: usize,
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Tile buffer size disagrees with the tile extent and pixel format
    #[error("Tile buffer has {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Same tile written twice
    #[error("Tile at ({x}, {y}) of series {series}, resolution {level}, plane {plane} was already written")]
    DuplicateTile {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    },

    /// Not every declared pixel was written when the sink was closed
    #[error(
        "Series {series}, resolution {level}, plane {plane} is incomplete: \
         {written} of {expected} pixels written"
    )]
    Incomplete {
        series: usize,
        level: usize,
        plane: usize,
        written: u64,
        expected: u64,
    },

    /// Sink was already closed
    #[error("Sink is closed")]
    Closed,

    /// Container serialization failed
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// I/O error while writing
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Errors raised by the box downsampler
#[derive(Debug, Clone, Error)]
pub enum DownsampleError {
    /// Sample encoding the downsampler cannot decode
    #[error(
        "Unsupported pixel format: {bytes_per_sample} bytes per sample (floating point: {floating_point})"
    )]
    UnsupportedFormat {
        bytes_per_sample: usize,
        floating_point: bool,
    },

    /// Scale factor of zero
    #[error("Invalid scale factor: {0}")]
    InvalidScaleFactor(u32),

    /// Buffer length disagrees with geometry and format
    #[error("Buffer has {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },
}

/// Errors that can occur when parsing a pyramid container
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid magic bytes in the header or trailer
    #[error("Invalid magic bytes: {0:02X?}")]
    InvalidMagic(Vec<u8>),

    /// Container version is not supported
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u16),

    /// File is too small to contain header and trailer
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Manifest JSON is malformed or inconsistent
    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    /// Tile index is malformed or points outside the file
    #[error("Invalid tile index: {message}")]
    InvalidIndex { message: String },

    /// No tile stored at the requested position
    #[error("No tile at ({x}, {y}) in series {series}, resolution {level}, plane {plane}")]
    TileNotFound {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    },

    /// Stored tile does not match its recorded digest
    #[error("Checksum mismatch for tile at ({x}, {y}) in series {series}, resolution {level}, plane {plane}")]
    ChecksumMismatch {
        series: usize,
        level: usize,
        plane: usize,
        x: u32,
        y: u32,
    },
}

/// Top-level error for a pyramid conversion.
///
/// Every failure aborts the conversion; there is no partial-success mode.
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source read error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink write error: {0}")]
    Sink(#[from] SinkError),

    #[error("Downsample error: {0}")]
    Downsample(#[from] DownsampleError),
}
