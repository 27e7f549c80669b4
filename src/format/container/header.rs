//! Fixed-size framing of a pyramid container.
//!
//! # Header (24 bytes)
//! ```text
//! Bytes 0-3:   Magic "TPYR"
//! Bytes 4-5:   Version (1)
//! Bytes 6-7:   Flags (0)
//! Bytes 8-15:  Manifest offset
//! Bytes 16-23: Manifest length
//! ```
//!
//! # Trailer (24 bytes, at end of file)
//! ```text
//! Bytes 0-7:   Index offset
//! Bytes 8-15:  Index length
//! Bytes 16-23: Magic "TPYRIDX\0"
//! ```
//!
//! All integers are little-endian.

use crate::error::FormatError;
use crate::io::{read_u16_le, read_u64_le};

// =============================================================================
// Constants
// =============================================================================

/// Header magic
pub const HEADER_MAGIC: [u8; 4] = *b"TPYR";

/// Trailer magic
pub const TRAILER_MAGIC: [u8; 8] = *b"TPYRIDX\0";

/// Container version written by this crate
pub const CONTAINER_VERSION: u16 = 1;

/// Size of the header in bytes
pub const HEADER_SIZE: usize = 24;

/// Size of the trailer in bytes
pub const TRAILER_SIZE: usize = 24;

// =============================================================================
// Header
// =============================================================================

/// Parsed container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u16,
    pub flags: u16,
    pub manifest_offset: u64,
    pub manifest_len: u64,
}

impl ContainerHeader {
    /// Header for a manifest of `manifest_len` bytes placed right after it.
    pub fn new(manifest_len: u64) -> Self {
        Self {
            version: CONTAINER_VERSION,
            flags: 0,
            manifest_offset: HEADER_SIZE as u64,
            manifest_len,
        }
    }

    /// Parse a header.
    ///
    /// # Errors
    /// - `FileTooSmall` if fewer than [`HEADER_SIZE`] bytes are given
    /// - `InvalidMagic` if the magic is not "TPYR"
    /// - `UnsupportedVersion` for any version other than 1
    /// - `InvalidManifest` if the manifest range leaves the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::FileTooSmall {
                required: HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        if bytes[0..4] != HEADER_MAGIC {
            return Err(FormatError::InvalidMagic(bytes[0..4].to_vec()));
        }

        let version = read_u16_le(&bytes[4..6]);
        if version != CONTAINER_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let header = Self {
            version,
            flags: read_u16_le(&bytes[6..8]),
            manifest_offset: read_u64_le(&bytes[8..16]),
            manifest_len: read_u64_le(&bytes[16..24]),
        };

        let end = header.manifest_offset.checked_add(header.manifest_len);
        if header.manifest_offset < HEADER_SIZE as u64 || end.map_or(true, |e| e > file_size) {
            return Err(FormatError::InvalidManifest {
                message: format!(
                    "manifest range {}+{} outside file of {} bytes",
                    header.manifest_offset, header.manifest_len, file_size
                ),
            });
        }

        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&HEADER_MAGIC);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.manifest_offset.to_le_bytes());
        out[16..24].copy_from_slice(&self.manifest_len.to_le_bytes());
        out
    }
}

// =============================================================================
// Trailer
// =============================================================================

/// Parsed container trailer, locating the tile index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerTrailer {
    pub index_offset: u64,
    pub index_len: u64,
}

impl ContainerTrailer {
    /// Parse a trailer read from the last [`TRAILER_SIZE`] bytes.
    ///
    /// The index must lie between the header and the trailer.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, FormatError> {
        if bytes.len() < TRAILER_SIZE {
            return Err(FormatError::FileTooSmall {
                required: TRAILER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        if bytes[16..24] != TRAILER_MAGIC {
            return Err(FormatError::InvalidMagic(bytes[16..24].to_vec()));
        }

        let trailer = Self {
            index_offset: read_u64_le(&bytes[0..8]),
            index_len: read_u64_le(&bytes[8..16]),
        };

        let limit = file_size.saturating_sub(TRAILER_SIZE as u64);
        let end = trailer.index_offset.checked_add(trailer.index_len);
        if trailer.index_offset < HEADER_SIZE as u64 || end.map_or(true, |e| e > limit) {
            return Err(FormatError::InvalidIndex {
                message: format!(
                    "index range {}+{} outside data section of {} bytes",
                    trailer.index_offset, trailer.index_len, limit
                ),
            });
        }

        Ok(trailer)
    }

    pub fn to_bytes(&self) -> [u8; TRAILER_SIZE] {
        let mut out = [0u8; TRAILER_SIZE];
        out[0..8].copy_from_slice(&self.index_offset.to_le_bytes());
        out[8..16].copy_from_slice(&self.index_len.to_le_bytes());
        out[16..24].copy_from_slice(&TRAILER_MAGIC);
        out
    }
}
