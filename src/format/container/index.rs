//! Tile index entries.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::raster::Region;

/// Address of a tile inside a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub series: usize,
    pub level: usize,
    pub plane: usize,
    pub x: u32,
    pub y: u32,
}

/// One stored tile: where it lies in the pyramid and where its bytes lie in
/// the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntry {
    pub series: usize,
    pub level: usize,
    pub plane: usize,

    /// Tile origin at its level
    pub x: u32,
    pub y: u32,

    /// Tile extent at its level
    pub width: u32,
    pub height: u32,

    /// Payload offset in the file
    pub offset: u64,

    /// Payload length in bytes
    pub length: u64,

    /// Hex SHA-256 of the payload
    pub sha256: String,
}

impl TileEntry {
    pub fn key(&self) -> TileKey {
        TileKey {
            series: self.series,
            level: self.level,
            plane: self.plane,
            x: self.x,
            y: self.y,
        }
    }

    pub fn region(&self) -> Region {
        Region::new(self.x, self.y, self.width, self.height)
    }

    /// Whether `payload` hashes to the recorded digest.
    pub fn matches(&self, payload: &[u8]) -> bool {
        digest(payload).eq_ignore_ascii_case(&self.sha256)
    }
}

/// Hex-encoded SHA-256 of `payload`.
pub fn digest(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}
