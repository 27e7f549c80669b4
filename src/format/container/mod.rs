//! Single-file tiled pyramid container (`.tpyr`).
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │ Header (24 bytes)            │
//! ├──────────────────────────────┤ 24
//! │ Manifest (JSON metadata)     │
//! ├──────────────────────────────┤
//! │ Tile payloads (raw samples)  │
//! │ …in write order…             │
//! ├──────────────────────────────┤
//! │ Tile index (JSON entries)    │
//! ├──────────────────────────────┤ end - 24
//! │ Trailer (24 bytes)           │
//! └──────────────────────────────┘
//! ```
//!
//! The manifest is the [`PyramidMetadata`](crate::pyramid::PyramidMetadata)
//! declared before the first tile. Each index entry records a tile's
//! position, extent, payload range and SHA-256.

mod header;
mod index;
mod reader;
mod validation;
mod writer;

pub use header::{
    ContainerHeader, ContainerTrailer, CONTAINER_VERSION, HEADER_MAGIC, HEADER_SIZE,
    TRAILER_MAGIC, TRAILER_SIZE,
};
pub use index::{digest, TileEntry, TileKey};
pub use reader::PyramidReader;
pub use validation::{validate_pyramid, ValidationError, ValidationResult};
pub use writer::{first_payload_offset, PyramidWriter};
