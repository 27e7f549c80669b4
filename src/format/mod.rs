//! On-disk pyramid formats.
//!
//! Currently one format is supported:
//!
//! - **TPYR container**: a single file holding the manifest, raw tile payloads
//!   and a checksummed tile index. See [`container`].

pub mod container;

pub use container::{
    PyramidReader, PyramidWriter, TileEntry, ValidationError, ValidationResult,
};
