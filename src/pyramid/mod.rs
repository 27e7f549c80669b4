//! Pyramid planning and construction.
//!
//! # Flow
//!
//! ```text
//! PyramidConfig ──▶ PyramidMetadata::plan ──▶ sink declared
//!                                                  │
//!                   PyramidBuilder::build ◀────────┘
//!                     for series → plane → level → tile:
//!                       read_region → [downsample] → write_tile
//! ```
//!
//! # Components
//!
//! - [`PyramidConfig`]: Immutable conversion parameters
//! - [`PyramidMetadata`]: Per-series level geometry declared up front
//! - [`PyramidBuilder`]: Sequential orchestrator driving source and sink
//! - [`convert`]: File-to-file conversion with cleanup on failure

mod builder;
mod convert;
mod metadata;

pub use builder::{source_region, BuildSummary, PlaneState, PyramidBuilder};
pub use convert::{convert, convert_source};
pub use metadata::{
    level_geometry, level_scale, PyramidConfig, PyramidMetadata, SeriesMetadata,
    DEFAULT_SCALE_FACTOR,
};
