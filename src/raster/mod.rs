//! Raster abstraction layer.
//!
//! This module defines the contracts the pyramid builder uses to talk to its
//! I/O collaborators, plus the value types that flow across them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             PyramidBuilder              │
//! └──────────┬───────────────────┬──────────┘
//!            │ read_region       │ write_tile
//!            ▼                   ▼
//! ┌────────────────────┐ ┌────────────────────┐
//! │ ImageSource trait  │ │  ImageSink trait   │
//! └─────────┬──────────┘ └─────────┬──────────┘
//!           ▼                      ▼
//! ┌────────────────────┐ ┌────────────────────┐
//! │   MemorySource     │ │   PyramidWriter    │
//! │ (image files, raw  │ │ (.tpyr container)  │
//! │  buffers)          │ │                    │
//! └────────────────────┘ └────────────────────┘
//! ```

mod file;
mod memory;
mod traits;
mod types;

pub(crate) use types::{copy_rect, Layout};

pub use file::{image_to_source, open_image_file};
pub use memory::{MemorySeries, MemorySource};
pub use traits::{ImageSink, ImageSource};
pub use types::{ImageGeometry, PixelFormatFacts, Region};
