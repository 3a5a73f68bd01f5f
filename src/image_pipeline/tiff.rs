//! TIFF writing module
//!
//! Calibrated images are written as 16-bit RGB TIFF files.

mod writer;
mod standard_tiff_writer;
pub mod types;

pub use writer::TiffWriter;
pub use standard_tiff_writer::StandardTiffWriter;
pub use types::{TiffCompression, TiffOutputConfig, TiffOutputConfigBuilder};
