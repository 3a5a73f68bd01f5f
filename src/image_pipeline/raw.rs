//! RAW image reading module
//!
//! This module provides format-agnostic RAW mosaic reading capabilities and
//! the color filter array classification used by raw statistics.

mod reader;
mod rawloader_reader;
mod tiff_reader;
pub mod mosaic;
pub mod types;

pub use reader::RawImageReader;
pub use rawloader_reader::RawLoaderReader;
pub use tiff_reader::TiffMosaicReader;
pub use mosaic::{BayerPattern, Channel, SensorMosaic};
pub use types::{MosaicPlane, RawImageData};
