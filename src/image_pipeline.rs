//! Image processing pipeline module
//!
//! Raw sensor readers, the CPU image signal processor used during
//! calibration, demosaicing and TIFF output of developed images.

pub mod common;
pub mod debayer;
pub mod isp;
pub mod raw;
pub mod tiff;

pub use common::{
    CalibrationError,
    Parallelism,
    Result,
};

pub use raw::{
    BayerPattern,
    Channel,
    MosaicPlane,
    RawImageData,
    RawImageReader,
    RawLoaderReader,
    SensorMosaic,
    TiffMosaicReader,
};

pub use debayer::RgbImageData;

pub use isp::{
    CameraIsp,
    CpuIsp,
    IspConfig,
};

pub use tiff::{
    TiffCompression,
    TiffOutputConfig,
    TiffOutputConfigBuilder,
    TiffWriter,
    StandardTiffWriter,
};
