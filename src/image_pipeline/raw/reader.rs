use std::path::Path;

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::raw::types::RawImageData;

pub trait RawImageReader {
    fn read_raw(&self, data: &[u8]) -> Result<RawImageData>;

    fn read_file(&self, path: &Path) -> Result<RawImageData> {
        let bytes = std::fs::read(path).map_err(|e| CalibrationError::file_access(path, e))?;
        self.read_raw(&bytes)
    }
}
