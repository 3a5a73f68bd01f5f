use std::io::Write;
use std::path::Path;

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::debayer::types::RgbImageData;
use crate::image_pipeline::tiff::types::TiffOutputConfig;

pub trait TiffWriter {
    fn write_rgb_tiff(&self, image: &RgbImageData, output: &mut dyn Write, config: &TiffOutputConfig) -> Result<()>;

    fn write_rgb_file(&self, image: &RgbImageData, path: &Path, config: &TiffOutputConfig) -> Result<()> {
        let mut file = std::fs::File::create(path).map_err(|e| CalibrationError::file_access(path, e))?;
        self.write_rgb_tiff(image, &mut file, config)
    }
}
