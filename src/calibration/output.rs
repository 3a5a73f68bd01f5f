//! Calibration artifacts written to the output directory.

use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use tracing::info;

use crate::calibration::pipeline::CalibrationReport;
use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::tiff::{TiffOutputConfig, TiffWriter};

pub const BLACK_LEVEL_FILE: &str = "black_level.txt";
pub const INTERCEPT_X_FILE: &str = "intercept_x.txt";
pub const ISP_CONFIG_FILE: &str = "isp_out.json";
pub const CALIBRATED_IMAGE_FILE: &str = "calibrated.tiff";

/// Paths of the files produced by [`write_outputs`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFiles {
    pub black_level: PathBuf,
    pub intercept_x: PathBuf,
    pub isp_config: PathBuf,
    pub calibrated_image: PathBuf,
}

/// `[a, b, c]`
pub fn format_vector(v: &Vector3<f32>) -> String {
    format!("[{}, {}, {}]", v.x, v.y, v.z)
}

/// `[[xmin_r, xmin_g, xmin_b],[xmax_r, xmax_g, xmax_b]]`
pub fn format_intercepts(report: &CalibrationReport) -> String {
    format!(
        "[{},{}]",
        format_vector(&report.raw_response.x_min()),
        format_vector(&report.raw_response.x_max())
    )
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|e| CalibrationError::file_access(path, e))
}

/// Persist the black level, response x-intercepts, ISP configuration and the
/// calibrated image under `dir`.
pub fn write_outputs(
    report: &CalibrationReport,
    dir: &Path,
    writer: &dyn TiffWriter,
    tiff_config: &TiffOutputConfig,
) -> Result<OutputFiles> {
    std::fs::create_dir_all(dir).map_err(|e| CalibrationError::file_access(dir, e))?;
    let files = OutputFiles {
        black_level: dir.join(BLACK_LEVEL_FILE),
        intercept_x: dir.join(INTERCEPT_X_FILE),
        isp_config: dir.join(ISP_CONFIG_FILE),
        calibrated_image: dir.join(CALIBRATED_IMAGE_FILE),
    };

    write_text(&files.black_level, &format_vector(&report.black_level))?;
    write_text(&files.intercept_x, &format_intercepts(report))?;
    report.params.save(&files.isp_config)?;
    writer.write_rgb_file(&report.corrected, &files.calibrated_image, tiff_config)?;

    info!("Wrote calibration outputs to {}", dir.display());
    Ok(files)
}
