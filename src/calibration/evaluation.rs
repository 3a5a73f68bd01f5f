//! Color error of measured patches against the reference chart.

use nalgebra::Vector3;
use serde::Serialize;
use tracing::info;

use crate::calibration::patch::{ColorPatch, MeasurementStage, PatchMeasurements};
use crate::calibration::reference::ReferenceChart;
use crate::calibration::statistics::{MeasuredImage, PatchStatistics};
use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::debayer::RgbImageData;

/// Errors on the 8-bit scale, averaged over patches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ColorError {
    /// Mean Euclidean RGB distance
    pub mean_euclidean: f32,
    /// Mean absolute error per channel
    pub mean_abs: [f32; 3],
}

impl ColorError {
    /// `[euclidean, |dR|, |dG|, |dB|]`
    pub fn to_array(&self) -> [f32; 4] {
        [self.mean_euclidean, self.mean_abs[0], self.mean_abs[1], self.mean_abs[2]]
    }
}

pub struct ErrorEvaluator {
    chart: ReferenceChart,
    statistics: PatchStatistics,
}

impl ErrorEvaluator {
    pub fn new(chart: ReferenceChart, statistics: PatchStatistics) -> Self {
        Self { chart, statistics }
    }

    /// Error of patch medians in [0, 1] against the chart.
    pub fn evaluate_measurements(&self, measurements: &PatchMeasurements) -> Result<ColorError> {
        let n = measurements.len();
        if n == 0 || n > self.chart.len() {
            return Err(CalibrationError::ChartNotFound(format!(
                "cannot compare {} patches with a {} cell chart",
                n,
                self.chart.len()
            )));
        }
        let mut error = ColorError::default();
        for (i, median) in measurements.medians.iter().enumerate() {
            let diff: Vector3<f32> = median * 255.0 - self.chart.rgb(i);
            error.mean_euclidean += diff.norm() / n as f32;
            for ch in 0..3 {
                error.mean_abs[ch] += diff[ch].abs() / n as f32;
            }
        }
        Ok(error)
    }

    /// Errors of the same patches on an image before and after correction.
    pub fn evaluate(
        &self,
        before: &RgbImageData,
        after: &RgbImageData,
        patches: &[ColorPatch],
    ) -> Result<(ColorError, ColorError)> {
        let measured_before = self
            .statistics
            .measure(MeasuredImage::Rgb(before), patches, MeasurementStage::Demosaiced)?;
        let measured_after = self
            .statistics
            .measure(MeasuredImage::Rgb(after), patches, MeasurementStage::ColorCorrected)?;
        let errors = (
            self.evaluate_measurements(&measured_before)?,
            self.evaluate_measurements(&measured_after)?,
        );
        log_errors(&errors);
        Ok(errors)
    }
}

pub fn log_errors((before, after): &(ColorError, ColorError)) {
    info!("Error before correction [RGB, R, G, B]: {:?}", before.to_array());
    info!("Error after correction [RGB, R, G, B]: {:?}", after.to_array());
}
