//! Two-point linear photometric response per channel.

use nalgebra::Vector3;
use serde::Serialize;
use tracing::info;

use crate::calibration::patch::{ColorPatch, MeasurementStage, PatchMeasurements};
use crate::calibration::reference::ReferenceChart;
use crate::calibration::statistics::{masked_median, MeasuredImage};
use crate::image_pipeline::common::error::{CalibrationError, Result};

/// Line `y = slope * x + intercept_y` from reflectance to measured value,
/// with the reflectances at which it reaches 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelResponse {
    pub slope: f32,
    pub intercept_y: f32,
    pub x_min: f32,
    pub x_max: f32,
}

impl ChannelResponse {
    /// Line through `(x_dark, y_dark)` and `(x_bright, y_bright)`.
    pub fn through(x_dark: f32, y_dark: f32, x_bright: f32, y_bright: f32) -> Self {
        let slope = (y_bright - y_dark) / (x_bright - x_dark);
        let intercept_y = -slope * x_dark + y_dark;
        Self {
            slope,
            intercept_y,
            x_min: -intercept_y / slope,
            x_max: (1.0 - intercept_y) / slope,
        }
    }

    #[inline]
    pub fn eval(&self, x: f32) -> f32 {
        self.slope * x + self.intercept_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorResponse {
    pub channels: [ChannelResponse; 3],
}

impl ColorResponse {
    pub fn slopes(&self) -> Vector3<f32> {
        Vector3::from_fn(|ch, _| self.channels[ch].slope)
    }

    pub fn intercepts_y(&self) -> Vector3<f32> {
        Vector3::from_fn(|ch, _| self.channels[ch].intercept_y)
    }

    pub fn x_min(&self) -> Vector3<f32> {
        Vector3::from_fn(|ch, _| self.channels[ch].x_min)
    }

    pub fn x_max(&self) -> Vector3<f32> {
        Vector3::from_fn(|ch, _| self.channels[ch].x_max)
    }
}

/// Fits the response from the gray ramp of an ordered patch list.
#[derive(Debug, Clone)]
pub struct ResponseModeler {
    chart: ReferenceChart,
}

impl ResponseModeler {
    pub fn new(chart: ReferenceChart) -> Self {
        Self { chart }
    }

    /// Measure the two gray samples on `image` and fit.
    pub fn fit(&self, image: MeasuredImage<'_>, patches: &[ColorPatch]) -> Result<ColorResponse> {
        let (dark, bright) = (self.chart.gray_dark_index(), self.chart.gray_bright_index());
        let patch = |i: usize| {
            patches.get(i).ok_or_else(|| {
                CalibrationError::ChartNotFound(format!(
                    "gray patch {} missing from {} detected patches",
                    i,
                    patches.len()
                ))
            })
        };
        let y_dark = masked_median(image, &patch(dark)?.mask)?;
        let y_bright = masked_median(image, &patch(bright)?.mask)?;
        self.fit_samples(y_dark, y_bright)
    }

    /// Fit from medians already taken for every patch.
    pub fn fit_measurements(&self, measurements: &PatchMeasurements) -> Result<ColorResponse> {
        let (dark, bright) = (self.chart.gray_dark_index(), self.chart.gray_bright_index());
        if measurements.len() <= dark.max(bright) {
            return Err(CalibrationError::ChartNotFound(format!(
                "{} measurements do not cover the gray ramp",
                measurements.len()
            )));
        }
        let response = self.fit_samples(measurements.median(dark), measurements.median(bright))?;
        log_response(measurements.stage, &response);
        Ok(response)
    }

    fn fit_samples(&self, y_dark: Vector3<f32>, y_bright: Vector3<f32>) -> Result<ColorResponse> {
        let (dark, bright) = (self.chart.gray_dark_index(), self.chart.gray_bright_index());
        let x_dark = self.chart.normalized(dark);
        let x_bright = self.chart.normalized(bright);

        let mut channels = [ChannelResponse::through(0.0, 0.0, 1.0, 1.0); 3];
        for (ch, fit) in channels.iter_mut().enumerate() {
            *fit = ChannelResponse::through(x_dark[ch], y_dark[ch], x_bright[ch], y_bright[ch]);
            if !(fit.slope.is_finite() && fit.slope > 0.0) {
                return Err(CalibrationError::Regression(format!(
                    "channel {} response is not increasing (dark {}, bright {})",
                    ch, y_dark[ch], y_bright[ch]
                )));
            }
        }
        Ok(ColorResponse { channels })
    }
}

fn log_response(stage: MeasurementStage, response: &ColorResponse) {
    for (name, fit) in ["R", "G", "B"].iter().zip(response.channels.iter()) {
        info!(
            stage = stage.name(),
            "{}: xIntercept: {:.4}, yIntercept: {:.4}, slope: {:.3}",
            name, fit.x_min, fit.intercept_y, fit.slope
        );
    }
}
