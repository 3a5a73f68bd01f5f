//! Derivation of ISP parameters from the fitted response and patch colors.

use nalgebra::Vector3;
use tracing::{info, instrument};

use crate::calibration::patch::PatchMeasurements;
use crate::calibration::reference::ReferenceChart;
use crate::calibration::regression::RegressionSolver;
use crate::calibration::response::ColorResponse;
use crate::image_pipeline::common::error::{CalibrationError, Result};

/// Reflectance levels mapped to device clamp levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// White balance gains undoing each channel's slope.
pub fn white_balance_gains(response: &ColorResponse) -> [f32; 3] {
    response.channels.map(|fit| 1.0 / fit.slope)
}

/// Push reflectance clamp levels through the fitted lines and clip to [0, 1].
pub fn clamp_bounds(response: &ColorResponse, reflectance_min: f32, reflectance_max: f32) -> ClampBounds {
    ClampBounds {
        min: response.channels.map(|fit| fit.eval(reflectance_min).max(0.0)),
        max: response.channels.map(|fit| fit.eval(reflectance_max).min(1.0)),
    }
}

pub struct ParameterSynthesizer<S: RegressionSolver> {
    chart: ReferenceChart,
    solver: S,
}

impl<S: RegressionSolver> ParameterSynthesizer<S> {
    pub fn new(chart: ReferenceChart, solver: S) -> Self {
        Self { chart, solver }
    }

    pub fn white_balance_gains(&self, response: &ColorResponse) -> [f32; 3] {
        let gains = white_balance_gains(response);
        info!("White balance gains: {:?}", gains);
        gains
    }

    pub fn clamp_bounds(&self, response: &ColorResponse, reflectance_min: f32, reflectance_max: f32) -> ClampBounds {
        let bounds = clamp_bounds(response, reflectance_min, reflectance_max);
        info!("Clamp min: {:?}, clamp max: {:?}", bounds.min, bounds.max);
        bounds
    }

    /// Row-major CCM taking measured patch colors to the normalized reference.
    #[instrument(skip_all, fields(stage = measurements.stage.name()))]
    pub fn color_correction_matrix(&self, measurements: &PatchMeasurements) -> Result<[[f32; 3]; 3]> {
        if measurements.len() != self.chart.len() {
            return Err(CalibrationError::Regression(format!(
                "{} patch colors for a {} cell chart",
                measurements.len(),
                self.chart.len()
            )));
        }
        let outputs: Vec<Vector3<f32>> = (0..self.chart.len()).map(|i| self.chart.normalized(i)).collect();
        let m = self.solver.solve(&measurements.medians, &outputs)?;
        let ccm = [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ];
        info!("CCM: {:?}", ccm);
        Ok(ccm)
    }
}
