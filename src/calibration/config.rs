use std::path::PathBuf;

use crate::calibration::black_level::BlackLevelConfig;
use crate::calibration::detector::DetectorConfig;
use crate::image_pipeline::isp::IspConfig;
use crate::image_pipeline::tiff::TiffOutputConfig;

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub patches_wide: usize,
    pub patches_high: usize,
    /// Normalized reflectance mapped to the clamp minimum
    pub clamp_reflectance_min: f32,
    /// Normalized reflectance mapped to the clamp maximum
    pub clamp_reflectance_max: f32,
    pub gamma: [f32; 3],
    pub regression_iterations: usize,
    pub regression_step_size: f32,
    /// Estimate the black level from dark reference regions instead of the
    /// response intercept
    pub estimate_black_level: bool,
    /// Write numbered debug images here when set
    pub debug_dir: Option<PathBuf>,
    pub parallel: bool,
    pub validate_dimensions: bool,
    pub max_dimension: Option<usize>,
    /// Base ISP settings (mosaic layout, demosaic filter); calibrated fields
    /// are overwritten
    pub isp: IspConfig,
    pub detector: DetectorConfig,
    pub black_level: BlackLevelConfig,
    pub tiff: TiffOutputConfig,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            patches_wide: 6,
            patches_high: 4,
            clamp_reflectance_min: 0.0,
            clamp_reflectance_max: 1.0,
            gamma: [1.0; 3],
            regression_iterations: 100_000,
            regression_step_size: 0.1,
            estimate_black_level: true,
            debug_dir: None,
            parallel: true,
            validate_dimensions: true,
            max_dimension: Some(50000),
            isp: IspConfig::default(),
            detector: DetectorConfig::default(),
            black_level: BlackLevelConfig::default(),
            tiff: TiffOutputConfig::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn builder() -> CalibrationConfigBuilder {
        CalibrationConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct CalibrationConfigBuilder {
    patches: Option<(usize, usize)>,
    clamp_reflectance: Option<(f32, f32)>,
    gamma: Option<[f32; 3]>,
    regression: Option<(usize, f32)>,
    estimate_black_level: Option<bool>,
    debug_dir: Option<Option<PathBuf>>,
    parallel: Option<bool>,
    validate_dimensions: Option<bool>,
    max_dimension: Option<Option<usize>>,
    isp: Option<IspConfig>,
    detector: Option<DetectorConfig>,
    black_level: Option<BlackLevelConfig>,
    tiff: Option<TiffOutputConfig>,
}

impl CalibrationConfigBuilder {
    pub fn patches(mut self, wide: usize, high: usize) -> Self {
        self.patches = Some((wide, high));
        self
    }

    pub fn clamp_reflectance(mut self, min: f32, max: f32) -> Self {
        self.clamp_reflectance = Some((min, max));
        self
    }

    pub fn gamma(mut self, gamma: [f32; 3]) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn regression(mut self, iterations: usize, step_size: f32) -> Self {
        self.regression = Some((iterations, step_size));
        self
    }

    pub fn estimate_black_level(mut self, estimate: bool) -> Self {
        self.estimate_black_level = Some(estimate);
        self
    }

    pub fn debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn max_dimension(mut self, max: Option<usize>) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn isp(mut self, isp: IspConfig) -> Self {
        self.isp = Some(isp);
        self
    }

    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn black_level(mut self, black_level: BlackLevelConfig) -> Self {
        self.black_level = Some(black_level);
        self
    }

    pub fn tiff(mut self, tiff: TiffOutputConfig) -> Self {
        self.tiff = Some(tiff);
        self
    }

    pub fn build(self) -> CalibrationConfig {
        let default = CalibrationConfig::default();
        let (patches_wide, patches_high) = self
            .patches
            .unwrap_or((default.patches_wide, default.patches_high));
        let (clamp_reflectance_min, clamp_reflectance_max) = self
            .clamp_reflectance
            .unwrap_or((default.clamp_reflectance_min, default.clamp_reflectance_max));
        let (regression_iterations, regression_step_size) = self
            .regression
            .unwrap_or((default.regression_iterations, default.regression_step_size));
        CalibrationConfig {
            patches_wide,
            patches_high,
            clamp_reflectance_min,
            clamp_reflectance_max,
            gamma: self.gamma.unwrap_or(default.gamma),
            regression_iterations,
            regression_step_size,
            estimate_black_level: self.estimate_black_level.unwrap_or(default.estimate_black_level),
            debug_dir: self.debug_dir.unwrap_or(default.debug_dir),
            parallel: self.parallel.unwrap_or(default.parallel),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
            isp: self.isp.unwrap_or(default.isp),
            detector: self.detector.unwrap_or(default.detector),
            black_level: self.black_level.unwrap_or(default.black_level),
            tiff: self.tiff.unwrap_or(default.tiff),
        }
    }
}
