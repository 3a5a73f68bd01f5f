use std::path::Path;
use std::time::Instant;

use nalgebra::Vector3;
use tracing::{info, info_span, instrument, warn};

use crate::calibration::black_level::BlackLevelEstimator;
use crate::calibration::config::CalibrationConfig;
use crate::calibration::debug::{self as debug_images, DebugImageWriter};
use crate::calibration::detector::ChartDetector;
use crate::calibration::evaluation::{ColorError, ErrorEvaluator};
use crate::calibration::patch::{ColorPatch, MeasurementStage, PatchMeasurements};
use crate::calibration::reference::ReferenceChart;
use crate::calibration::regression::{GradientDescentSolver, RegressionSolver};
use crate::calibration::response::{ColorResponse, ResponseModeler};
use crate::calibration::statistics::{MeasuredImage, PatchStatistics};
use crate::calibration::synthesis::ParameterSynthesizer;
use crate::calibration::timing::{CalibrationStep, PipelineTimings};
use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::common::parallel::Parallelism;
use crate::image_pipeline::debayer::RgbImageData;
use crate::image_pipeline::isp::{CameraIsp, CpuIsp, IspConfig};
use crate::image_pipeline::raw::{MosaicPlane, RawImageData, RawImageReader};

/// Everything produced by one calibration run.
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    /// Calibrated ISP settings
    pub params: IspConfig,
    /// Black level normalized to [0, 1]
    pub black_level: Vector3<f32>,
    /// Response of the unprocessed sensor data
    pub raw_response: ColorResponse,
    /// Response after each later mosaic stage
    pub responses: Vec<(MeasurementStage, ColorResponse)>,
    pub patches: Vec<ColorPatch>,
    pub measurements: Vec<PatchMeasurements>,
    /// Chart error before and after color correction
    pub errors: (ColorError, ColorError),
    pub demosaiced: RgbImageData,
    pub corrected: RgbImageData,
    pub timings: PipelineTimings,
}

impl CalibrationReport {
    pub fn response(&self, stage: MeasurementStage) -> Option<&ColorResponse> {
        if stage == MeasurementStage::Raw {
            return Some(&self.raw_response);
        }
        self.responses.iter().find(|(s, _)| *s == stage).map(|(_, r)| r)
    }

    pub fn measurement(&self, stage: MeasurementStage) -> Option<&PatchMeasurements> {
        self.measurements.iter().find(|m| m.stage == stage)
    }
}

pub struct CalibrationPipeline<I: CameraIsp, S: RegressionSolver> {
    isp: I,
    solver: S,
    chart: ReferenceChart,
    config: CalibrationConfig,
}

impl CalibrationPipeline<CpuIsp, GradientDescentSolver> {
    pub fn new(config: CalibrationConfig) -> Self {
        let isp = CpuIsp::new(Parallelism::from_enabled(config.parallel));
        let solver = GradientDescentSolver::new(config.regression_iterations, config.regression_step_size);
        Self::with_custom(isp, solver, config)
    }
}

impl<I: CameraIsp, S: RegressionSolver> CalibrationPipeline<I, S> {
    pub fn with_custom(isp: I, solver: S, config: CalibrationConfig) -> Self {
        Self {
            isp,
            solver,
            chart: ReferenceChart::macbeth_linear(),
            config,
        }
    }

    /// Calibrate against another reference chart.
    pub fn with_chart(mut self, chart: ReferenceChart) -> Self {
        self.chart = chart;
        self
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn chart(&self) -> &ReferenceChart {
        &self.chart
    }

    fn parallelism(&self) -> Parallelism {
        Parallelism::from_enabled(self.config.parallel)
    }

    fn validate(&self, raw: &RawImageData) -> Result<()> {
        let c = &self.config;
        if c.patches_wide * c.patches_high != self.chart.len() {
            return Err(CalibrationError::UnsupportedFormat(format!(
                "{}x{} patches requested for a {} cell reference chart",
                c.patches_wide,
                c.patches_high,
                self.chart.len()
            )));
        }

        if !c.validate_dimensions {
            return Ok(());
        }

        if raw.width == 0 || raw.height == 0 {
            return Err(CalibrationError::InvalidDimensions(raw.width, raw.height));
        }

        if let Some(max) = c.max_dimension {
            if raw.width > max || raw.height > max {
                warn!(
                    "Image dimensions {}x{} exceed maximum {}",
                    raw.width, raw.height, max
                );
                return Err(CalibrationError::InvalidDimensions(raw.width, raw.height));
            }
        }

        Ok(())
    }

    fn debug_writer(&self) -> Result<DebugImageWriter> {
        match &self.config.debug_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| CalibrationError::file_access(dir, e))?;
                Ok(DebugImageWriter::new(dir.clone()))
            }
            None => Ok(DebugImageWriter::disabled()),
        }
    }

    /// Layout settings from the base configuration, every calibrated stage at
    /// identity.
    fn base_params(&self) -> IspConfig {
        IspConfig {
            gamma: self.config.gamma,
            demosaic_filter: self.config.isp.demosaic_filter,
            ..IspConfig::with_pattern(self.config.isp.bayer_pattern)
        }
    }

    /// Locate the chart in `raw` and calibrate against it.
    #[instrument(skip_all, fields(width = raw.width, height = raw.height))]
    pub fn run(&self, raw: &RawImageData) -> Result<CalibrationReport> {
        self.validate(raw)?;
        let debug = self.debug_writer()?;
        let mut timings = PipelineTimings::new();
        let params = self.base_params();
        info!(
            "Calibrating {}x{} {}-bit frame",
            raw.width, raw.height, raw.bits_per_sample
        );

        let plane = timings.time(CalibrationStep::Normalize, || self.isp.normalize(&params, raw))?;

        let patches = {
            let _span = info_span!("detect_chart").entered();
            let detector = ChartDetector::new(self.config.detector.clone(), self.parallelism())
                .with_debug(debug.clone());
            let gray = plane.to_gray8();
            timings.time(CalibrationStep::DetectChart, || {
                detector.detect(&gray, self.config.patches_wide, self.config.patches_high)
            })?
        };

        self.calibrate(raw, plane, patches, params, debug, timings)
    }

    /// Calibrate with patches located elsewhere, given in chart order.
    #[instrument(skip_all, fields(width = raw.width, height = raw.height, patches = patches.len()))]
    pub fn run_with_patches(&self, raw: &RawImageData, patches: Vec<ColorPatch>) -> Result<CalibrationReport> {
        self.validate(raw)?;
        if patches.len() != self.chart.len() {
            return Err(CalibrationError::ChartNotFound(format!(
                "{} patches supplied for a {} cell chart",
                patches.len(),
                self.chart.len()
            )));
        }
        let debug = self.debug_writer()?;
        let mut timings = PipelineTimings::new();
        let params = self.base_params();

        let plane = timings.time(CalibrationStep::Normalize, || self.isp.normalize(&params, raw))?;
        self.calibrate(raw, plane, patches, params, debug, timings)
    }

    /// Read a frame with `reader` and run [`Self::run`] on it.
    pub fn run_file(&self, reader: &dyn RawImageReader, path: &Path) -> Result<CalibrationReport> {
        info!("Reading {}", path.display());
        let start = Instant::now();
        let raw = reader.read_file(path)?;
        let read = start.elapsed();

        let mut report = self.run(&raw)?;
        report.timings.record(CalibrationStep::ReadInput, read);
        Ok(report)
    }

    fn calibrate(
        &self,
        raw: &RawImageData,
        plane: MosaicPlane,
        patches: Vec<ColorPatch>,
        mut params: IspConfig,
        debug: DebugImageWriter,
        mut timings: PipelineTimings,
    ) -> Result<CalibrationReport> {
        let mosaic = params.bayer_pattern;
        let statistics = PatchStatistics::new(self.parallelism());
        let modeler = ResponseModeler::new(self.chart.clone());
        let synthesizer = ParameterSynthesizer::new(self.chart.clone(), &self.solver);

        let measure_mosaic = |image: &MosaicPlane, stage: MeasurementStage| {
            let _span = info_span!("measure", stage = stage.name()).entered();
            let measured_image = MeasuredImage::mosaic(image, &mosaic);
            let measured = statistics.measure(measured_image, &patches, stage)?;
            let response = modeler.fit_measurements(&measured)?;
            debug.save_rgb(&format!("response_{}", stage.name()), || {
                debug_images::response_scatter(measured_image, &patches, &measured, &self.chart, &response)
            });
            Ok::<_, CalibrationError>((measured, response))
        };

        let (raw_measured, raw_response) =
            timings.time(CalibrationStep::Measure(MeasurementStage::Raw), || measure_mosaic(&plane, MeasurementStage::Raw))?;
        debug.save_gray("clamped_pixels_raw", || debug_images::clamped_pixels(&plane));

        let black_level = if self.config.estimate_black_level {
            let _span = info_span!("estimate_black_level").entered();
            let estimator = BlackLevelEstimator::new(self.config.black_level.clone(), self.parallelism())
                .with_debug(debug.clone());
            timings.time(CalibrationStep::EstimateBlackLevel, || estimator.estimate(raw, &plane, &mosaic))?
        } else {
            // Zero reflectance on the raw response line
            let level = raw_response.intercepts_y().map(|b| b.max(0.0));
            info!(
                "Black level from response intercept: [{:.5}, {:.5}, {:.5}]",
                level.x, level.y, level.z
            );
            level
        };
        let counts = black_level * raw.max_pixel_value() as f32;
        params.black_level = [counts.x, counts.y, counts.z];

        let adjusted = timings.time(CalibrationStep::BlackLevelAdjust, || self.isp.black_level_adjust(&params, &plane))?;
        let (adjusted_measured, adjusted_response) = timings.time(CalibrationStep::Measure(MeasurementStage::BlackLevelAdjusted), || {
            measure_mosaic(&adjusted, MeasurementStage::BlackLevelAdjusted)
        })?;

        params.white_balance_gain = synthesizer.white_balance_gains(&adjusted_response);
        let balanced = timings.time(CalibrationStep::WhiteBalance, || self.isp.white_balance(&params, &adjusted, false))?;
        let (balanced_measured, balanced_response) = timings.time(CalibrationStep::Measure(MeasurementStage::WhiteBalanced), || {
            measure_mosaic(&balanced, MeasurementStage::WhiteBalanced)
        })?;

        let bounds = synthesizer.clamp_bounds(
            &balanced_response,
            self.config.clamp_reflectance_min,
            self.config.clamp_reflectance_max,
        );
        params.clamp_min = bounds.min;
        params.clamp_max = bounds.max;
        let stretched = timings.time(CalibrationStep::ClampAndStretch, || self.isp.clamp_and_stretch(&params, &balanced))?;
        debug.save_gray("clamped_pixels", || debug_images::clamped_pixels(&stretched));

        let demosaiced = timings.time(CalibrationStep::Demosaic, || self.isp.demosaic(&params, &stretched))?;
        debug.save_rgb("demosaiced", || demosaiced.to_rgb8());
        let demosaiced_measured = timings.time(CalibrationStep::Measure(MeasurementStage::Demosaiced), || {
            statistics.measure(MeasuredImage::Rgb(&demosaiced), &patches, MeasurementStage::Demosaiced)
        })?;

        params.ccm = timings.time(CalibrationStep::SolveColorCorrection, || {
            synthesizer.color_correction_matrix(&demosaiced_measured)
        })?;
        let corrected = timings.time(CalibrationStep::ColorCorrect, || self.isp.color_correct(&params, &demosaiced))?;
        debug.save_rgb("color_corrected", || corrected.to_rgb8());

        let evaluator = ErrorEvaluator::new(self.chart.clone(), statistics);
        let errors = timings.time(CalibrationStep::Evaluate, || evaluator.evaluate(&demosaiced, &corrected, &patches))?;

        info!(
            "Calibration complete: {}x{} in {:.3}ms",
            raw.width,
            raw.height,
            timings.total_duration().as_secs_f64() * 1000.0
        );

        Ok(CalibrationReport {
            params,
            black_level,
            raw_response,
            responses: vec![
                (MeasurementStage::BlackLevelAdjusted, adjusted_response),
                (MeasurementStage::WhiteBalanced, balanced_response),
            ],
            patches,
            measurements: vec![raw_measured, adjusted_measured, balanced_measured, demosaiced_measured],
            errors,
            demosaiced,
            corrected,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::patch::PixelMask;
    use crate::calibration::regression::LeastSquaresSolver;
    use crate::image_pipeline::raw::BayerPattern;
    use nalgebra::{Matrix3, Point2};
    use std::sync::{Arc, Mutex};

    const BLACK: f32 = 0.05;
    const SLOPES: [f32; 3] = [0.5, 0.8, 0.6];
    const MARGIN: usize = 16;
    const CELL: usize = 24;
    const DOT: (usize, usize, usize) = (180, 64, 10);

    fn sensor_value(channel: usize, reflectance: f32) -> u16 {
        ((BLACK + SLOPES[channel] * reflectance) * 65535.0).round() as u16
    }

    /// Chart cells on a gray card with a round black target to the right.
    fn scene(chart: &ReferenceChart, pattern: BayerPattern) -> (RawImageData, Vec<ColorPatch>) {
        let (width, height) = (MARGIN * 2 + CELL * 6 + 40, MARGIN * 2 + CELL * 4);
        let cell_origin = |i: usize| (MARGIN + (i % 6) * CELL, MARGIN + (i / 6) * CELL);
        let mut data = vec![0u16; width * height];
        for y in 0..height {
            for x in 0..width {
                let ch = pattern.channel_at(y, x).index();
                let (dx, dy) = (x as i64 - DOT.0 as i64, y as i64 - DOT.1 as i64);
                data[y * width + x] = if dx * dx + dy * dy <= (DOT.2 * DOT.2) as i64 {
                    (BLACK * 65535.0).round() as u16
                } else {
                    sensor_value(ch, 0.5)
                };
            }
        }

        let mut patches = Vec::new();
        for i in 0..chart.len() {
            let (cx, cy) = cell_origin(i);
            let reflectance = chart.normalized(i);
            for y in cy + 2..cy + CELL - 2 {
                for x in cx + 2..cx + CELL - 2 {
                    let ch = pattern.channel_at(y, x).index();
                    data[y * width + x] = sensor_value(ch, reflectance[ch]);
                }
            }
            let mask = PixelMask::from_rect(cx as i64 + 4, cy as i64 + 4, 16, 16, width, height);
            let center = Point2::new((cx + CELL / 2) as f32, (cy + CELL / 2) as f32);
            patches.push(ColorPatch::new(center, mask));
        }
        (RawImageData::new(width, height, data, 16).unwrap(), patches)
    }

    fn quick_config() -> CalibrationConfig {
        CalibrationConfig::builder().parallel(false).build()
    }

    /// CPU ISP that records which stages ran.
    struct RecordingIsp {
        inner: CpuIsp,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl RecordingIsp {
        fn record(&self, stage: &'static str) {
            self.calls.lock().unwrap().push(stage);
        }
    }

    impl CameraIsp for RecordingIsp {
        fn normalize(&self, config: &IspConfig, raw: &RawImageData) -> Result<MosaicPlane> {
            self.record("normalize");
            self.inner.normalize(config, raw)
        }

        fn black_level_adjust(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<MosaicPlane> {
            self.record("black_level_adjust");
            self.inner.black_level_adjust(config, plane)
        }

        fn white_balance(&self, config: &IspConfig, plane: &MosaicPlane, clamp: bool) -> Result<MosaicPlane> {
            assert!(!clamp, "calibration white balance must not clamp");
            self.record("white_balance");
            self.inner.white_balance(config, plane, clamp)
        }

        fn clamp_and_stretch(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<MosaicPlane> {
            self.record("clamp_and_stretch");
            self.inner.clamp_and_stretch(config, plane)
        }

        fn demosaic(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<RgbImageData> {
            self.record("demosaic");
            self.inner.demosaic(config, plane)
        }

        fn color_correct(&self, config: &IspConfig, rgb: &RgbImageData) -> Result<RgbImageData> {
            self.record("color_correct");
            self.inner.color_correct(config, rgb)
        }
    }

    struct FailingSolver;

    impl RegressionSolver for FailingSolver {
        fn solve(&self, _inputs: &[Vector3<f32>], _outputs: &[Vector3<f32>]) -> Result<Matrix3<f32>> {
            Err(CalibrationError::Regression("Mock solver error".to_string()))
        }
    }

    #[test]
    fn test_recovers_sensor_model() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let pipeline = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, CalibrationConfig::default());
        let report = pipeline.run_with_patches(&raw, patches).unwrap();

        for ch in 0..3 {
            assert!((report.black_level[ch] - BLACK).abs() < 1e-4, "{:?}", report.black_level);
            let expected_gain = (1.0 - BLACK) / SLOPES[ch];
            assert!((report.params.white_balance_gain[ch] / expected_gain - 1.0).abs() < 0.01);
            assert!(report.params.clamp_min[ch] < 0.01);
            assert!(report.params.clamp_max[ch] > 0.99);
            for col in 0..3 {
                let identity = if ch == col { 1.0 } else { 0.0 };
                assert!((report.params.ccm[ch][col] - identity).abs() < 0.02, "{:?}", report.params.ccm);
            }
        }
        assert!((report.params.black_level[0] - 3277.0).abs() < 1.0);
        assert!(report.errors.1.mean_euclidean < 1.0, "{:?}", report.errors);
        assert_eq!(report.measurements.len(), 4);
    }

    #[test]
    fn test_white_balanced_response_has_unit_slope() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Grbg);
        let config = CalibrationConfig::builder()
            .isp(IspConfig::with_pattern(BayerPattern::Grbg))
            .parallel(false)
            .build();
        let report = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, config)
            .run_with_patches(&raw, patches)
            .unwrap();

        let raw_slopes = report.raw_response.slopes();
        let balanced = report.response(MeasurementStage::WhiteBalanced).unwrap();
        for ch in 0..3 {
            assert!((raw_slopes[ch] - SLOPES[ch]).abs() < 1e-3);
            assert!((balanced.channels[ch].slope - 1.0).abs() < 1e-3);
            assert!(balanced.channels[ch].intercept_y.abs() < 1e-3);
        }
    }

    #[test]
    fn test_intercept_fallback_for_black_level() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let config = CalibrationConfig::builder().estimate_black_level(false).build();
        let report = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, config)
            .run_with_patches(&raw, patches)
            .unwrap();
        for ch in 0..3 {
            assert!((report.black_level[ch] - BLACK).abs() < 1e-3);
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let isp = RecordingIsp {
            inner: CpuIsp::new(Parallelism::Sequential),
            calls: calls.clone(),
        };
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        CalibrationPipeline::with_custom(isp, LeastSquaresSolver, quick_config())
            .run_with_patches(&raw, patches)
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "normalize",
                "black_level_adjust",
                "white_balance",
                "clamp_and_stretch",
                "demosaic",
                "color_correct"
            ]
        );
    }

    #[test]
    fn test_parameters_reproduce_calibrated_image() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Bggr);
        let config = CalibrationConfig::builder()
            .isp(IspConfig::with_pattern(BayerPattern::Bggr))
            .gamma([0.8, 1.0, 1.2])
            .build();
        let isp = CpuIsp::default();
        let report = CalibrationPipeline::with_custom(isp.clone(), LeastSquaresSolver, config)
            .run_with_patches(&raw, patches.clone())
            .unwrap();

        let developed = isp.develop(&report.params, &raw).unwrap();
        assert_eq!(developed, report.corrected);

        let statistics = PatchStatistics::default();
        let first = statistics
            .measure(MeasuredImage::Rgb(&report.corrected), &patches, MeasurementStage::ColorCorrected)
            .unwrap();
        let second = statistics
            .measure(MeasuredImage::Rgb(&developed), &patches, MeasurementStage::ColorCorrected)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_solver_failure_aborts_run() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let result = CalibrationPipeline::with_custom(CpuIsp::default(), FailingSolver, quick_config())
            .run_with_patches(&raw, patches);
        assert!(matches!(result, Err(CalibrationError::Regression(_))));
    }

    #[test]
    fn test_rejects_incomplete_patch_list() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, mut patches) = scene(&chart, BayerPattern::Rggb);
        patches.truncate(5);
        let result = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, quick_config())
            .run_with_patches(&raw, patches);
        assert!(matches!(result, Err(CalibrationError::ChartNotFound(_))));
    }

    #[test]
    fn test_rejects_chart_size_mismatch() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let config = CalibrationConfig::builder().patches(4, 3).build();
        let result = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, config)
            .run_with_patches(&raw, patches);
        assert!(matches!(result, Err(CalibrationError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_custom_chart_layout() {
        let macbeth = ReferenceChart::macbeth_linear();
        let values = (0..macbeth.len())
            .map(|i| {
                let rgb = macbeth.rgb(i);
                [rgb.x as u8, rgb.y as u8, rgb.z as u8]
            })
            .collect();
        let chart = ReferenceChart::new(8, 3, values).unwrap();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);

        let config = CalibrationConfig::builder().patches(8, 3).build();
        let pipeline = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, config)
            .with_chart(chart);
        assert_eq!(pipeline.chart().patches_wide(), 8);
        let report = pipeline.run_with_patches(&raw, patches).unwrap();
        assert!((report.black_level[1] - BLACK).abs() < 1e-4);
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let config = CalibrationConfig::builder().max_dimension(Some(100)).build();
        let result = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, config)
            .run_with_patches(&raw, patches);
        assert!(matches!(result, Err(CalibrationError::InvalidDimensions(_, _))));
    }

    #[test]
    fn test_debug_images_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let debug_dir = dir.path().join("debug");
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let config = CalibrationConfig::builder().debug_dir(Some(debug_dir.clone())).build();
        CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, config)
            .run_with_patches(&raw, patches)
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(&debug_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        for suffix in ["_response_raw.png", "_black_hole_mask.png", "_clamped_pixels.png", "_color_corrected.png"] {
            assert!(names.iter().any(|n| n.ends_with(suffix)), "missing {suffix} in {names:?}");
        }
    }

    #[test]
    fn test_timings_cover_stages() {
        let chart = ReferenceChart::macbeth_linear();
        let (raw, patches) = scene(&chart, BayerPattern::Rggb);
        let report = CalibrationPipeline::with_custom(CpuIsp::default(), LeastSquaresSolver, quick_config())
            .run_with_patches(&raw, patches)
            .unwrap();
        for step in [
            CalibrationStep::Normalize,
            CalibrationStep::Measure(MeasurementStage::BlackLevelAdjusted),
            CalibrationStep::EstimateBlackLevel,
            CalibrationStep::Demosaic,
            CalibrationStep::SolveColorCorrection,
            CalibrationStep::Evaluate,
        ] {
            assert!(report.timings.get(step).is_some(), "missing {step}");
        }
        assert!(report.timings.get(CalibrationStep::DetectChart).is_none());
    }
}
