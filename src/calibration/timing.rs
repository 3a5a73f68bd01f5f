//! Wall-clock accounting for a calibration run.
//!
//! Every recorded step belongs to a [`Phase`]: reading the frame, running an
//! ISP stage, or analysing the chart (detection, medians, fits, solves).

use std::fmt;
use std::time::{Duration, Instant};

use tracing::info;

use crate::calibration::patch::MeasurementStage;

/// Coarse grouping used by the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Input,
    Isp,
    Analysis,
}

/// One timed step of [`crate::calibration::CalibrationPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationStep {
    ReadInput,
    Normalize,
    DetectChart,
    Measure(MeasurementStage),
    EstimateBlackLevel,
    BlackLevelAdjust,
    WhiteBalance,
    ClampAndStretch,
    Demosaic,
    SolveColorCorrection,
    ColorCorrect,
    Evaluate,
}

impl CalibrationStep {
    pub fn phase(self) -> Phase {
        match self {
            CalibrationStep::ReadInput => Phase::Input,
            CalibrationStep::Normalize
            | CalibrationStep::BlackLevelAdjust
            | CalibrationStep::WhiteBalance
            | CalibrationStep::ClampAndStretch
            | CalibrationStep::Demosaic
            | CalibrationStep::ColorCorrect => Phase::Isp,
            CalibrationStep::DetectChart
            | CalibrationStep::Measure(_)
            | CalibrationStep::EstimateBlackLevel
            | CalibrationStep::SolveColorCorrection
            | CalibrationStep::Evaluate => Phase::Analysis,
        }
    }
}

impl fmt::Display for CalibrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationStep::ReadInput => "read input",
            CalibrationStep::Normalize => "normalize",
            CalibrationStep::DetectChart => "detect chart",
            CalibrationStep::Measure(stage) => return write!(f, "measure {}", stage.name()),
            CalibrationStep::EstimateBlackLevel => "estimate black level",
            CalibrationStep::BlackLevelAdjust => "black level adjust",
            CalibrationStep::WhiteBalance => "white balance",
            CalibrationStep::ClampAndStretch => "clamp and stretch",
            CalibrationStep::Demosaic => "demosaic",
            CalibrationStep::SolveColorCorrection => "solve ccm",
            CalibrationStep::ColorCorrect => "color correct",
            CalibrationStep::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// Durations of a calibration run in execution order.
#[derive(Debug, Clone, Default)]
pub struct PipelineTimings {
    records: Vec<(CalibrationStep, Duration)>,
}

impl PipelineTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: CalibrationStep, duration: Duration) {
        self.records.push((step, duration));
    }

    /// Run `f` and record its duration under `step`.
    pub fn time<T>(&mut self, step: CalibrationStep, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.record(step, start.elapsed());
        out
    }

    /// Summed duration of `step`, `None` if it never ran.
    pub fn get(&self, step: CalibrationStep) -> Option<Duration> {
        self.records
            .iter()
            .filter(|(s, _)| *s == step)
            .map(|(_, d)| *d)
            .reduce(|a, b| a + b)
    }

    pub fn phase_duration(&self, phase: Phase) -> Duration {
        self.records.iter().filter(|(s, _)| s.phase() == phase).map(|(_, d)| *d).sum()
    }

    pub fn total_duration(&self) -> Duration {
        self.records.iter().map(|(_, d)| *d).sum()
    }

    pub fn records(&self) -> &[(CalibrationStep, Duration)] {
        &self.records
    }

    /// One line per step, then the split between ISP work and chart analysis.
    pub fn log_summary(&self) {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        for (step, duration) in &self.records {
            info!(step = %step, phase = ?step.phase(), "{:>9.2}ms", ms(*duration));
        }
        info!(
            input_ms = ms(self.phase_duration(Phase::Input)),
            isp_ms = ms(self.phase_duration(Phase::Isp)),
            analysis_ms = ms(self.phase_duration(Phase::Analysis)),
            "calibration took {:.2}ms",
            ms(self.total_duration())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurements_accumulate_per_stage() {
        let mut timings = PipelineTimings::new();
        let raw = CalibrationStep::Measure(MeasurementStage::Raw);
        timings.record(raw, Duration::from_millis(2));
        timings.record(CalibrationStep::Demosaic, Duration::from_millis(5));
        timings.record(raw, Duration::from_millis(3));
        assert_eq!(timings.records().len(), 3);
        assert_eq!(timings.get(raw), Some(Duration::from_millis(5)));
        assert_eq!(timings.get(CalibrationStep::Measure(MeasurementStage::Demosaiced)), None);
        assert_eq!(timings.total_duration(), Duration::from_millis(10));
    }

    #[test]
    fn test_phases_split_isp_from_analysis() {
        let mut timings = PipelineTimings::new();
        timings.record(CalibrationStep::ReadInput, Duration::from_millis(7));
        timings.record(CalibrationStep::WhiteBalance, Duration::from_millis(1));
        timings.record(CalibrationStep::ColorCorrect, Duration::from_millis(2));
        timings.record(CalibrationStep::DetectChart, Duration::from_millis(4));
        timings.record(CalibrationStep::SolveColorCorrection, Duration::from_millis(8));
        assert_eq!(timings.phase_duration(Phase::Input), Duration::from_millis(7));
        assert_eq!(timings.phase_duration(Phase::Isp), Duration::from_millis(3));
        assert_eq!(timings.phase_duration(Phase::Analysis), Duration::from_millis(12));
    }

    #[test]
    fn test_time_returns_closure_value() {
        let mut timings = PipelineTimings::new();
        let value = timings.time(CalibrationStep::Evaluate, || 42);
        assert_eq!(value, 42);
        assert!(timings.get(CalibrationStep::Evaluate).is_some());
    }

    #[test]
    fn test_step_names() {
        assert_eq!(CalibrationStep::Measure(MeasurementStage::WhiteBalanced).to_string(), "measure white_balanced");
        assert_eq!(CalibrationStep::SolveColorCorrection.to_string(), "solve ccm");
    }
}
