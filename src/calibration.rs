//! Color calibration from a photographed reference chart
//!
//! The chart is located in the raw frame and split into patches, the sensor
//! response is fitted on the gray ramp, and the ISP parameters (black level,
//! white balance, clamp levels and color correction matrix) are derived
//! stage by stage through a [`CameraIsp`](crate::image_pipeline::CameraIsp).

pub mod black_level;
pub mod config;
pub mod debug;
pub mod detector;
pub mod evaluation;
pub mod geometry;
pub mod output;
pub mod patch;
pub mod pipeline;
pub mod reference;
pub mod regression;
pub mod response;
pub mod segmentation;
pub mod statistics;
pub mod synthesis;
pub mod timing;

pub use black_level::{BlackLevelConfig, BlackLevelEstimator};
pub use config::{CalibrationConfig, CalibrationConfigBuilder};
pub use debug::DebugImageWriter;
pub use detector::{ChartDetector, DetectorConfig};
pub use evaluation::{ColorError, ErrorEvaluator};
pub use output::{write_outputs, OutputFiles};
pub use patch::{ColorPatch, MeasurementStage, PatchMeasurements, PixelMask};
pub use pipeline::{CalibrationPipeline, CalibrationReport};
pub use reference::ReferenceChart;
pub use regression::{GradientDescentSolver, LeastSquaresSolver, RegressionSolver};
pub use response::{ChannelResponse, ColorResponse, ResponseModeler};
pub use statistics::{MeasuredImage, PatchStatistics};
pub use synthesis::{ClampBounds, ParameterSynthesizer};
pub use timing::{CalibrationStep, Phase, PipelineTimings};
