pub mod calibration;
pub mod image_pipeline;
pub mod logger;
