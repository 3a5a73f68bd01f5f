//! Common utilities module
//!
//! This module contains shared utilities used across the image pipeline
//! and the calibration stages.

pub mod error;
pub mod parallel;

pub use error::{CalibrationError, Result};
pub use parallel::Parallelism;
