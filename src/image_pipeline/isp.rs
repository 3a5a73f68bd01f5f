//! Image signal processor used to apply calibration parameters
//!
//! The ISP is modelled as pure stage functions over an [`IspConfig`], so the
//! calibration code can re-run any stage on any intermediate image.

pub mod config;
mod cpu_isp;

pub use config::{IspConfig, IDENTITY_CCM};
pub use cpu_isp::{CameraIsp, CpuIsp};
