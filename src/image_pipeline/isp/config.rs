//! ISP configuration file format.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::debayer::cpu_debayer::DemosaicFilter;
use crate::image_pipeline::raw::BayerPattern;

pub const IDENTITY_CCM: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Settings for every ISP stage. Unset stages default to identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IspConfig {
    pub bayer_pattern: BayerPattern,
    /// Per-channel black level in sensor counts
    pub black_level: [f32; 3],
    pub white_balance_gain: [f32; 3],
    /// Normalized clamp levels applied before stretching
    pub clamp_min: [f32; 3],
    pub clamp_max: [f32; 3],
    /// Row-major, `out = ccm * in`
    pub ccm: [[f32; 3]; 3],
    pub gamma: [f32; 3],
    pub demosaic_filter: DemosaicFilter,
}

impl Default for IspConfig {
    fn default() -> Self {
        Self {
            bayer_pattern: BayerPattern::default(),
            black_level: [0.0; 3],
            white_balance_gain: [1.0; 3],
            clamp_min: [0.0; 3],
            clamp_max: [1.0; 3],
            ccm: IDENTITY_CCM,
            gamma: [1.0; 3],
            demosaic_filter: DemosaicFilter::default(),
        }
    }
}

impl IspConfig {
    pub fn with_pattern(bayer_pattern: BayerPattern) -> Self {
        Self {
            bayer_pattern,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CalibrationError::FileAccess(format!("invalid ISP config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading ISP config from {}", path.display());
        let json = std::fs::read_to_string(path).map_err(|e| CalibrationError::file_access(path, e))?;
        Self::from_json(&json)
    }

    /// Persist the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CalibrationError::EncodeError(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CalibrationError::file_access(path, e))
    }
}
