use std::io::Cursor;

use bayer::{BayerDepth, Demosaic, RasterDepth, RasterMut};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::debayer::RgbImageData;
use crate::image_pipeline::raw::{BayerPattern, MosaicPlane};

/// Interpolation used to fill in the two missing channels of each pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemosaicFilter {
    NearestNeighbour,
    #[default]
    Bilinear,
    Cubic,
}

impl DemosaicFilter {
    fn to_bayer(self) -> Demosaic {
        match self {
            DemosaicFilter::NearestNeighbour => Demosaic::NearestNeighbour,
            DemosaicFilter::Bilinear => Demosaic::Linear,
            DemosaicFilter::Cubic => Demosaic::Cubic,
        }
    }
}

/// Full scale used when handing normalized samples to the bayer crate.
const SAMPLE_SCALE: f32 = u16::MAX as f32;

pub struct CpuDebayer {
    pattern: BayerPattern,
    filter: DemosaicFilter,
}

impl CpuDebayer {
    pub fn new(pattern: BayerPattern, filter: DemosaicFilter) -> Self {
        Self { pattern, filter }
    }

    /// Demosaic a normalized plane into a normalized RGB image.
    pub fn process(&self, plane: &MosaicPlane) -> Result<RgbImageData> {
        let width = plane.width;
        let height = plane.height;
        debug!(
            "Demosaicing {}x{} plane, CFA={:?}, filter={:?}",
            width, height, self.pattern, self.filter
        );

        if width < 2 || height < 2 {
            return Err(CalibrationError::InvalidDimensions(width, height));
        }

        // The bayer crate works on 16-bit little endian samples
        let bayer_bytes: Vec<u8> = plane
            .data
            .iter()
            .flat_map(|&v| (((v.clamp(0.0, 1.0)) * SAMPLE_SCALE).round() as u16).to_le_bytes())
            .collect();

        let bytes_per_pixel = 2;
        let mut output_buf = vec![0u8; width * height * 3 * bytes_per_pixel];
        let mut cursor = Cursor::new(&bayer_bytes[..]);

        {
            let mut output_raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);
            bayer::run_demosaic(
                &mut cursor,
                BayerDepth::Depth16LE,
                self.pattern.to_cfa(),
                self.filter.to_bayer(),
                &mut output_raster,
            )
            .map_err(|e| CalibrationError::EncodeError(format!("Demosaic failed: {:?}", e)))?;
        }

        let data: Vec<f32> = output_buf
            .chunks_exact(bytes_per_pixel)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as f32 / SAMPLE_SCALE)
            .collect();

        Ok(RgbImageData::new(width, height, data, plane.bits_per_sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_channels_survive_demosaic() {
        // RGGB mosaic of a flat color patch
        let (w, h) = (16, 12);
        let rgb = [0.6f32, 0.3, 0.1];
        let data = (0..h)
            .flat_map(|y| (0..w).map(move |x| rgb[BayerPattern::Rggb.channel_at(y, x).index()]))
            .collect();
        let plane = MosaicPlane::new(w, h, data, 16);

        let out = CpuDebayer::new(BayerPattern::Rggb, DemosaicFilter::Bilinear)
            .process(&plane)
            .unwrap();

        let center = out.pixel(8, 6);
        for ch in 0..3 {
            assert!((center[ch] - rgb[ch]).abs() < 1e-3, "channel {ch}: {:?}", center);
        }
    }

    #[test]
    fn test_rejects_degenerate_plane() {
        let plane = MosaicPlane::filled(1, 5, 0.5, 16);
        let result = CpuDebayer::new(BayerPattern::Rggb, DemosaicFilter::Bilinear).process(&plane);
        assert!(matches!(result, Err(CalibrationError::InvalidDimensions(1, 5))));
    }
}
