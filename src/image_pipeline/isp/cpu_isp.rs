//! CPU implementation of the ISP stages used during calibration.

use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::common::parallel::{self, Parallelism};
use crate::image_pipeline::debayer::{CpuDebayer, RgbImageData};
use crate::image_pipeline::isp::config::IspConfig;
use crate::image_pipeline::raw::{MosaicPlane, RawImageData};
use crate::image_pipeline::raw::types::max_pixel_value;

/// Image signal processor seen as a set of pure stage functions.
///
/// Every stage takes the full configuration and an input image and returns a
/// new image; no state is carried between calls.
pub trait CameraIsp: Send + Sync {
    /// Sensor counts to a normalized [0, 1] mosaic.
    fn normalize(&self, config: &IspConfig, raw: &RawImageData) -> Result<MosaicPlane>;

    fn black_level_adjust(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<MosaicPlane>;

    fn white_balance(&self, config: &IspConfig, plane: &MosaicPlane, clamp: bool) -> Result<MosaicPlane>;

    fn clamp_and_stretch(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<MosaicPlane>;

    fn demosaic(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<RgbImageData>;

    /// Applies the color correction matrix followed by gamma.
    fn color_correct(&self, config: &IspConfig, rgb: &RgbImageData) -> Result<RgbImageData>;

    /// Run every stage in order on a raw frame.
    fn develop(&self, config: &IspConfig, raw: &RawImageData) -> Result<RgbImageData> {
        let plane = self.normalize(config, raw)?;
        let plane = self.black_level_adjust(config, &plane)?;
        let plane = self.white_balance(config, &plane, false)?;
        let plane = self.clamp_and_stretch(config, &plane)?;
        let rgb = self.demosaic(config, &plane)?;
        self.color_correct(config, &rgb)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CpuIsp {
    parallelism: Parallelism,
}

impl CpuIsp {
    pub fn new(parallelism: Parallelism) -> Self {
        Self { parallelism }
    }

    /// Per-pixel map over a mosaic where `f` receives the channel index.
    fn map_mosaic<F>(&self, config: &IspConfig, plane: &MosaicPlane, f: F) -> MosaicPlane
    where
        F: Fn(usize, f32) -> f32 + Sync + Send,
    {
        let pattern = config.bayer_pattern;
        let mut out = plane.clone();
        parallel::for_each_row(&mut out.data, plane.width, self.parallelism, |y, row| {
            for (x, v) in row.iter_mut().enumerate() {
                *v = f(pattern.channel_at(y, x).index(), *v);
            }
        });
        out
    }
}

impl CameraIsp for CpuIsp {
    fn normalize(&self, _config: &IspConfig, raw: &RawImageData) -> Result<MosaicPlane> {
        if raw.width == 0 || raw.height == 0 {
            return Err(CalibrationError::InvalidDimensions(raw.width, raw.height));
        }
        let scale = 1.0 / raw.max_pixel_value() as f32;
        let mut data = vec![0.0f32; raw.data.len()];
        parallel::for_each_row(&mut data, raw.width, self.parallelism, |y, row| {
            let src = &raw.data[y * raw.width..(y + 1) * raw.width];
            for (dst, &s) in row.iter_mut().zip(src) {
                *dst = (s as f32 * scale).min(1.0);
            }
        });
        Ok(MosaicPlane::new(raw.width, raw.height, data, raw.bits_per_sample))
    }

    #[instrument(skip_all)]
    fn black_level_adjust(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<MosaicPlane> {
        let max_value = max_pixel_value(plane.bits_per_sample) as f32;
        let black = config.black_level.map(|b| b / max_value);
        debug!("Black level (normalized): {:?}", black);
        if black.iter().any(|&b| !(0.0..1.0).contains(&b)) {
            return Err(CalibrationError::UnsupportedFormat(format!(
                "black level {:?} outside sensor range",
                config.black_level
            )));
        }
        Ok(self.map_mosaic(config, plane, |ch, v| ((v - black[ch]) / (1.0 - black[ch])).max(0.0)))
    }

    #[instrument(skip(self, config, plane))]
    fn white_balance(&self, config: &IspConfig, plane: &MosaicPlane, clamp: bool) -> Result<MosaicPlane> {
        let gain = config.white_balance_gain;
        debug!("White balance gains: {:?}", gain);
        Ok(self.map_mosaic(config, plane, |ch, v| {
            let out = v * gain[ch];
            if clamp { out.clamp(0.0, 1.0) } else { out }
        }))
    }

    #[instrument(skip_all)]
    fn clamp_and_stretch(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<MosaicPlane> {
        let (lo, hi) = (config.clamp_min, config.clamp_max);
        debug!("Clamp min {:?}, max {:?}", lo, hi);
        if (0..3).any(|ch| hi[ch] <= lo[ch]) {
            return Err(CalibrationError::UnsupportedFormat(format!(
                "empty clamp range: min {:?}, max {:?}",
                lo, hi
            )));
        }
        Ok(self.map_mosaic(config, plane, |ch, v| {
            (v.clamp(lo[ch], hi[ch]) - lo[ch]) / (hi[ch] - lo[ch])
        }))
    }

    #[instrument(skip_all)]
    fn demosaic(&self, config: &IspConfig, plane: &MosaicPlane) -> Result<RgbImageData> {
        CpuDebayer::new(config.bayer_pattern, config.demosaic_filter).process(plane)
    }

    #[instrument(skip_all)]
    fn color_correct(&self, config: &IspConfig, rgb: &RgbImageData) -> Result<RgbImageData> {
        let ccm = config.ccm;
        let gamma = config.gamma;
        let mut out = rgb.clone();
        parallel::for_each_row(&mut out.data, rgb.width * 3, self.parallelism, |_, row| {
            for px in row.chunks_exact_mut(3) {
                let src = [px[0], px[1], px[2]];
                for (ch, dst) in px.iter_mut().enumerate() {
                    let v = ccm[ch][0] * src[0] + ccm[ch][1] * src[1] + ccm[ch][2] * src[2];
                    *dst = v.clamp(0.0, 1.0).powf(gamma[ch]);
                }
            }
        });
        Ok(out)
    }
}
