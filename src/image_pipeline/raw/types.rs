//! RAW image data types

use crate::image_pipeline::common::error::{CalibrationError, Result};

/// Sample depths a u16 mosaic can carry.
pub const SUPPORTED_BITS_PER_SAMPLE: std::ops::RangeInclusive<u32> = 1..=16;

/// Represents decoded RAW image data
#[derive(Debug, Clone)]
pub struct RawImageData {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// Raw pixel data (single channel Bayer pattern)
    pub data: Vec<u16>,
    /// Bits per sample used for normalization (8 or 16 for mosaic files)
    pub bits_per_sample: u32,
}

impl RawImageData {
    pub fn new(width: usize, height: usize, data: Vec<u16>, bits_per_sample: u32) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(CalibrationError::InvalidDimensions(width, height));
        }
        if !SUPPORTED_BITS_PER_SAMPLE.contains(&bits_per_sample) {
            return Err(CalibrationError::UnsupportedFormat(format!(
                "{} bits per sample, expected 1 to 16",
                bits_per_sample
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            bits_per_sample,
        })
    }

    /// Largest representable sample, `2^bits - 1`.
    pub fn max_pixel_value(&self) -> u32 {
        max_pixel_value(self.bits_per_sample)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.width + x]
    }
}

pub fn max_pixel_value(bits_per_sample: u32) -> u32 {
    ((1u64 << bits_per_sample.min(32)) - 1) as u32
}

/// Single-channel floating point image in [0, 1].
///
/// Holds a normalized mosaic (one sample per pixel) as produced by the ISP
/// before demosaicing.
#[derive(Debug, Clone, PartialEq)]
pub struct MosaicPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
    /// Bit depth of the sensor data this plane was normalized from
    pub bits_per_sample: u32,
}

impl MosaicPlane {
    pub fn new(width: usize, height: usize, data: Vec<f32>, bits_per_sample: u32) -> Self {
        assert_eq!(data.len(), width * height, "plane length must equal width * height");
        Self {
            width,
            height,
            data,
            bits_per_sample,
        }
    }

    pub fn filled(width: usize, height: usize, value: f32, bits_per_sample: u32) -> Self {
        Self::new(width, height, vec![value; width * height], bits_per_sample)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// 8-bit rendition used for chart detection and debug images.
    pub fn to_gray8(&self) -> image::GrayImage {
        image::GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.get(x as usize, y as usize);
            image::Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_pixel_value() {
        assert_eq!(max_pixel_value(8), 255);
        assert_eq!(max_pixel_value(12), 4095);
        assert_eq!(max_pixel_value(16), 65535);
    }

    #[test]
    fn test_raw_image_rejects_bad_length() {
        let result = RawImageData::new(4, 4, vec![0; 15], 16);
        assert!(matches!(result, Err(CalibrationError::InvalidDimensions(4, 4))));
    }

    #[test]
    fn test_raw_image_rejects_bit_depth_outside_u16() {
        for bits in [0, 17, 32] {
            let result = RawImageData::new(2, 2, vec![0; 4], bits);
            assert!(matches!(result, Err(CalibrationError::UnsupportedFormat(_))), "{bits} bits");
        }
        assert!(RawImageData::new(2, 2, vec![0; 4], 1).is_ok());
        assert_eq!(RawImageData::new(2, 2, vec![0; 4], 14).unwrap().max_pixel_value(), 16383);
    }

    #[test]
    fn test_plane_to_gray8_rounds_and_clamps() {
        let plane = MosaicPlane::new(3, 1, vec![0.5, 1.2, -0.1], 16);
        let gray = plane.to_gray8();
        assert_eq!(gray.get_pixel(0, 0)[0], 128);
        assert_eq!(gray.get_pixel(1, 0)[0], 255);
        assert_eq!(gray.get_pixel(2, 0)[0], 0);
    }
}
