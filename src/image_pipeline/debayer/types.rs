//! Types for debayering operations

/// RGB image data after debayering, normalized to [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImageData {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    pub data: Vec<f32>,
    /// Bit depth of the sensor data the image was developed from
    pub bits_per_sample: u32,
}

impl RgbImageData {
    pub fn new(width: usize, height: usize, data: Vec<f32>, bits_per_sample: u32) -> Self {
        assert_eq!(data.len(), width * height * 3, "rgb length must equal width * height * 3");
        Self {
            width,
            height,
            data,
            bits_per_sample,
        }
    }

    pub fn filled(width: usize, height: usize, rgb: [f32; 3], bits_per_sample: u32) -> Self {
        let data = std::iter::repeat_n(rgb, width * height).flatten().collect();
        Self::new(width, height, data, bits_per_sample)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [f32; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// 8-bit rendition for debug output.
    pub fn to_rgb8(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let p = self.pixel(x as usize, y as usize);
            image::Rgb(p.map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8))
        })
    }
}
