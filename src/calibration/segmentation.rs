//! Binary segmentation primitives used by chart detection.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::common::parallel::{self, Parallelism};

pub type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

pub const FOREGROUND: u8 = 255;

pub(crate) fn gray_from_vec(width: usize, height: usize, data: Vec<u8>) -> Result<GrayImage> {
    GrayImage::from_raw(width as u32, height as u32, data)
        .ok_or(CalibrationError::InvalidDimensions(width, height))
}

/// Multiply intensities (saturating) and smooth with a Gaussian.
pub fn scale_and_blur(image: &GrayImage, scale: f32, sigma: f32) -> GrayImage {
    let mut scaled = image.clone();
    for p in scaled.pixels_mut() {
        p[0] = (p[0] as f32 * scale).round().min(255.0) as u8;
    }
    if sigma > 0.0 {
        gaussian_blur_f32(&scaled, sigma)
    } else {
        scaled
    }
}

/// Inverse binary threshold against the local mean minus `bias`.
///
/// A pixel becomes foreground when it is not brighter than the mean of the
/// `block_size` x `block_size` window around it (clipped at the image
/// border) minus `bias`.
pub fn adaptive_threshold_inv(image: &GrayImage, block_size: u32, bias: f32, mode: Parallelism) -> Result<GrayImage> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    if w == 0 || h == 0 {
        return gray_from_vec(w, h, Vec::new());
    }
    let radius = (block_size / 2) as usize;
    let integral: Image<Luma<u64>> = integral_image(image);

    let mut out = vec![0u8; w * h];
    parallel::for_each_row(&mut out, w, mode, |y, row| {
        let top = y.saturating_sub(radius);
        let bottom = (y + radius).min(h - 1);
        for (x, dst) in row.iter_mut().enumerate() {
            let left = x.saturating_sub(radius);
            let right = (x + radius).min(w - 1);
            let [sum] = sum_image_pixels(&integral, left as u32, top as u32, right as u32, bottom as u32);
            let count = (right - left + 1) * (bottom - top + 1);
            let mean = sum as f32 / count as f32;
            let v = image.get_pixel(x as u32, y as u32)[0] as f32;
            *dst = if v > mean - bias { 0 } else { FOREGROUND };
        }
    });
    gray_from_vec(w, h, out)
}

/// Structuring element radius, a fraction of the short image side.
pub fn morph_radius(width: u32, height: u32, fraction: f32) -> u8 {
    (fraction * width.min(height) as f32).min(u8::MAX as f32) as u8
}

/// Morphological close with a cross-shaped element.
pub fn fill_gaps(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    morphology::close(binary, Norm::L1, radius)
}

/// Dilation with a square element.
pub fn dilate_gaps(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    morphology::dilate(binary, Norm::LInf, radius)
}

/// Pixel count and bounding box of one connected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentStats {
    pub label: u32,
    pub area: usize,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl ComponentStats {
    fn empty(label: u32) -> Self {
        Self {
            label,
            area: 0,
            left: u32::MAX,
            top: u32::MAX,
            right: 0,
            bottom: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.area += 1;
        self.left = self.left.min(x);
        self.top = self.top.min(y);
        self.right = self.right.max(x);
        self.bottom = self.bottom.max(y);
    }

    fn merge(mut self, other: &Self) -> Self {
        if other.area > 0 {
            self.area += other.area;
            self.left = self.left.min(other.left);
            self.top = self.top.min(other.top);
            self.right = self.right.max(other.right);
            self.bottom = self.bottom.max(other.bottom);
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.right + 1 - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom + 1 - self.top
    }
}

/// 8-connected labelling of the foreground with per-label statistics.
pub struct Components {
    pub labels: LabelImage,
    /// Indexed by label, entry 0 is the background.
    pub stats: Vec<ComponentStats>,
}

impl Components {
    pub fn label(binary: &GrayImage, mode: Parallelism) -> Self {
        let labels = connected_components(binary, Connectivity::Eight, Luma([0u8]));
        let num_labels = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize + 1;
        let (w, h) = labels.dimensions();

        let identity: Vec<ComponentStats> = (0..num_labels as u32).map(ComponentStats::empty).collect();
        let stats = parallel::reduce_rows(
            h as usize,
            mode,
            identity.clone(),
            |y0, y1| {
                let mut acc = identity.clone();
                for y in y0 as u32..y1 as u32 {
                    for x in 0..w {
                        acc[labels.get_pixel(x, y)[0] as usize].add(x, y);
                    }
                }
                acc
            },
            |a, b| a.into_iter().zip(b.iter()).map(|(s, o)| s.merge(o)).collect(),
        );
        Self { labels, stats }
    }

    /// Foreground labels, skipping the background.
    pub fn foreground(&self) -> impl Iterator<Item = &ComponentStats> {
        self.stats.iter().skip(1).filter(|s| s.area > 0)
    }

    /// Binary image of a single label.
    pub fn mask_of(&self, label: u32) -> GrayImage {
        let (w, h) = self.labels.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            Luma([if self.labels.get_pixel(x, y)[0] == label { FOREGROUND } else { 0 }])
        })
    }
}

/// Clear every foreground component smaller than `min_area` pixels.
pub fn remove_small_objects(binary: &GrayImage, min_area: usize, mode: Parallelism) -> GrayImage {
    let components = Components::label(binary, mode);
    let mut out = binary.clone();
    for (x, y, p) in out.enumerate_pixels_mut() {
        let label = components.labels.get_pixel(x, y)[0] as usize;
        if label != 0 && components.stats[label].area < min_area {
            p[0] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_square(w: u32, h: u32, bg: u8, fg: u8, x0: u32, y0: u32, side: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
            Luma([if inside { fg } else { bg }])
        })
    }

    #[test]
    fn test_adaptive_threshold_marks_dark_side_of_edges() {
        let image = with_square(40, 40, 200, 20, 10, 10, 20);
        let bw = adaptive_threshold_inv(&image, 19, 2.0, Parallelism::Sequential).unwrap();
        // Dark pixel next to bright background is foreground
        assert_eq!(bw.get_pixel(10, 20)[0], FOREGROUND);
        // Bright background next to the square is not
        assert_eq!(bw.get_pixel(9, 20)[0], 0);
        // Flat regions stay background
        assert_eq!(bw.get_pixel(0, 0)[0], 0);
        assert_eq!(bw.get_pixel(20, 20)[0], 0);
    }

    #[test]
    fn test_threshold_window_is_clipped_at_border() {
        // Corner window holds 2x2 pixels: mean (0 + 100 + 100 + 100) / 4 = 75
        let image = GrayImage::from_fn(3, 3, |x, y| Luma([if x == 0 && y == 0 { 0 } else { 100 }]));
        let bw = adaptive_threshold_inv(&image, 3, 0.0, Parallelism::Sequential).unwrap();
        assert_eq!(bw.get_pixel(0, 0)[0], FOREGROUND);
        // Full 3x3 window around the center has mean 800 / 9 < 100
        assert_eq!(bw.get_pixel(1, 1)[0], 0);
        // Flat neighbourhood equal to the mean stays foreground with zero bias
        assert_eq!(bw.get_pixel(2, 2)[0], FOREGROUND);
    }

    #[test]
    fn test_threshold_modes_agree() {
        let image = GrayImage::from_fn(70, 150, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let a = adaptive_threshold_inv(&image, 19, 2.0, Parallelism::Sequential).unwrap();
        let b = adaptive_threshold_inv(&image, 19, 2.0, Parallelism::Rayon).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_components_stats() {
        let mut image = with_square(30, 20, 0, 255, 2, 3, 4);
        image.put_pixel(25, 15, Luma([255]));
        let components = Components::label(&image, Parallelism::Rayon);
        let mut areas: Vec<usize> = components.foreground().map(|s| s.area).collect();
        areas.sort_unstable();
        assert_eq!(areas, vec![1, 16]);
        let square = components.foreground().find(|s| s.area == 16).unwrap();
        assert_eq!((square.left, square.top, square.width(), square.height()), (2, 3, 4, 4));
    }

    #[test]
    fn test_remove_small_objects() {
        let mut image = with_square(30, 20, 0, 255, 2, 3, 4);
        image.put_pixel(25, 15, Luma([255]));
        let cleaned = remove_small_objects(&image, 2, Parallelism::Sequential);
        assert_eq!(cleaned.get_pixel(25, 15)[0], 0);
        assert_eq!(cleaned.get_pixel(3, 4)[0], 255);
    }

    #[test]
    fn test_fill_gaps_closes_single_pixel_hole() {
        let mut image = with_square(20, 20, 0, 255, 5, 5, 9);
        image.put_pixel(9, 9, Luma([0]));
        let closed = fill_gaps(&image, 1);
        assert_eq!(closed.get_pixel(9, 9)[0], 255);
    }

    #[test]
    fn test_morph_radius_truncates() {
        assert_eq!(morph_radius(600, 400, 0.003), 1);
        assert_eq!(morph_radius(300, 200, 0.003), 0);
    }
}
