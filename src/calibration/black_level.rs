//! Black level from light-baffled reference regions of the raw frame.

use std::f64::consts::PI;

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::geometry::contour_area;
use imageproc::point::Point;
use nalgebra::Vector3;
use tracing::{debug, info, instrument};

use crate::calibration::debug::{self as debug_images, DebugImageWriter};
use crate::calibration::geometry::{min_enclosing_circle, simplify_contour};
use crate::calibration::patch::PixelMask;
use crate::calibration::segmentation::{gray_from_vec, FOREGROUND};
use crate::calibration::statistics::{masked_median, MeasuredImage};
use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::common::parallel::{self, Parallelism};
use crate::image_pipeline::raw::{MosaicPlane, RawImageData, SensorMosaic};

#[derive(Debug, Clone, PartialEq)]
pub struct BlackLevelConfig {
    /// Histogram bins and contours with fewer pixels are treated as noise
    pub min_pixels: usize,
    /// Douglas-Peucker tolerance as a fraction of contour perimeter
    pub simplify_fraction: f64,
    pub min_vertices: usize,
    /// Contour area over enclosing circle area
    pub min_circularity: f64,
}

impl Default for BlackLevelConfig {
    fn default() -> Self {
        Self {
            min_pixels: 50,
            simplify_fraction: 0.01,
            min_vertices: 10,
            min_circularity: 0.5,
        }
    }
}

/// Candidate black reference region.
#[derive(Debug, Clone)]
pub struct BlackReference {
    pub contour: Vec<Point<i32>>,
    pub mask: PixelMask,
    /// Normalized per-channel median
    pub level: Vector3<f32>,
}

pub struct BlackLevelEstimator {
    config: BlackLevelConfig,
    parallelism: Parallelism,
    debug: DebugImageWriter,
}

impl BlackLevelEstimator {
    pub fn new(config: BlackLevelConfig, parallelism: Parallelism) -> Self {
        Self {
            config,
            parallelism,
            debug: DebugImageWriter::disabled(),
        }
    }

    pub fn with_debug(mut self, debug: DebugImageWriter) -> Self {
        self.debug = debug;
        self
    }

    /// Estimate the normalized black level of `raw`; `plane` is the same
    /// frame normalized to [0, 1].
    #[instrument(skip_all, fields(width = raw.width, height = raw.height))]
    pub fn estimate(&self, raw: &RawImageData, plane: &MosaicPlane, mosaic: &dyn SensorMosaic) -> Result<Vector3<f32>> {
        let thresholds = self.channel_thresholds(raw, mosaic);
        debug!("Black level thresholds per channel: {:?}", thresholds);

        let mask = self.black_hole_mask(raw, mosaic, &thresholds)?;
        let candidates = self.reference_candidates(&mask, plane, mosaic)?;

        let best = candidates
            .iter()
            .min_by(|a, b| a.level.norm().total_cmp(&b.level.norm()))
            .ok_or(CalibrationError::NoBlackReference)?;

        self.debug
            .save_rgb("black_hole_mask", || debug_images::draw_black_reference(plane, &best.mask));

        let max_value = raw.max_pixel_value() as f32;
        info!(
            "Black level ({}-bit): [{:.2}, {:.2}, {:.2}]",
            raw.bits_per_sample,
            best.level.x * max_value,
            best.level.y * max_value,
            best.level.z * max_value
        );
        Ok(best.level)
    }

    /// Lowest level per channel holding more than `min_pixels` samples.
    /// `None` when no level below full scale qualifies.
    pub fn channel_thresholds(&self, raw: &RawImageData, mosaic: &dyn SensorMosaic) -> [Option<u32>; 3] {
        let histograms = self.histograms(raw, mosaic);
        let max_value = raw.max_pixel_value() as usize;
        let min_pixels = self.config.min_pixels as u32;
        histograms.map(|hist| {
            hist.iter()
                .take(max_value)
                .position(|&count| count > min_pixels)
                .map(|level| level as u32)
        })
    }

    /// Bin-per-level histogram of each channel, accumulated per row band.
    fn histograms(&self, raw: &RawImageData, mosaic: &dyn SensorMosaic) -> [Vec<u32>; 3] {
        let bins = raw.max_pixel_value() as usize + 1;
        let empty: [Vec<u32>; 3] = std::array::from_fn(|_| vec![0u32; bins]);
        parallel::reduce_rows(
            raw.height,
            self.parallelism,
            empty.clone(),
            |y0, y1| {
                let mut acc = empty.clone();
                for y in y0..y1 {
                    for x in 0..raw.width {
                        let v = (raw.get(x, y) as usize).min(bins - 1);
                        acc[mosaic.channel_at(y, x).index()][v] += 1;
                    }
                }
                acc
            },
            |mut a, b| {
                for (ha, hb) in a.iter_mut().zip(b.iter()) {
                    for (ca, cb) in ha.iter_mut().zip(hb) {
                        *ca += cb;
                    }
                }
                a
            },
        )
    }

    /// Pixels at or below the threshold of their own channel.
    fn black_hole_mask(&self, raw: &RawImageData, mosaic: &dyn SensorMosaic, thresholds: &[Option<u32>; 3]) -> Result<GrayImage> {
        let mut data = vec![0u8; raw.width * raw.height];
        parallel::for_each_row(&mut data, raw.width, self.parallelism, |y, row| {
            for (x, dst) in row.iter_mut().enumerate() {
                let threshold = thresholds[mosaic.channel_at(y, x).index()];
                if threshold.is_some_and(|t| raw.get(x, y) as u32 <= t) {
                    *dst = FOREGROUND;
                }
            }
        });
        gray_from_vec(raw.width, raw.height, data)
    }

    /// Roughly circular, large enough regions of the mask with their medians.
    fn reference_candidates(&self, mask: &GrayImage, plane: &MosaicPlane, mosaic: &dyn SensorMosaic) -> Result<Vec<BlackReference>> {
        let (w, h) = (plane.width, plane.height);
        let mut kept = Vec::new();
        let mut circles = Vec::new();

        for contour in find_contours::<i32>(mask) {
            let polygon = simplify_contour(&contour.points, self.config.simplify_fraction);
            let area = contour_area(&polygon);
            if area < self.config.min_pixels as f64 || polygon.len() < self.config.min_vertices {
                continue;
            }
            let (center, radius) = min_enclosing_circle(&polygon);
            let circularity = area / (PI * radius * radius);
            if circularity < self.config.min_circularity {
                continue;
            }
            debug!(
                "Black reference candidate at ({:.1}, {:.1}), r={:.1}, circularity {:.2}",
                center.x, center.y, radius, circularity
            );
            circles.push((polygon.clone(), (center.x as f32, center.y as f32), radius as f32));
            kept.push(polygon);
        }

        self.debug
            .save_rgb("contours_filtered", || debug_images::draw_circles(w as u32, h as u32, &circles));

        let image = MeasuredImage::mosaic(plane, mosaic);
        let levels = parallel::map_items(&kept, self.parallelism, |_, polygon| {
            let mask = PixelMask::from_polygon(polygon, w, h);
            masked_median(image, &mask).map(|level| (mask, level))
        });

        kept.into_iter()
            .zip(levels)
            .map(|(contour, result)| {
                let (mask, level) = result?;
                Ok(BlackReference { contour, mask, level })
            })
            .collect()
    }
}
