//! Color chart detection and patch ordering.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::geometry::contour_area;
use imageproc::point::Point;
use nalgebra::Point2;
use tracing::{debug, info, info_span, instrument};

use crate::calibration::debug::{self as debug_images, DebugImageWriter};
use crate::calibration::geometry::{
    bounding_rect, is_convex, point_line_distance, simplify_contour, RotatedRect,
};
use crate::calibration::patch::{ColorPatch, PixelMask};
use crate::calibration::segmentation::{self, Components};
use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::common::parallel::Parallelism;

/// Thresholds of the detection stages. Fractions are of the image area
/// unless noted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub brighten_scale: f32,
    pub blur_sigma: f32,
    pub adaptive_block_size: u32,
    pub adaptive_bias: f32,
    /// Structuring element radius as a fraction of the short image side
    pub morph_fraction: f32,
    pub small_object_fraction: f32,
    pub chart_min_fraction: f32,
    pub chart_max_fraction: f32,
    /// Allowed horizontal offset of the chart from the image center, as a
    /// fraction of the center coordinate
    pub center_tolerance: f32,
    pub chart_simplify_fraction: f64,
    pub patch_min_fraction: f32,
    pub patch_max_fraction: f32,
    pub max_aspect_ratio: f32,
    /// Patches farther than this multiple of the median nearest-neighbour
    /// distance from every other patch are dropped
    pub outlier_factor: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            brighten_scale: 2.0,
            // 15x15 kernel with automatic sigma
            blur_sigma: 2.6,
            adaptive_block_size: 19,
            adaptive_bias: 2.0,
            morph_fraction: 0.003,
            small_object_fraction: 0.0001,
            chart_min_fraction: 0.01,
            chart_max_fraction: 0.40,
            center_tolerance: 0.10,
            chart_simplify_fraction: 0.08,
            patch_min_fraction: 0.0001,
            patch_max_fraction: 0.0045,
            max_aspect_ratio: 1.2,
            outlier_factor: 2.0,
        }
    }
}

pub struct ChartDetector {
    config: DetectorConfig,
    parallelism: Parallelism,
    debug: DebugImageWriter,
}

impl ChartDetector {
    pub fn new(config: DetectorConfig, parallelism: Parallelism) -> Self {
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

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Locate a `patches_wide` x `patches_high` chart and return its patches
    /// in row-major order.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &GrayImage, patches_wide: usize, patches_high: usize) -> Result<Vec<ColorPatch>> {
        let expected = patches_wide * patches_high;
        let binary = self.segment(image)?;

        let chart_contours = {
            let _span = info_span!("find_chart").entered();
            self.find_chart_contours(&binary, expected)?
        };

        let candidates = self.filter_patches(&chart_contours, image.width(), image.height());
        debug!("{} patch candidates", candidates.len());

        let clean = remove_outliers(candidates, self.config.outlier_factor);
        info!("Number of patches found: {}", clean.len());
        if clean.len() < expected {
            self.debug
                .save_rgb("detected_patches", || debug_images::draw_patches(image, &clean));
            return Err(CalibrationError::ChartNotFound(format!(
                "found {} patches, expected {}",
                clean.len(),
                expected
            )));
        }

        let sorted = sort_patches(trim_to_grid(clean, expected), patches_wide, image.width() as f32);
        self.debug
            .save_rgb("detected_patches", || debug_images::draw_patches(image, &sorted));
        Ok(sorted)
    }

    /// Binary image where patch borders are foreground.
    fn segment(&self, image: &GrayImage) -> Result<GrayImage> {
        let _span = info_span!("segment").entered();
        let c = &self.config;
        let (w, h) = image.dimensions();
        let area = w as f32 * h as f32;

        let blurred = segmentation::scale_and_blur(image, c.brighten_scale, c.blur_sigma);
        self.debug.save_gray("scaled_blurred", || blurred.clone());

        let binary = segmentation::adaptive_threshold_inv(&blurred, c.adaptive_block_size, c.adaptive_bias, self.parallelism)?;
        self.debug.save_gray("adaptive_threshold", || binary.clone());

        let radius = segmentation::morph_radius(w, h, c.morph_fraction);
        let binary = segmentation::fill_gaps(&binary, radius);
        self.debug.save_gray("fill_gaps", || binary.clone());

        let min_object = (c.small_object_fraction * area) as usize;
        let binary = segmentation::remove_small_objects(&binary, min_object, self.parallelism);
        self.debug.save_gray("no_small_objects", || binary.clone());

        let binary = segmentation::dilate_gaps(&binary, radius);
        self.debug.save_gray("dilate", || binary.clone());
        Ok(binary)
    }

    /// Simplified contours of the first component that looks like a
    /// centered chart with enough cells.
    fn find_chart_contours(&self, binary: &GrayImage, expected: usize) -> Result<Vec<Vec<Point<i32>>>> {
        let c = &self.config;
        let (w, h) = binary.dimensions();
        let area = w as f32 * h as f32;
        let (cx, cy) = ((w / 2) as f32, (h / 2) as f32);

        let components = Components::label(binary, self.parallelism);
        for stats in components.foreground() {
            if (stats.area as f32) < c.chart_min_fraction * area {
                continue;
            }
            let (left, top) = (stats.left as f32, stats.top as f32);
            let (right, bottom) = (left + stats.width() as f32, top + stats.height() as f32);
            if left > (1.0 + c.center_tolerance) * cx
                || top > cy
                || right < (1.0 - c.center_tolerance) * cx
                || bottom < cy
            {
                continue;
            }
            if stats.width() as f32 * stats.height() as f32 > c.chart_max_fraction * area {
                continue;
            }

            let contours: Vec<Vec<Point<i32>>> = find_contours::<i32>(&components.mask_of(stats.label))
                .into_iter()
                .map(|contour| simplify_contour(&contour.points, c.chart_simplify_fraction))
                .collect();
            debug!(label = stats.label, area = stats.area, "Chart candidate with {} contours", contours.len());
            self.debug
                .save_rgb("contours", || debug_images::draw_contours(w, h, &contours));

            if contours.len() >= expected {
                return Ok(contours);
            }
        }
        Err(CalibrationError::ChartNotFound(
            "no connected component qualifies as a chart".into(),
        ))
    }

    /// Keep square, convex, patch-sized quadrilaterals.
    fn filter_patches(&self, contours: &[Vec<Point<i32>>], width: u32, height: u32) -> Vec<ColorPatch> {
        let c = &self.config;
        let area = width as f32 * height as f32;
        let (min_area, max_area) = (c.patch_min_fraction * area, c.patch_max_fraction * area);

        contours
            .iter()
            .filter(|polygon| polygon.len() == 4)
            .filter(|polygon| {
                let a = contour_area(polygon) as f32;
                a >= min_area && a <= max_area && is_convex(polygon)
            })
            .filter_map(|polygon| {
                let rect = RotatedRect::fit(polygon);
                if rect.aspect_ratio() > c.max_aspect_ratio {
                    return None;
                }
                let (x, y, w, h) = bounding_rect(polygon);
                let mask = PixelMask::from_rect(x, y, w, h, width as usize, height as usize);
                Some(ColorPatch::new(rect.center, mask))
            })
            .collect()
    }
}

/// Drop patches isolated from the grid.
pub fn remove_outliers(patches: Vec<ColorPatch>, factor: f32) -> Vec<ColorPatch> {
    if patches.len() < 2 {
        return patches;
    }
    let min_distances: Vec<f32> = patches
        .iter()
        .enumerate()
        .map(|(i, p)| {
            patches
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, q)| nalgebra::distance(&p.centroid, &q.centroid))
                .fold(f32::MAX, f32::min)
        })
        .collect();

    let mut sorted = min_distances.clone();
    sorted.sort_by(f32::total_cmp);
    let threshold = factor * sorted[sorted.len() / 2];

    patches
        .into_iter()
        .zip(min_distances)
        .filter_map(|(patch, d)| {
            if d < threshold {
                Some(patch)
            } else {
                debug!("Dropping outlier patch at ({:.1}, {:.1})", patch.centroid.x, patch.centroid.y);
                None
            }
        })
        .collect()
}

/// Mean distance from patch `i` to its two nearest neighbours.
fn neighbour_spread(patches: &[ColorPatch], i: usize) -> f32 {
    let mut distances: Vec<f32> = patches
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, q)| nalgebra::distance(&patches[i].centroid, &q.centroid))
        .collect();
    let k = distances.len().min(2);
    if k == 0 {
        return 0.0;
    }
    distances.select_nth_unstable_by(k - 1, f32::total_cmp);
    distances[..k].iter().sum::<f32>() / k as f32
}

/// Drop the least grid-like patches until `expected` remain. Stray cells
/// next to the chart have one close neighbour where grid cells have two.
pub fn trim_to_grid(mut patches: Vec<ColorPatch>, expected: usize) -> Vec<ColorPatch> {
    while patches.len() > expected {
        let worst = (0..patches.len())
            .map(|i| (i, neighbour_spread(&patches, i)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i);
        let Some(worst) = worst else {
            break;
        };
        let dropped = patches.remove(worst);
        debug!("Dropping extra patch at ({:.1}, {:.1})", dropped.centroid.x, dropped.centroid.y);
    }
    patches
}

fn nearest_to(points: &[Point2<f32>], indices: &[usize], target: Point2<f32>) -> Point2<f32> {
    indices
        .iter()
        .map(|&i| points[i])
        .min_by(|a, b| nalgebra::distance(a, &target).total_cmp(&nalgebra::distance(b, &target)))
        .unwrap_or(target)
}

/// Raster order tolerant to chart rotation: rows are peeled off one at a
/// time as the `patches_wide` centroids nearest the line through the
/// current top-left and top-right centroids.
pub fn sort_patches(patches: Vec<ColorPatch>, patches_wide: usize, image_width: f32) -> Vec<ColorPatch> {
    let centroids: Vec<Point2<f32>> = patches.iter().map(|p| p.centroid).collect();
    let mut remaining: Vec<usize> = (0..patches.len()).collect();
    let mut order = Vec::with_capacity(patches.len());

    while !remaining.is_empty() {
        let top_left = nearest_to(&centroids, &remaining, Point2::new(0.0, 0.0));
        let top_right = nearest_to(&centroids, &remaining, Point2::new(image_width, 0.0));
        remaining.sort_by(|&a, &b| {
            point_line_distance(centroids[a], top_left, top_right)
                .total_cmp(&point_line_distance(centroids[b], top_left, top_right))
        });

        let take = patches_wide.max(1).min(remaining.len());
        let mut row: Vec<usize> = remaining.drain(..take).collect();
        row.sort_by(|&a, &b| centroids[a].x.total_cmp(&centroids[b].x));
        order.extend(row);
    }

    let mut slots: Vec<Option<ColorPatch>> = patches.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
