//! Diagnostic images written while calibrating.
//!
//! Nothing here feeds back into the numeric results. Write failures are
//! logged and otherwise ignored.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ab_glyph::{FontRef, PxScale};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
    draw_line_segment_mut, draw_text_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::calibration::patch::{ColorPatch, PatchMeasurements, PixelMask};
use crate::calibration::reference::ReferenceChart;
use crate::calibration::response::ColorResponse;
use crate::calibration::statistics::MeasuredImage;
use crate::image_pipeline::raw::MosaicPlane;

const CHANNEL_COLORS: [Rgb<u8>; 3] = [Rgb([255, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])];

/// Pixels per 8-bit level on the response plot axes.
const PLOT_SCALE: f32 = 2.0;

const LABEL_HEIGHT: f32 = 8.0 * PLOT_SCALE;

static LABEL_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");

/// Numbered PNG sink, disabled unless built with an output directory.
#[derive(Debug, Clone, Default)]
pub struct DebugImageWriter {
    dir: Option<PathBuf>,
    step: Arc<AtomicUsize>,
}

impl DebugImageWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            step: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn next_path(&self, name: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let step = self.step.fetch_add(1, Ordering::SeqCst) + 1;
        Some(dir.join(format!("{}_{}.png", step, name)))
    }

    /// Render and save an image; `render` only runs when enabled.
    pub fn save_gray(&self, name: &str, render: impl FnOnce() -> GrayImage) {
        if let Some(path) = self.next_path(name) {
            self.write(&path, render().save(&path));
        }
    }

    pub fn save_rgb(&self, name: &str, render: impl FnOnce() -> RgbImage) {
        if let Some(path) = self.next_path(name) {
            self.write(&path, render().save(&path));
        }
    }

    fn write(&self, path: &Path, result: image::ImageResult<()>) {
        match result {
            Ok(()) => debug!("Wrote debug image {}", path.display()),
            Err(e) => warn!("Failed to write debug image {}: {}", path.display(), e),
        }
    }
}

/// Contours drawn in distinct colors on black.
pub fn draw_contours(width: u32, height: u32, contours: &[Vec<Point<i32>>]) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    for (i, contour) in contours.iter().enumerate() {
        draw_closed_polyline(&mut canvas, contour, palette(i));
    }
    canvas
}

/// Filtered black reference contours with their enclosing circles.
pub fn draw_circles(width: u32, height: u32, contours: &[(Vec<Point<i32>>, (f32, f32), f32)]) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    for (i, (contour, center, radius)) in contours.iter().enumerate() {
        let color = palette(i);
        draw_closed_polyline(&mut canvas, contour, color);
        draw_hollow_circle_mut(&mut canvas, (center.0 as i32, center.1 as i32), *radius as i32, color);
    }
    canvas
}

fn draw_closed_polyline(canvas: &mut RgbImage, polygon: &[Point<i32>], color: Rgb<u8>) {
    let n = polygon.len();
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[(i + 1) % n]);
        draw_line_segment_mut(canvas, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color);
    }
}

fn palette(i: usize) -> Rgb<u8> {
    let h = (i as u32).wrapping_mul(2_654_435_761);
    Rgb([(h >> 24) as u8 | 0x40, (h >> 16) as u8 | 0x40, (h >> 8) as u8 | 0x40])
}

fn mask_bounds(mask: &PixelMask) -> Option<Rect> {
    let spans = mask.spans();
    let top = spans.first()?.y;
    let bottom = spans.last()?.y;
    let left = spans.iter().map(|s| s.x_start).min()?;
    let right = spans.iter().map(|s| s.x_end).max()?;
    Some(Rect::at(left as i32, top as i32).of_size((right - left) as u32, (bottom + 1 - top) as u32))
}

/// Patch outlines and centroids over the detection image.
pub fn draw_patches(image: &GrayImage, patches: &[ColorPatch]) -> RgbImage {
    let mut canvas = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    let green = Rgb([0, 255, 0]);
    for patch in patches {
        if let Some(rect) = mask_bounds(&patch.mask) {
            draw_hollow_rect_mut(&mut canvas, rect, green);
        }
        draw_cross_mut(&mut canvas, green, patch.centroid.x as i32, patch.centroid.y as i32);
    }
    canvas
}

/// Raw frame in gray with the accepted black reference painted green.
pub fn draw_black_reference(plane: &MosaicPlane, mask: &PixelMask) -> RgbImage {
    let gray = plane.to_gray8();
    let mut canvas = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    for (x, y) in mask.pixels() {
        canvas.put_pixel(x as u32, y as u32, Rgb([0, 255, 0]));
    }
    canvas
}

/// Mid gray everywhere except pixels sitting at 0 or full scale.
pub fn clamped_pixels(plane: &MosaicPlane) -> GrayImage {
    let gray = plane.to_gray8();
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Luma([if v == 0 || v == u8::MAX { v } else { 128 }])
    })
}

/// Scatter of gray patch pixel values against reference reflectance with
/// the per-channel medians and the fitted response lines.
pub fn response_scatter(
    image: MeasuredImage<'_>,
    patches: &[ColorPatch],
    measurements: &PatchMeasurements,
    chart: &ReferenceChart,
    response: &ColorResponse,
) -> RgbImage {
    let max_scaled = 255.0 * PLOT_SCALE;
    let side = 1.5 * max_scaled;
    let mut canvas = RgbImage::from_pixel(side as u32, side as u32, Rgb([255, 255, 255]));
    let to_row = |v: f32| side - v * max_scaled;
    let shift = 5.0 * PLOT_SCALE;

    for index in chart.gray_ramp() {
        let Some(patch) = patches.get(index) else {
            continue;
        };
        let x = max_scaled * chart.normalized(index).x;
        for (px, py) in patch.mask.pixels() {
            match image {
                MeasuredImage::Mosaic { plane, mosaic } => {
                    let ch = mosaic.channel_at(py, px).index();
                    let center = (x as i32, to_row(plane.get(px, py)) as i32);
                    draw_filled_circle_mut(&mut canvas, center, 1, CHANNEL_COLORS[ch]);
                }
                MeasuredImage::Rgb(rgb) => {
                    for (ch, v) in rgb.pixel(px, py).into_iter().enumerate() {
                        draw_filled_circle_mut(&mut canvas, (x as i32, to_row(v) as i32), 1, CHANNEL_COLORS[ch]);
                    }
                }
            }
        }
        if index < measurements.len() {
            let median = measurements.median(index);
            for ch in 0..3 {
                let y = to_row(median[ch]);
                draw_line_segment_mut(&mut canvas, (x - shift, y), (x + shift, y), CHANNEL_COLORS[ch]);
            }
        }
    }

    for (ch, fit) in response.channels.iter().enumerate() {
        let start = (0.0, to_row(fit.intercept_y));
        let end = (side, to_row(fit.slope * side / max_scaled + fit.intercept_y));
        draw_line_segment_mut(&mut canvas, start, end, CHANNEL_COLORS[ch]);
    }

    match FontRef::try_from_slice(LABEL_FONT) {
        Ok(font) => {
            for (ch, label) in response_labels(response).iter().enumerate() {
                let y = shift + ch as f32 * LABEL_HEIGHT * 1.25;
                draw_text_mut(
                    &mut canvas,
                    CHANNEL_COLORS[ch],
                    shift as i32,
                    y as i32,
                    PxScale::from(LABEL_HEIGHT),
                    &font,
                    label,
                );
            }
        }
        Err(e) => warn!("Response plot drawn without labels: {}", e),
    }
    canvas
}

/// One annotation line per channel: slope, y intercept and the x intercepts
/// at 0 and full scale.
pub fn response_labels(response: &ColorResponse) -> [String; 3] {
    let names = ["R", "G", "B"];
    std::array::from_fn(|ch| {
        let fit = &response.channels[ch];
        format!(
            "{}: slope {:.4}  y0 {:.4}  x0 {:.4}  x1 {:.4}",
            names[ch], fit.slope, fit.intercept_y, fit.x_min, fit.x_max
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::patch::MeasurementStage;
    use crate::calibration::response::ChannelResponse;
    use crate::image_pipeline::debayer::RgbImageData;

    fn half_slope_response() -> ColorResponse {
        ColorResponse {
            channels: [ChannelResponse::through(0.2, 0.15, 0.8, 0.45); 3],
        }
    }

    #[test]
    fn test_disabled_writer_never_renders() {
        let writer = DebugImageWriter::disabled();
        writer.save_gray("never", || panic!("render called while disabled"));
        assert!(!writer.is_enabled());
    }

    #[test]
    fn test_steps_are_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DebugImageWriter::new(dir.path());
        writer.save_gray("first", || GrayImage::new(4, 4));
        writer.clone().save_rgb("second", || RgbImage::new(4, 4));
        assert!(dir.path().join("1_first.png").exists());
        assert!(dir.path().join("2_second.png").exists());
    }

    #[test]
    fn test_clamped_pixels_map() {
        let plane = MosaicPlane::new(3, 1, vec![0.0, 0.5, 1.0], 16);
        let map = clamped_pixels(&plane);
        assert_eq!(map.get_pixel(0, 0)[0], 0);
        assert_eq!(map.get_pixel(1, 0)[0], 128);
        assert_eq!(map.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_response_labels_carry_fit() {
        let labels = response_labels(&half_slope_response());
        assert_eq!(labels[0], "R: slope 0.5000  y0 0.0500  x0 -0.1000  x1 1.9000");
        assert!(labels[2].starts_with("B: "));
    }

    #[test]
    fn test_response_plot_is_annotated() {
        let rgb = RgbImageData::filled(4, 4, [0.5; 3], 16);
        let measurements = PatchMeasurements::new(MeasurementStage::Demosaiced, Vec::new());
        let plot = response_scatter(
            MeasuredImage::Rgb(&rgb),
            &[],
            &measurements,
            &ReferenceChart::macbeth_linear(),
            &half_slope_response(),
        );

        // Label band in the top-left corner, away from the fitted lines
        let band_height = (3.0 * LABEL_HEIGHT * 1.25 + 10.0) as u32;
        let inked = (0..plot.width())
            .flat_map(|x| (0..band_height).map(move |y| (x, y)))
            .filter(|&(x, y)| *plot.get_pixel(x, y) != Rgb([255, 255, 255]))
            .count();
        assert!(inked > 100, "{inked} label pixels");
    }
}
