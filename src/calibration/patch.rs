//! Color patches and per-stage measurement records.

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use nalgebra::{Point2, Vector3};

use crate::calibration::geometry::bounding_rect;

const FILLED: u8 = 255;

/// Horizontal run of mask pixels on one row, `x_end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: usize,
    pub x_start: usize,
    pub x_end: usize,
}

impl Span {
    #[inline]
    pub fn len(&self) -> usize {
        self.x_end - self.x_start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x_end <= self.x_start
    }
}

/// Set of pixel coordinates stored as row spans sorted by row then column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelMask {
    spans: Vec<Span>,
}

impl PixelMask {
    /// Filled axis-aligned rectangle, clipped to a `width` x `height` image.
    pub fn from_rect(x: i64, y: i64, w: i64, h: i64, width: usize, height: usize) -> Self {
        let x0 = x.clamp(0, width as i64) as usize;
        let x1 = (x + w).clamp(0, width as i64) as usize;
        let y0 = y.clamp(0, height as i64) as usize;
        let y1 = (y + h).clamp(0, height as i64) as usize;
        if x0 >= x1 {
            return Self::default();
        }
        let spans = (y0..y1)
            .map(|y| Span {
                y,
                x_start: x0,
                x_end: x1,
            })
            .collect();
        Self { spans }
    }

    /// Filled closed polygon including its outline, clipped to the image.
    pub fn from_polygon(polygon: &[Point<i32>], width: usize, height: usize) -> Self {
        let mut vertices = polygon.to_vec();
        vertices.dedup();
        while vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.is_empty() || width == 0 || height == 0 {
            return Self::default();
        }

        // Rasterize on a canvas covering the polygon's bounding box
        let (x0, y0, w, h) = bounding_rect(&vertices);
        let local: Vec<Point<i32>> = vertices
            .iter()
            .map(|p| Point::new(p.x - x0 as i32, p.y - y0 as i32))
            .collect();
        let mut canvas = GrayImage::new(w as u32, h as u32);
        match local.as_slice() {
            [p] => canvas.put_pixel(p.x as u32, p.y as u32, Luma([FILLED])),
            [a, b] => draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                Luma([FILLED]),
            ),
            _ => draw_polygon_mut(&mut canvas, &local, Luma([FILLED])),
        }
        Self::from_canvas(&canvas, x0, y0, width, height)
    }

    /// Runs of `FILLED` pixels on a canvas placed at `(x0, y0)`.
    fn from_canvas(canvas: &GrayImage, x0: i64, y0: i64, width: usize, height: usize) -> Self {
        let gap = Luma([0u8]);
        let mut spans = Vec::new();
        for (row, pixels) in canvas.rows().enumerate() {
            let y = y0 + row as i64;
            if y < 0 || y >= height as i64 {
                continue;
            }
            let mut run_start = None;
            for (col, px) in pixels.chain(std::iter::once(&gap)).enumerate() {
                match (run_start, px[0] == FILLED) {
                    (None, true) => run_start = Some(col),
                    (Some(start), false) => {
                        let x_start = (x0 + start as i64).clamp(0, width as i64) as usize;
                        let x_end = (x0 + col as i64).clamp(0, width as i64) as usize;
                        if x_start < x_end {
                            spans.push(Span {
                                y: y as usize,
                                x_start,
                                x_end,
                            });
                        }
                        run_start = None;
                    }
                    _ => {}
                }
            }
        }
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn pixel_count(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.spans
            .iter()
            .any(|s| s.y == y && (s.x_start..s.x_end).contains(&x))
    }

    /// Every masked (x, y) coordinate in raster order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.spans
            .iter()
            .flat_map(|s| (s.x_start..s.x_end).map(move |x| (x, s.y)))
    }
}

/// One detected chart cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPatch {
    pub centroid: Point2<f32>,
    pub mask: PixelMask,
}

impl ColorPatch {
    pub fn new(centroid: Point2<f32>, mask: PixelMask) -> Self {
        Self { centroid, mask }
    }
}

/// Point in the ISP chain at which patch medians were taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementStage {
    Raw,
    BlackLevelAdjusted,
    WhiteBalanced,
    Demosaiced,
    ColorCorrected,
}

impl MeasurementStage {
    pub fn name(self) -> &'static str {
        match self {
            MeasurementStage::Raw => "raw",
            MeasurementStage::BlackLevelAdjusted => "black_level_adjusted",
            MeasurementStage::WhiteBalanced => "white_balanced",
            MeasurementStage::Demosaiced => "demosaiced",
            MeasurementStage::ColorCorrected => "color_corrected",
        }
    }
}

/// Per-patch RGB medians for one stage, indexed like the patch list.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchMeasurements {
    pub stage: MeasurementStage,
    pub medians: Vec<Vector3<f32>>,
}

impl PatchMeasurements {
    pub fn new(stage: MeasurementStage, medians: Vec<Vector3<f32>>) -> Self {
        Self { stage, medians }
    }

    pub fn len(&self) -> usize {
        self.medians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medians.is_empty()
    }

    pub fn median(&self, index: usize) -> Vector3<f32> {
        self.medians[index]
    }
}
