//! Robust per-channel statistics over patch masks.

use nalgebra::Vector3;
use tracing::{debug, instrument};

use crate::calibration::patch::{ColorPatch, MeasurementStage, PatchMeasurements, PixelMask};
use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::common::parallel::{self, Parallelism};
use crate::image_pipeline::debayer::RgbImageData;
use crate::image_pipeline::raw::{MosaicPlane, SensorMosaic};

/// Image a patch is measured against.
#[derive(Clone, Copy)]
pub enum MeasuredImage<'a> {
    /// Single-channel mosaic, pixels bucketed by color filter.
    Mosaic {
        plane: &'a MosaicPlane,
        mosaic: &'a dyn SensorMosaic,
    },
    /// Demosaiced image, every pixel contributes to all channels.
    Rgb(&'a RgbImageData),
}

impl<'a> MeasuredImage<'a> {
    pub fn mosaic(plane: &'a MosaicPlane, mosaic: &'a dyn SensorMosaic) -> Self {
        MeasuredImage::Mosaic { plane, mosaic }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, MeasuredImage::Mosaic { .. })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            MeasuredImage::Mosaic { plane, .. } => (plane.width, plane.height),
            MeasuredImage::Rgb(image) => (image.width, image.height),
        }
    }

    /// Masked samples split into red, green and blue buckets.
    fn channel_buckets(&self, mask: &PixelMask) -> [Vec<f32>; 3] {
        let mut buckets: [Vec<f32>; 3] = Default::default();
        match self {
            MeasuredImage::Mosaic { plane, mosaic } => {
                for (x, y) in mask.pixels() {
                    buckets[mosaic.channel_at(y, x).index()].push(plane.get(x, y));
                }
            }
            MeasuredImage::Rgb(image) => {
                for bucket in buckets.iter_mut() {
                    bucket.reserve(mask.pixel_count());
                }
                for (x, y) in mask.pixels() {
                    let px = image.pixel(x, y);
                    for (bucket, v) in buckets.iter_mut().zip(px) {
                        bucket.push(v);
                    }
                }
            }
        }
        buckets
    }
}

/// Upper median (element at `len / 2` in sorted order) by selection.
pub fn select_median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mid = values.len() / 2;
    let (_, median, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    Some(*median)
}

/// Per-channel median of the pixels under `mask`.
pub fn masked_median(image: MeasuredImage<'_>, mask: &PixelMask) -> Result<Vector3<f32>> {
    let mut buckets = image.channel_buckets(mask);
    let mut out = Vector3::zeros();
    for (channel, bucket) in buckets.iter_mut().enumerate() {
        out[channel] = select_median(bucket).ok_or(CalibrationError::EmptyPatchStatistics { channel })?;
    }
    Ok(out)
}

/// Measures every patch of a chart against one image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchStatistics {
    parallelism: Parallelism,
}

impl PatchStatistics {
    pub fn new(parallelism: Parallelism) -> Self {
        Self { parallelism }
    }

    pub fn median(&self, image: MeasuredImage<'_>, mask: &PixelMask) -> Result<Vector3<f32>> {
        masked_median(image, mask)
    }

    #[instrument(skip(self, image, patches), fields(patches = patches.len(), raw = image.is_raw()))]
    pub fn measure(
        &self,
        image: MeasuredImage<'_>,
        patches: &[ColorPatch],
        stage: MeasurementStage,
    ) -> Result<PatchMeasurements> {
        let medians = parallel::map_items(patches, self.parallelism, |_, patch| {
            masked_median(image, &patch.mask)
        })
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

        for (i, m) in medians.iter().enumerate() {
            debug!(stage = stage.name(), "Patch {:2} median: [{:.4}, {:.4}, {:.4}]", i, m.x, m.y, m.z);
        }
        Ok(PatchMeasurements::new(stage, medians))
    }
}
