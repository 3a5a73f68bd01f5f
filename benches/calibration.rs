use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{GrayImage, Luma};
use isp_color_calibration::calibration::{
    ChartDetector, ColorPatch, DetectorConfig, MeasuredImage, MeasurementStage, PatchStatistics, PixelMask,
};
use isp_color_calibration::image_pipeline::{BayerPattern, MosaicPlane, Parallelism};
use nalgebra::Point2;

const PATCH: u32 = 30;
const GAP: u32 = 10;

fn generate_mosaic(width: usize, height: usize) -> MosaicPlane {
    let data = (0..width * height)
        .map(|i| ((i * 7919) % 4096) as f32 / 4095.0)
        .collect();
    MosaicPlane::new(width, height, data, 16)
}

fn generate_patches(width: usize, height: usize, side: usize) -> Vec<ColorPatch> {
    let mut patches = Vec::new();
    for r in 0..4 {
        for c in 0..6 {
            let (x, y) = (c * (side + 4) + 2, r * (side + 4) + 2);
            let mask = PixelMask::from_rect(x as i64, y as i64, side as i64, side as i64, width, height);
            patches.push(ColorPatch::new(Point2::new((x + side / 2) as f32, (y + side / 2) as f32), mask));
        }
    }
    patches
}

fn generate_chart(width: u32, height: u32) -> GrayImage {
    let (chart_w, chart_h) = (6 * PATCH + 7 * GAP, 4 * PATCH + 5 * GAP);
    let (x0, y0) = ((width - chart_w) / 2, (height - chart_h) / 2);
    GrayImage::from_fn(width, height, |x, y| {
        let (cx, cy) = (x.wrapping_sub(x0), y.wrapping_sub(y0));
        if cx >= chart_w || cy >= chart_h {
            return Luma([200]);
        }
        let in_patch = cx % (PATCH + GAP) >= GAP && cy % (PATCH + GAP) >= GAP;
        if in_patch {
            let index = (cy / (PATCH + GAP)) * 6 + cx / (PATCH + GAP);
            Luma([60 + (index * 7) as u8])
        } else {
            Luma([10])
        }
    })
}

fn benchmark_patch_medians(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch_medians");

    for side in [16usize, 64, 128] {
        let (width, height) = (6 * (side + 4), 4 * (side + 4));
        let plane = generate_mosaic(width, height);
        let patches = generate_patches(width, height, side);

        for (mode, label) in [(Parallelism::Sequential, "sequential"), (Parallelism::Rayon, "rayon")] {
            let statistics = PatchStatistics::new(mode);
            group.bench_with_input(
                BenchmarkId::new(label, format!("{side}px")),
                &patches,
                |b, patches| {
                    b.iter(|| {
                        let image = MeasuredImage::mosaic(&plane, &BayerPattern::Rggb);
                        let _ = statistics.measure(black_box(image), patches, MeasurementStage::Raw);
                    });
                },
            );
        }
    }

    group.finish();
}

fn benchmark_chart_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("chart_detection");
    group.sample_size(20);

    for (width, height, label) in [(600, 400, "600x400"), (1200, 800, "1200x800")] {
        let image = generate_chart(width, height);
        let detector = ChartDetector::new(DetectorConfig::default(), Parallelism::Rayon);
        group.bench_with_input(BenchmarkId::from_parameter(label), &image, |b, image| {
            b.iter(|| {
                let _ = detector.detect(black_box(image), 6, 4);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_patch_medians, benchmark_chart_detection);
criterion_main!(benches);
